//! Run capability detection against the attached terminal.
//!
//! Prints the fingerprint descriptor and the detected capability set,
//! giving the terminal one second to answer the probe battery.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use vtdetect::{
    AutoDetectState, AutoDetector, DetectEvent, OutputSink,
};

/// Puts stdin into raw mode for the duration of the run and restores the
/// saved settings on drop.
struct RawMode {
    #[cfg(unix)]
    saved: libc::termios,
}

impl RawMode {
    #[cfg(unix)]
    fn enable() -> io::Result<Self> {
        unsafe {
            let mut termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            let saved = termios;
            libc::cfmakeraw(&mut termios);
            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &termios)
                != 0
            {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { saved })
        }
    }

    #[cfg(not(unix))]
    fn enable() -> io::Result<Self> {
        Ok(Self {})
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.saved);
        }
    }
}

struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&mut self, bytes: &[u8]) {
        let _ = io::stdout().write_all(bytes);
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }
}

#[cfg(unix)]
fn screen_size() -> (u16, u16) {
    unsafe {
        let mut size: libc::winsize = std::mem::zeroed();
        if libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut size) == 0
            && size.ws_col > 0
            && size.ws_row > 0
        {
            return (size.ws_col, size.ws_row);
        }
    }
    (80, 24)
}

#[cfg(not(unix))]
fn screen_size() -> (u16, u16) {
    (80, 24)
}

#[cfg(unix)]
fn poll_stdin(timeout_ms: i32) -> bool {
    let mut fds = [libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    }];
    unsafe { libc::poll(fds.as_mut_ptr(), 1, timeout_ms) > 0 }
}

#[cfg(not(unix))]
fn poll_stdin(_timeout_ms: i32) -> bool {
    true
}

fn main() -> io::Result<()> {
    let _raw_mode = RawMode::enable()?;

    let (width, height) = screen_size();
    let mut detector = AutoDetector::new(width, height);
    let mut sink = StdoutSink;

    let mut cb = |_event: DetectEvent<'_>| {};
    detector.start(&mut sink, &mut cb);
    sink.flush();

    let deadline = Instant::now() + Duration::from_secs(1);
    let mut stdin = io::stdin();
    let mut buf = [0u8; 1024];

    while detector.state() == AutoDetectState::Running {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            detector.abandon(&mut sink, &mut cb);
            break;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        if !poll_stdin(remaining.as_millis() as i32) {
            continue;
        }
        let n = stdin.read(&mut buf)?;
        if n == 0 {
            detector.abandon(&mut sink, &mut cb);
            break;
        }
        detector.add_input(&buf[..n], &mut sink, &mut cb);
    }
    sink.flush();

    drop(_raw_mode);

    println!("{}", detector.result_text());
    if let Some(fingerprint) = detector.fingerprint() {
        for (name, _) in fingerprint.capabilities.iter_names() {
            println!("  {name}");
        }
    }

    Ok(())
}
