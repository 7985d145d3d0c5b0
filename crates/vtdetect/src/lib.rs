#![warn(clippy::pedantic)]

//! Terminal capability auto-detection.
//!
//! Probes the attached terminal with a fixed battery of escape sequences,
//! classifies the replies as they come back interleaved with ordinary
//! user input, fingerprints the terminal into a family, and derives the
//! capability set downstream rendering code keys its output on. Some
//! terminals print stray glyphs instead of answering a probe; the engine
//! tracks the damage and emits the byte sequence that repairs it.
//!
//! The detector is driven by the host's event loop and never blocks:
//! feed it bytes with [`AutoDetector::add_input`] whenever the terminal
//! file descriptor is readable, and wait for the finished event.

mod caps;
mod detect;
mod fingerprint;
mod macros;
mod probe;
mod record;
mod repair;
mod reply;
mod traits;

pub use caps::Capabilities;
pub use detect::{
    AutoDetectFinished, AutoDetectState, AutoDetector, DetectEvent,
};
pub use fingerprint::{Fingerprint, TerminalKind};
pub use probe::{PROBE_COUNT, ProbeId, ReplyShape, SENTINEL, probes};
pub use reply::{ParamList, Reply, RgbColor};
pub use traits::OutputSink;
pub use vt_push_parser::event::VTEvent;
