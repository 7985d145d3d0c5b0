//! The detection state machine and its host-facing driver.
//!
//! [`AutoDetector`] owns the escape-sequence parser and the run state.
//! The host's event loop drives it: `start` writes the probe battery,
//! `add_input` consumes whatever the terminal file descriptor produced
//! (probe replies interleaved with ordinary typing), and one
//! [`DetectEvent::Finished`] is delivered when the run reaches its
//! terminal state. Nothing here blocks and there are no internal timers;
//! the reissued cursor-position probe is the sole termination trigger,
//! with [`AutoDetector::abandon`] as the host's outer-timeout escape
//! hatch.

use vt_push_parser::{VT_PARSER_INTEREST_ALL, VTPushParser, event::VTEvent};

use crate::caps::Capabilities;
use crate::fingerprint::{self, Fingerprint};
use crate::probe;
use crate::record::DetectionRecord;
use crate::repair::{self, Repair};
use crate::reply::{self, Classified};
use crate::traits::OutputSink;

/// Externally visible lifecycle of a detection run.
#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AutoDetectState {
    /// `start` has not been called.
    Idle,
    /// Probes are out; replies are being collected.
    Running,
    /// The run finished, was abandoned, or was cancelled; the capability
    /// accessors are valid.
    Done,
}

/// Payload of the terminal event of a detection run.
#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AutoDetectFinished {
    /// The output sink went bad during the run; the capability set is
    /// empty.
    pub failed: bool,
    /// Glitch repair could not reach every spoiled cell; the host should
    /// schedule a full repaint.
    pub partial_repair: bool,
}

/// Events delivered to the host callback.
#[derive(Debug)]
pub enum DetectEvent<'a> {
    /// Detection reached its terminal state.
    Finished(AutoDetectFinished),
    /// Input that is not part of the detection exchange: user keystrokes
    /// interleaved with the replies, printable runs outside any glitch
    /// window, and everything once the run is done.
    Input(&'a VTEvent<'a>),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    Probing,
    Finalizing,
    Done,
}

/// Capture target for in-flight OSC/DCS payloads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum CaptureMode {
    #[default]
    None,
    OscData,
    DcsData,
}

#[derive(Debug, Default)]
struct EngineState {
    phase: Phase,
    record: DetectionRecord,
    fingerprint: Option<Fingerprint>,
    width: u16,
    height: u16,
    // Accumulator for OSC and DCS payloads
    capture_buffer: Vec<u8>,
    capture_mode: CaptureMode,
    // Current DCS header had the `! |` unit-id shape
    dcs_unit_id: bool,
}

/// Terminal capability auto-detector.
///
/// Single-threaded and cooperative: the output sink and the event
/// callback are borrowed only for the extent of each call, and the
/// detection record is not observable until the run is done.
pub struct AutoDetector {
    seq_parser: VTPushParser<VT_PARSER_INTEREST_ALL>,
    state: EngineState,
}

impl AutoDetector {
    /// Create a detector for a terminal of the given size. The geometry
    /// is only consulted when repairing probe glitches.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            seq_parser: VTPushParser::new_with_interest::<
                VT_PARSER_INTEREST_ALL,
            >(),
            state: EngineState {
                width,
                height,
                ..EngineState::default()
            },
        }
    }

    /// Update the screen geometry used by glitch repair.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.state.width = width;
        self.state.height = height;
    }

    /// Begin a detection run: write the probe battery and the
    /// synchronization sentinel.
    ///
    /// Does nothing unless the detector is idle. If the sink reports bad,
    /// the run completes immediately as failed.
    pub fn start<S, F>(&mut self, sink: &mut S, cb: &mut F)
    where
        S: OutputSink + ?Sized,
        F: for<'any> FnMut(DetectEvent<'any>),
    {
        if self.state.phase != Phase::Idle {
            return;
        }
        for (_, bytes) in probe::probes() {
            sink.write(bytes.as_bytes());
        }
        sink.write(probe::SENTINEL.as_bytes());
        if sink.is_bad() {
            EngineState::fail(&mut self.state, cb);
            return;
        }
        self.state.phase = Phase::Probing;
    }

    /// Feed bytes read from the terminal.
    ///
    /// Replies are classified in byte order and routed into the detection
    /// record; everything that is not a probe reply comes back through
    /// the callback as [`DetectEvent::Input`]. When the sentinel reply
    /// arrives the run finalizes within this call, writing any repair
    /// bytes to `sink` and delivering [`DetectEvent::Finished`] before
    /// input events derived from later bytes.
    pub fn add_input<S, F>(&mut self, input: &[u8], sink: &mut S, cb: &mut F)
    where
        S: OutputSink + ?Sized,
        F: for<'any> FnMut(DetectEvent<'any>),
    {
        self.seq_parser.feed_with(input, |vt_event: VTEvent| {
            EngineState::process_vt_event(
                &mut self.state,
                &vt_event,
                sink,
                cb,
            );
        });
    }

    /// Flush an incomplete trailing escape sequence out of the parser.
    ///
    /// Call when the input stream has gone quiet. Return `true` if an
    /// event was emitted.
    pub fn idle<S, F>(&mut self, sink: &mut S, cb: &mut F) -> bool
    where
        S: OutputSink + ?Sized,
        F: for<'any> FnMut(DetectEvent<'any>),
    {
        if let Some(vt_event) = self.seq_parser.idle() {
            EngineState::process_vt_event(
                &mut self.state,
                &vt_event,
                sink,
                cb,
            );
            true
        } else {
            false
        }
    }

    /// Give up waiting for the sentinel and finalize on whatever partial
    /// record exists. This is the host's outer-timeout path; capability
    /// derivation tolerates absent slots.
    pub fn abandon<S, F>(&mut self, sink: &mut S, cb: &mut F)
    where
        S: OutputSink + ?Sized,
        F: for<'any> FnMut(DetectEvent<'any>),
    {
        if self.state.phase == Phase::Probing {
            EngineState::finalize(&mut self.state, sink, cb);
        }
    }

    /// Cancel detection: the run is done with an empty capability set.
    /// Idempotent, and emits no event (the host initiated the
    /// transition).
    pub fn cancel(&mut self) {
        self.state.phase = Phase::Done;
        self.state.fingerprint = None;
    }

    #[must_use]
    pub fn state(&self) -> AutoDetectState {
        match self.state.phase {
            Phase::Idle => AutoDetectState::Idle,
            Phase::Probing | Phase::Finalizing => AutoDetectState::Running,
            Phase::Done => AutoDetectState::Done,
        }
    }

    /// Whether the detected terminal has the given capability. `false`
    /// until the run is done.
    #[must_use]
    pub fn capable(&self, cap: Capabilities) -> bool {
        self.state
            .fingerprint
            .as_ref()
            .is_some_and(|fp| fp.capabilities.contains(cap))
    }

    /// Human-readable descriptor of the detection outcome. Empty until
    /// the run is done, and after cancellation or failure.
    #[must_use]
    pub fn result_text(&self) -> String {
        self.state
            .fingerprint
            .as_ref()
            .map(Fingerprint::result_text)
            .unwrap_or_default()
    }

    /// The resolved fingerprint, once the run is done.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.state.fingerprint.as_ref()
    }
}

impl EngineState {
    fn process_vt_event<S, F>(
        state: &mut Self,
        vt_event: &VTEvent,
        sink: &mut S,
        cb: &mut F,
    ) where
        S: OutputSink + ?Sized,
        F: for<'any> FnMut(DetectEvent<'any>),
    {
        if state.phase != Phase::Probing {
            // before start and after done everything belongs to the host
            cb(DetectEvent::Input(vt_event));
            return;
        }

        match vt_event {
            VTEvent::Csi(csi) => match reply::classify_csi(csi) {
                Classified::Reply(reply) => {
                    if state.record.ingest(reply) {
                        Self::finalize(state, sink, cb);
                    }
                }
                Classified::Malformed(context) => {
                    tracing::debug!("discarding malformed {context} reply");
                }
                Classified::Unrecognized => cb(DetectEvent::Input(vt_event)),
            },
            VTEvent::Raw(bytes) => {
                if let Some(window) = state.record.open_glitch_window() {
                    state.record.note_glitch(window, bytes.len());
                } else {
                    cb(DetectEvent::Input(vt_event));
                }
            }
            VTEvent::OscStart => {
                state.capture_buffer.clear();
                state.capture_mode = CaptureMode::OscData;
            }
            VTEvent::OscCancel => {
                state.capture_buffer.clear();
                state.capture_mode = CaptureMode::None;
            }
            VTEvent::OscData(data) => {
                if state.capture_mode == CaptureMode::OscData {
                    state.capture_buffer.extend_from_slice(data);
                }
            }
            VTEvent::OscEnd { data, used_bel } => {
                state.capture_buffer.extend_from_slice(data);
                state.capture_mode = CaptureMode::None;
                let osc_data = std::mem::take(&mut state.capture_buffer);
                match reply::classify_osc(&osc_data, *used_bel) {
                    Some(reply) => {
                        if state.record.ingest(reply) {
                            Self::finalize(state, sink, cb);
                        }
                    }
                    None => {
                        tracing::debug!(
                            "discarding unrecognized OSC during detection"
                        );
                    }
                }
            }
            VTEvent::DcsStart(dcs) => {
                state.capture_buffer.clear();
                state.capture_mode = CaptureMode::DcsData;
                state.dcs_unit_id = dcs.intermediates.as_ref() == b"!"
                    && dcs.final_byte == b'|';
            }
            VTEvent::DcsCancel => {
                state.capture_buffer.clear();
                state.capture_mode = CaptureMode::None;
                state.dcs_unit_id = false;
            }
            VTEvent::DcsData(data) => {
                if state.capture_mode == CaptureMode::DcsData {
                    state.capture_buffer.extend_from_slice(data);
                }
            }
            VTEvent::DcsEnd(data) => {
                state.capture_buffer.extend_from_slice(data);
                state.capture_mode = CaptureMode::None;
                let payload = std::mem::take(&mut state.capture_buffer);
                if state.dcs_unit_id {
                    state.dcs_unit_id = false;
                    match reply::classify_dcs_unit_id(&payload) {
                        Some(reply) => {
                            if state.record.ingest(reply) {
                                Self::finalize(state, sink, cb);
                            }
                        }
                        None => {
                            tracing::debug!(
                                "discarding malformed tertiary DA payload"
                            );
                        }
                    }
                } else {
                    tracing::debug!(
                        "discarding unrecognized DCS during detection"
                    );
                }
            }
            _ => cb(DetectEvent::Input(vt_event)),
        }
    }

    /// Resolve the fingerprint, repair glitches, and deliver the
    /// finished event.
    fn finalize<S, F>(state: &mut Self, sink: &mut S, cb: &mut F)
    where
        S: OutputSink + ?Sized,
        F: for<'any> FnMut(DetectEvent<'any>),
    {
        state.phase = Phase::Finalizing;
        let fingerprint = fingerprint::resolve(&state.record);

        let glitches = state.record.glitch_total();
        let mut partial_repair = false;
        if glitches > 0 {
            // the final cursor report is where the stray glyphs left the
            // cursor; without one the damage cannot be located
            if let Some((row, col)) = state.record.last_cursor {
                let end = (col.saturating_sub(1), row.saturating_sub(1));
                partial_repair = repair::repair_glitches(
                    sink,
                    state.width,
                    state.height,
                    end,
                    glitches,
                ) == Repair::Partial;
            } else {
                partial_repair = true;
            }
        }

        let failed = sink.is_bad();
        state.fingerprint = if failed { None } else { Some(fingerprint) };
        state.phase = Phase::Done;
        cb(DetectEvent::Finished(AutoDetectFinished {
            failed,
            partial_repair,
        }));
    }

    fn fail<F>(state: &mut Self, cb: &mut F)
    where
        F: for<'any> FnMut(DetectEvent<'any>),
    {
        state.fingerprint = None;
        state.phase = Phase::Done;
        cb(DetectEvent::Finished(AutoDetectFinished {
            failed: true,
            partial_repair: false,
        }));
    }
}
