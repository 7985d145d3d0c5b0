//! The detection record.
//!
//! Accumulates at most one reply per probe slot over a single detection
//! run and implements the attribution rules that map shape-tagged replies
//! onto slots. Created when detection begins, single-writer while the run
//! is live, consumed by the fingerprint resolver.

use crate::reply::{ParamList, Reply};

/// What a secondary-DA probe slot ended up holding.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum DaSlot {
    /// A genuine `CSI > … c` report.
    Secondary { kind: u16, version: u16, extra: u16 },
    /// A primary-DA echo where a secondary report was expected.
    PrimaryEcho,
}

/// The recorded reply to the palette color query. Only the terminator
/// kind feeds the resolver; the color itself does not.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct ColorSlot {
    /// Terminated with `ESC \` rather than BEL.
    pub st_terminated: bool,
}

/// Which probe an observed glitch run is charged to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum GlitchWindow {
    TertiaryDa,
    ColorQuery,
}

/// The terminal parameters report konsole produces, which identifies it
/// together with secondary DA kind 0 version 115.
const KONSOLE_PARAMS: &[u16] = &[3, 1, 1, 112, 112, 1, 0];

#[derive(Debug, Default)]
pub(crate) struct DetectionRecord {
    /// Slots for the three secondary-DA probe forms, filled in send
    /// order.
    pub da: [Option<DaSlot>; 3],
    /// Tertiary-DA unit id.
    pub tertiary: Option<u32>,
    /// `CSI 0 n` was received.
    pub dsr_ok: bool,
    /// Reply slot for the first `CSI 6 n`, 1-based as reported.
    pub cursor: Option<(u16, u16)>,
    /// Reply slot for `CSI ? 6 n`.
    pub cursor_dec: Option<(u16, u16)>,
    /// A `?`-prefixed report was seen, so the `?6n` variant is
    /// distinguishable from user-typed input.
    pub safe_cpr: bool,
    /// Reply slot for `CSI 1 x`.
    pub params_report: Option<ParamList>,
    /// Reply slot for the palette color query.
    pub color: Option<ColorSlot>,
    /// Printable glyphs charged to the tertiary-DA probe.
    pub tertiary_glitch: usize,
    /// Printable glyphs charged to the color query.
    pub color_glitch: usize,
    /// Most recent cursor report of any variant, 1-based as reported.
    pub last_cursor: Option<(u16, u16)>,
    plain_cpr_count: u8,
}

impl DetectionRecord {
    /// Route one classified reply into its slot. Returns `true` when the
    /// reply was the synchronization sentinel and the run should
    /// finalize.
    pub(crate) fn ingest(&mut self, reply: Reply) -> bool {
        match reply {
            Reply::SecondaryDa {
                kind,
                version,
                extra,
            } => {
                self.push_da(DaSlot::Secondary {
                    kind,
                    version,
                    extra,
                });
            }
            Reply::PrimaryDa(_) => self.push_da(DaSlot::PrimaryEcho),
            Reply::TertiaryDa { id } => {
                if self.tertiary.is_none() {
                    self.tertiary = Some(id);
                }
            }
            Reply::OperatingStatusOk => self.dsr_ok = true,
            Reply::TerminalParameters(params) => {
                if self.params_report.is_none() {
                    self.params_report = Some(params);
                }
            }
            Reply::Color { st_terminated, .. } => {
                if self.color.is_none() {
                    self.color = Some(ColorSlot { st_terminated });
                }
            }
            Reply::CursorReport {
                row,
                col,
                dec: true,
                ..
            } => {
                self.safe_cpr = true;
                self.last_cursor = Some((row, col));
                if self.cursor_dec.is_none() {
                    self.cursor_dec = Some((row, col));
                }
            }
            Reply::CursorReport {
                row,
                col,
                dec: false,
                ..
            } => {
                self.last_cursor = Some((row, col));
                self.plain_cpr_count = self.plain_cpr_count.saturating_add(1);
                if self.plain_cpr_count == 1 {
                    self.cursor = Some((row, col));
                } else {
                    // The sentinel. A terminal that answers `?6n` with a
                    // plain report is indistinguishable from the sentinel
                    // at arrival time; both readings fingerprint the
                    // same, so the report also lands in that slot.
                    if self.cursor_dec.is_none() {
                        self.cursor_dec = Some((row, col));
                    }
                    return true;
                }
            }
        }
        false
    }

    /// Fill the next open DA slot. Extra reports once all slots are
    /// answered are dropped, except that a genuine secondary report may
    /// replace a recorded primary echo.
    fn push_da(&mut self, slot: DaSlot) {
        for open in &mut self.da {
            if open.is_none() {
                *open = Some(slot);
                return;
            }
        }
        if matches!(slot, DaSlot::Secondary { .. }) {
            for filled in &mut self.da {
                if matches!(filled, Some(DaSlot::PrimaryEcho)) {
                    *filled = Some(slot);
                    return;
                }
            }
        }
    }

    /// First genuine secondary-DA report, as `(kind, version, extra)`.
    pub(crate) fn secondary(&self) -> Option<(u16, u16, u16)> {
        self.da.iter().find_map(|slot| match slot {
            Some(DaSlot::Secondary {
                kind,
                version,
                extra,
            }) => Some((*kind, *version, *extra)),
            _ => None,
        })
    }

    /// Whether any DA slot recorded a primary-DA echo.
    pub(crate) fn primary_echo(&self) -> bool {
        self.da
            .iter()
            .any(|slot| matches!(slot, Some(DaSlot::PrimaryEcho)))
    }

    /// A cursor report of either variant was received.
    pub(crate) fn any_cursor_report(&self) -> bool {
        self.cursor.is_some() || self.cursor_dec.is_some()
    }

    /// Whether the terminal parameters report matches konsole's.
    pub(crate) fn konsole_params(&self) -> bool {
        self.params_report
            .as_deref()
            .is_some_and(|params| params == KONSOLE_PARAMS)
    }

    pub(crate) fn glitch_total(&self) -> usize {
        self.tertiary_glitch + self.color_glitch
    }

    /// The glitch window, if any, an incoming printable run falls into.
    ///
    /// The tertiary window closes on the first structured reply to a
    /// probe sent after `CSI = c`; the color window stays open until the
    /// sentinel, which is the only probe after the color query.
    pub(crate) fn open_glitch_window(&self) -> Option<GlitchWindow> {
        let past_tertiary = self.dsr_ok
            || self.any_cursor_report()
            || self.params_report.is_some()
            || self.color.is_some();
        if self.tertiary.is_none() && !past_tertiary {
            Some(GlitchWindow::TertiaryDa)
        } else if self.color.is_none() {
            Some(GlitchWindow::ColorQuery)
        } else {
            None
        }
    }

    pub(crate) fn note_glitch(&mut self, window: GlitchWindow, len: usize) {
        match window {
            GlitchWindow::TertiaryDa => self.tertiary_glitch += len,
            GlitchWindow::ColorQuery => self.color_glitch += len,
        }
    }
}
