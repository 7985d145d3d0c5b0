//! The probe catalog.
//!
//! A fixed battery of query sequences sent to the terminal in one batch.
//! Replies carry no request identifier, so the send order is part of the
//! wire contract: replies are attributed to probes by position and by
//! shape. Reordering the battery or dropping the sentinel breaks
//! attribution.

use crate::{csi, osc};

/// Number of probes in the battery, not counting the sentinel.
pub const PROBE_COUNT: usize = 9;

/// The synchronization sentinel reissued after the battery.
///
/// A cursor position report is answered by every terminal the input
/// machinery can work with at all, so its reply marks the point after
/// which no further replies for this batch will arrive.
pub const SENTINEL: &str = csi!("6n");

/// Identifies one probe of the detection battery.
#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProbeId {
    /// Secondary device attributes (`CSI > c`).
    SecondaryDa,
    /// Secondary device attributes, explicit parameter form (`CSI > 1 c`).
    SecondaryDaExplicit,
    /// Secondary device attributes, zero-prefixed form (`CSI > 0;1 c`).
    SecondaryDaZero,
    /// Tertiary device attributes (`CSI = c`).
    TertiaryDa,
    /// Operating status report (`CSI 5 n`).
    OperatingStatus,
    /// Cursor position report (`CSI 6 n`).
    CursorPosition,
    /// DEC variant cursor position report (`CSI ? 6 n`).
    CursorPositionDec,
    /// Terminal parameters report (`CSI 1 x`).
    TerminalParameters,
    /// Palette color query for index 255 (`OSC 4`).
    ColorQuery,
}

/// The reply shape a compliant terminal produces for a probe.
#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ReplyShape {
    /// `CSI > kind;version;extra c`.
    SecondaryDa,
    /// `DCS ! | hex ST`.
    TertiaryDa,
    /// `CSI 0 n`.
    OperatingStatus,
    /// `CSI row;col R`, optionally with a leading `?` and page parameter.
    CursorReport,
    /// `CSI … x`.
    TerminalParameters,
    /// `OSC 4 ; index ; colorspec` terminated by BEL or ST.
    Color,
}

impl ProbeId {
    /// The battery in canonical send order.
    pub const ALL: [ProbeId; PROBE_COUNT] = [
        ProbeId::SecondaryDa,
        ProbeId::SecondaryDaExplicit,
        ProbeId::SecondaryDaZero,
        ProbeId::TertiaryDa,
        ProbeId::OperatingStatus,
        ProbeId::CursorPosition,
        ProbeId::CursorPositionDec,
        ProbeId::TerminalParameters,
        ProbeId::ColorQuery,
    ];

    /// The byte string written to the terminal for this probe.
    #[must_use]
    pub const fn bytes(self) -> &'static str {
        match self {
            ProbeId::SecondaryDa => csi!(">c"),
            ProbeId::SecondaryDaExplicit => csi!(">1c"),
            ProbeId::SecondaryDaZero => csi!(">0;1c"),
            ProbeId::TertiaryDa => csi!("=c"),
            ProbeId::OperatingStatus => csi!("5n"),
            ProbeId::CursorPosition => csi!("6n"),
            ProbeId::CursorPositionDec => csi!("?6n"),
            ProbeId::TerminalParameters => csi!("1x"),
            ProbeId::ColorQuery => osc!("4;255;?"),
        }
    }

    /// The reply shape this probe elicits from a compliant terminal.
    #[must_use]
    pub const fn expected_shape(self) -> ReplyShape {
        match self {
            ProbeId::SecondaryDa
            | ProbeId::SecondaryDaExplicit
            | ProbeId::SecondaryDaZero => ReplyShape::SecondaryDa,
            ProbeId::TertiaryDa => ReplyShape::TertiaryDa,
            ProbeId::OperatingStatus => ReplyShape::OperatingStatus,
            ProbeId::CursorPosition | ProbeId::CursorPositionDec => {
                ReplyShape::CursorReport
            }
            ProbeId::TerminalParameters => ReplyShape::TerminalParameters,
            ProbeId::ColorQuery => ReplyShape::Color,
        }
    }

    /// Whether this probe is known to make some terminals print literal
    /// glyphs instead of answering.
    #[must_use]
    pub const fn may_glitch(self) -> bool {
        matches!(self, ProbeId::TertiaryDa | ProbeId::ColorQuery)
    }
}

/// Iterate the battery in canonical send order.
pub fn probes() -> impl Iterator<Item = (ProbeId, &'static str)> {
    ProbeId::ALL.into_iter().map(|probe| (probe, probe.bytes()))
}
