//! The closed vocabulary of detectable terminal capabilities.

use bitflags::bitflags;

bitflags! {
    /// Capabilities derived from a terminal fingerprint.
    ///
    /// Most members are inferred from terminal identity once the family is
    /// known rather than queried individually; the set is what downstream
    /// rendering code keys its output decisions on.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
    #[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
    pub struct Capabilities: u16 {
        /// The terminal understands xterm-style modifier parameters
        /// appended to CSI keyboard sequences.
        const CSI_POSTFIX_MOD = 0b0000_0000_0000_0001;
        /// The window title can be saved and restored via the title stack.
        const TITLE_RESTORE = 0b0000_0000_0000_0010;
        /// Requesting a bar-shaped cursor (`DECSCUSR` 5/6) is safe to try.
        const MAY_TRY_CURSOR_SHAPE_BAR = 0b0000_0000_0000_0100;
        /// Cursor shape is set through konsole's OSC 50 extension instead
        /// of `DECSCUSR`.
        const CURSOR_SHAPE_OSC50 = 0b0000_0000_0000_1000;
        /// Characters outside Latin-1 can be emitted directly.
        const EXTENDED_CHARSET = 0b0000_0000_0001_0000;
        /// 24-bit SGR color sequences may be tried without corrupting the
        /// display, though support is unconfirmed.
        const TRUECOLOR_MAYBE_SUPPORTED = 0b0000_0000_0010_0000;
        /// 24-bit SGR color is positively supported.
        const TRUECOLOR_SUPPORTED = 0b0000_0000_0100_0000;
        /// The palette has 88 entries instead of 256 (rxvt-unicode
        /// compile-time option).
        const COLOR_88 = 0b0000_0000_1000_0000;
        /// Erase operations apply the current background color to the
        /// cleared cells.
        const CLEARED_COLORING = 0b0000_0001_0000_0000;
        /// OSC and DCS strings may be terminated with the 7-bit `ESC \`
        /// sequence.
        const SEVEN_BIT_ST = 0b0000_0010_0000_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_distinct() {
        assert_eq!(Capabilities::all().bits().count_ones(), 10);
    }

    #[test]
    fn test_empty_set() {
        let caps = Capabilities::empty();
        assert!(!caps.contains(Capabilities::CSI_POSTFIX_MOD));
        assert!(!caps.contains(Capabilities::SEVEN_BIT_ST));
    }
}
