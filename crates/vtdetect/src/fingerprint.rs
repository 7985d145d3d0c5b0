//! The fingerprint resolver.
//!
//! A pure function from the detection record to the terminal family,
//! reported version, and capability set. The family decision is a tree
//! over the device-attributes tuple; capabilities follow from the family
//! plus a handful of per-probe outcomes.

use crate::caps::Capabilities;
use crate::record::DetectionRecord;

/// Terminal family resolved from the reply pattern.
#[derive(
    Debug,
    PartialOrd,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    strum::Display,
    strum::IntoStaticStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminalKind {
    /// Answers almost nothing useful; gets baseline capabilities only.
    #[strum(serialize = "toodumb")]
    TooDumb,
    /// Reports cursor position but not operating status; its reply stream
    /// cannot be demultiplexed from typed input reliably.
    #[strum(serialize = "incompatible with input handling")]
    Incompatible,
    /// Compatible but otherwise unidentified.
    #[strum(serialize = "base")]
    Base,
    #[strum(serialize = "xterm")]
    Xterm,
    #[strum(serialize = "konsole")]
    Konsole,
    #[strum(serialize = "screen")]
    Screen,
    #[strum(serialize = "tmux")]
    Tmux,
    #[strum(serialize = "urxvt")]
    Urxvt,
    #[strum(serialize = "mlterm")]
    Mlterm,
    #[strum(serialize = "terminology")]
    Terminology,
    /// Claimed the reserved tertiary-DA id `FFFFFFFF` and is treated as
    /// fully standards compliant.
    #[strum(serialize = "unknown full featured")]
    FullFeatured,
}

/// Tertiary-DA id reserved as a promise of full standards compliance.
/// Any terminal reporting it receives the complete compliant capability
/// set. This mapping must be preserved verbatim.
const UNIT_ID_FULL_FEATURED: u32 = 0xFFFF_FFFF;

/// Tertiary-DA id terminology reports (`~~TY`).
const UNIT_ID_TERMINOLOGY: u32 = 0x7E7E_5459;

/// Secondary-DA version from which kind 0 is taken to be a real xterm
/// (older kind-0 reporters are libvterm, putty, early tmux and friends).
/// Also the cutoff for the title stack.
const XTERM_MIN_VERSION: u16 = 264;

/// xterm version that gained truecolor and a configurable cursor shape.
const XTERM_MODERN_VERSION: u16 = 336;

/// The resolved identity and capability set of the attached terminal.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Fingerprint {
    pub kind: TerminalKind,
    /// Version as shown in the descriptor: the secondary-DA version for
    /// xterm and screen, 0 for every other family.
    pub version: u16,
    /// The `?6n` variant produced a syntactically distinguishable reply.
    pub safe_cpr: bool,
    /// The tertiary-DA probe drew glyphs instead of answering.
    pub tertiary_glitched: bool,
    pub capabilities: Capabilities,
}

impl Fingerprint {
    /// Human-readable summary of the detection outcome, e.g.
    /// `Type: xterm(264) safe-CPR seq:>=`.
    #[must_use]
    pub fn result_text(&self) -> String {
        let quirks = match self.kind {
            TerminalKind::TooDumb | TerminalKind::Incompatible => "",
            _ if self.tertiary_glitched => ">",
            _ => ">=",
        };
        format!(
            "Type: {}({}) {} seq:{}",
            self.kind,
            self.version,
            if self.safe_cpr { "safe-CPR" } else { "" },
            quirks
        )
    }
}

/// Resolve a detection record into a fingerprint. Pure: identical records
/// yield identical fingerprints, and absent slots are tolerated.
pub(crate) fn resolve(record: &DetectionRecord) -> Fingerprint {
    let kind = decide_family(record);
    let version = match kind {
        TerminalKind::Xterm | TerminalKind::Screen => {
            record.secondary().map_or(0, |(_, version, _)| version)
        }
        _ => 0,
    };
    Fingerprint {
        kind,
        version,
        safe_cpr: record.safe_cpr,
        tertiary_glitched: record.tertiary_glitch > 0,
        capabilities: derive_capabilities(kind, version, record),
    }
}

fn decide_family(record: &DetectionRecord) -> TerminalKind {
    if !record.any_cursor_report() {
        return TerminalKind::TooDumb;
    }
    if !record.dsr_ok {
        return TerminalKind::Incompatible;
    }
    if record.secondary().is_none() && record.primary_echo() {
        // answers every DA variant with primary DA (alacritty <= 0.2)
        return TerminalKind::TooDumb;
    }
    match record.tertiary {
        Some(UNIT_ID_FULL_FEATURED) => return TerminalKind::FullFeatured,
        Some(UNIT_ID_TERMINOLOGY) => return TerminalKind::Terminology,
        _ => {}
    }
    let Some((kind, version, _)) = record.secondary() else {
        return TerminalKind::Base;
    };
    match kind {
        0 if version == 115
            && record.konsole_params()
            && record.tertiary.is_none() =>
        {
            TerminalKind::Konsole
        }
        0 if version >= XTERM_MIN_VERSION => TerminalKind::Xterm,
        41 => TerminalKind::Xterm,
        24 => TerminalKind::Mlterm,
        83 => TerminalKind::Screen,
        84 => TerminalKind::Tmux,
        85 => TerminalKind::Urxvt,
        _ => TerminalKind::Base,
    }
}

#[allow(clippy::match_same_arms)]
fn derive_capabilities(
    kind: TerminalKind,
    version: u16,
    record: &DetectionRecord,
) -> Capabilities {
    use TerminalKind as T;

    let mut caps = Capabilities::empty();

    if !matches!(kind, T::TooDumb | T::Incompatible) {
        caps |= Capabilities::CSI_POSTFIX_MOD;
    }

    if matches!(kind, T::Xterm | T::FullFeatured) {
        caps |= Capabilities::TITLE_RESTORE;
    }

    let old_xterm = kind == T::Xterm && version < XTERM_MODERN_VERSION;

    if !old_xterm {
        caps |= Capabilities::MAY_TRY_CURSOR_SHAPE_BAR;
    }

    if kind == T::Konsole {
        caps |= Capabilities::CURSOR_SHAPE_OSC50;
    }

    let extended_charset = match kind {
        T::TooDumb => false,
        // identified only by its cursor reports, nothing else to go by
        T::Base => record.secondary().is_some(),
        _ => true,
    };
    if extended_charset {
        caps |= Capabilities::EXTENDED_CHARSET;
    }

    if !matches!(kind, T::Screen | T::Urxvt) && !old_xterm {
        caps |= Capabilities::TRUECOLOR_MAYBE_SUPPORTED;
    }

    let truecolor = match kind {
        T::Xterm => version >= XTERM_MODERN_VERSION,
        T::Konsole | T::Mlterm | T::Tmux | T::Terminology
        | T::FullFeatured => true,
        // kitty reports secondary kind 1 and, once it answers the
        // terminal parameters report, is known truecolor
        T::Base => {
            record.secondary().is_some_and(|(kind, ..)| kind == 1)
                && record.params_report.is_some()
        }
        _ => false,
    };
    if truecolor {
        caps |= Capabilities::TRUECOLOR_SUPPORTED;
    }

    if kind == T::Urxvt && record.color.is_none() {
        caps |= Capabilities::COLOR_88;
    }

    if kind != T::Screen {
        caps |= Capabilities::CLEARED_COLORING;
    }

    // a 7-bit-ST-terminated OSC reply is direct evidence; otherwise every
    // family except konsole is known to accept it
    let seven_bit_st = kind != T::Konsole
        || record.color.is_some_and(|slot| slot.st_terminated);
    if seven_bit_st {
        caps |= Capabilities::SEVEN_BIT_ST;
    }

    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{ParamList, Reply};
    use pretty_assertions::assert_eq;

    fn record_from(replies: Vec<Reply>) -> DetectionRecord {
        let mut record = DetectionRecord::default();
        for reply in replies {
            record.ingest(reply);
        }
        record
    }

    fn secondary(kind: u16, version: u16) -> Reply {
        Reply::SecondaryDa {
            kind,
            version,
            extra: 0,
        }
    }

    fn cpr() -> Reply {
        Reply::CursorReport {
            row: 1,
            col: 1,
            dec: false,
            page: None,
        }
    }

    fn dec_cpr() -> Reply {
        Reply::CursorReport {
            row: 1,
            col: 1,
            dec: true,
            page: None,
        }
    }

    #[test]
    fn test_silent_terminal_is_toodumb() {
        let fp = resolve(&record_from(vec![Reply::OperatingStatusOk]));
        assert_eq!(fp.kind, TerminalKind::TooDumb);
        assert_eq!(fp.result_text(), "Type: toodumb(0)  seq:");
        assert_eq!(
            fp.capabilities,
            Capabilities::MAY_TRY_CURSOR_SHAPE_BAR
                | Capabilities::TRUECOLOR_MAYBE_SUPPORTED
                | Capabilities::CLEARED_COLORING
                | Capabilities::SEVEN_BIT_ST
        );
    }

    #[test]
    fn test_cursor_without_status_is_incompatible() {
        let fp = resolve(&record_from(vec![cpr()]));
        assert_eq!(fp.kind, TerminalKind::Incompatible);
        assert_eq!(
            fp.result_text(),
            "Type: incompatible with input handling(0)  seq:"
        );
        assert!(!fp.capabilities.contains(Capabilities::CSI_POSTFIX_MOD));
        assert!(fp.capabilities.contains(Capabilities::EXTENDED_CHARSET));
    }

    #[test]
    fn test_primary_echo_is_toodumb() {
        let fp = resolve(&record_from(vec![
            Reply::PrimaryDa(ParamList::from_slice(&[6])),
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(fp.kind, TerminalKind::TooDumb);
    }

    #[test]
    fn test_bare_base_has_no_extended_charset() {
        let fp =
            resolve(&record_from(vec![Reply::OperatingStatusOk, cpr()]));
        assert_eq!(fp.kind, TerminalKind::Base);
        assert_eq!(fp.result_text(), "Type: base(0)  seq:>=");
        assert!(!fp.capabilities.contains(Capabilities::EXTENDED_CHARSET));
    }

    #[test]
    fn test_base_with_secondary_da_has_extended_charset() {
        let fp = resolve(&record_from(vec![
            secondary(0, 100),
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(fp.kind, TerminalKind::Base);
        assert!(fp.capabilities.contains(Capabilities::EXTENDED_CHARSET));
    }

    #[test]
    fn test_xterm_version_threshold() {
        let old = resolve(&record_from(vec![
            secondary(0, 115),
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(old.kind, TerminalKind::Base);

        let xterm = resolve(&record_from(vec![
            secondary(0, 264),
            Reply::OperatingStatusOk,
            cpr(),
            dec_cpr(),
        ]));
        assert_eq!(xterm.kind, TerminalKind::Xterm);
        assert_eq!(xterm.version, 264);
        assert_eq!(
            xterm.result_text(),
            "Type: xterm(264) safe-CPR seq:>="
        );
        assert!(xterm.capabilities.contains(Capabilities::TITLE_RESTORE));
        assert!(
            !xterm
                .capabilities
                .contains(Capabilities::MAY_TRY_CURSOR_SHAPE_BAR)
        );
    }

    #[test]
    fn test_modern_xterm_gains_truecolor() {
        let fp = resolve(&record_from(vec![
            secondary(41, 336),
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(fp.kind, TerminalKind::Xterm);
        assert!(fp.capabilities.contains(Capabilities::TRUECOLOR_SUPPORTED));
        assert!(
            fp.capabilities
                .contains(Capabilities::MAY_TRY_CURSOR_SHAPE_BAR)
        );
    }

    #[test]
    fn test_full_featured_promise() {
        let fp = resolve(&record_from(vec![
            secondary(61, 234),
            Reply::TertiaryDa { id: 0xFFFF_FFFF },
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(fp.kind, TerminalKind::FullFeatured);
        assert_eq!(fp.result_text(), "Type: unknown full featured(0)  seq:>=");
        assert_eq!(
            fp.capabilities,
            Capabilities::all()
                - (Capabilities::CURSOR_SHAPE_OSC50 | Capabilities::COLOR_88)
        );
    }

    #[test]
    fn test_terminology_unit_id() {
        let fp = resolve(&record_from(vec![
            secondary(61, 337),
            Reply::TertiaryDa { id: 0x7E7E_5459 },
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(fp.kind, TerminalKind::Terminology);
        assert!(fp.capabilities.contains(Capabilities::TRUECOLOR_SUPPORTED));
    }

    #[test]
    fn test_konsole_needs_full_signature() {
        let konsole = resolve(&record_from(vec![
            secondary(0, 115),
            Reply::TerminalParameters(ParamList::from_slice(&[
                3, 1, 1, 112, 112, 1, 0,
            ])),
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(konsole.kind, TerminalKind::Konsole);
        assert!(
            konsole
                .capabilities
                .contains(Capabilities::CURSOR_SHAPE_OSC50)
        );
        assert!(!konsole.capabilities.contains(Capabilities::SEVEN_BIT_ST));

        // same secondary DA without the parameters report is not konsole
        let base = resolve(&record_from(vec![
            secondary(0, 115),
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(base.kind, TerminalKind::Base);
    }

    #[test]
    fn test_urxvt_88_color_without_palette_reply() {
        let with_reply = resolve(&record_from(vec![
            secondary(85, 95),
            Reply::OperatingStatusOk,
            cpr(),
            Reply::Color {
                index: None,
                color: None,
                st_terminated: false,
            },
        ]));
        assert_eq!(with_reply.kind, TerminalKind::Urxvt);
        assert!(!with_reply.capabilities.contains(Capabilities::COLOR_88));

        let without_reply = resolve(&record_from(vec![
            secondary(85, 95),
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert!(without_reply.capabilities.contains(Capabilities::COLOR_88));
        assert!(
            !without_reply
                .capabilities
                .contains(Capabilities::TRUECOLOR_MAYBE_SUPPORTED)
        );
    }

    #[test]
    fn test_screen_keeps_version_and_loses_coloring() {
        let fp = resolve(&record_from(vec![
            secondary(83, 30915),
            Reply::OperatingStatusOk,
            cpr(),
        ]));
        assert_eq!(fp.kind, TerminalKind::Screen);
        assert_eq!(fp.result_text(), "Type: screen(30915)  seq:>=");
        assert!(!fp.capabilities.contains(Capabilities::CLEARED_COLORING));
        assert!(
            !fp.capabilities
                .contains(Capabilities::TRUECOLOR_MAYBE_SUPPORTED)
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let build = || {
            record_from(vec![
                secondary(84, 0),
                Reply::OperatingStatusOk,
                cpr(),
            ])
        };
        assert_eq!(resolve(&build()), resolve(&build()));
    }
}
