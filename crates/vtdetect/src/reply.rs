//! Reply classification.
//!
//! Interprets already-delimited escape sequences into tagged reply
//! variants. The byte-stream demultiplexing is done by `vt-push-parser`;
//! this module never re-parses raw bytes, it only inspects the final byte,
//! the private marker, the intermediates and the parameter list of a
//! delimited sequence.

use smallvec::SmallVec;
use vt_push_parser::event::CSI;

/// Parameter list of a CSI reply. Numeric parameters default to 0 when
/// absent or empty.
pub type ParamList = SmallVec<[u16; 8]>;

/// A 16-bit-per-component RGB color from an X11 `rgb:` specification.
#[derive(Debug, PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RgbColor {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

/// A classified reply to one of the detection probes.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Reply {
    /// Primary device attributes (`CSI ? … c`). Sent where a secondary
    /// report was expected by terminals that answer every DA variant the
    /// same way.
    PrimaryDa(ParamList),
    /// Secondary device attributes (`CSI > kind;version;extra c`).
    SecondaryDa { kind: u16, version: u16, extra: u16 },
    /// Tertiary device attributes (`DCS ! | hex ST`), with the unit id
    /// parsed out of the hex payload.
    TertiaryDa { id: u32 },
    /// Operating status report (`CSI 0 n`).
    OperatingStatusOk,
    /// Cursor position report, `CSI row;col R` or the DEC variant
    /// `CSI ? row;col[;page] R`. Coordinates are 1-based as reported.
    CursorReport {
        row: u16,
        col: u16,
        /// Carried the leading `?`, which makes the report
        /// distinguishable from user-typed input.
        dec: bool,
        page: Option<u16>,
    },
    /// Terminal parameters report (`CSI … x`).
    TerminalParameters(ParamList),
    /// Palette color report (`OSC 4 ; index ; colorspec`).
    Color {
        index: Option<u16>,
        color: Option<RgbColor>,
        /// Terminated with `ESC \` rather than BEL.
        st_terminated: bool,
    },
}

/// Outcome of classifying one CSI sequence during detection.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) enum Classified {
    /// A reply the detection record has a slot for.
    Reply(Reply),
    /// A recognized reply context whose content does not parse; dropped
    /// after logging, detection continues.
    Malformed(&'static str),
    /// Not a probe reply at all; belongs to the host as ordinary input.
    Unrecognized,
}

/// Numeric parameter at `idx`, defaulting to 0 when absent or empty.
/// `None` means the parameter is present but not numeric.
fn param(params: &[&[u8]], idx: usize) -> Option<u16> {
    match params.get(idx) {
        None => Some(0),
        Some(p) if p.is_empty() => Some(0),
        Some(p) => std::str::from_utf8(p).ok()?.parse().ok(),
    }
}

fn param_list(params: &[&[u8]]) -> Option<ParamList> {
    (0..params.len()).map(|idx| param(params, idx)).collect()
}

/// Classify one CSI sequence received while detection is running.
pub(crate) fn classify_csi(csi: &CSI<'_>) -> Classified {
    if !csi.intermediates.as_ref().is_empty() {
        return Classified::Unrecognized;
    }

    let mut params: SmallVec<[&[u8]; 8]> = SmallVec::new();
    for param in &csi.params {
        params.push(param);
    }
    let params = params.as_slice();

    match (csi.private, csi.final_byte) {
        (Some(b'>'), b'c') => {
            match (param(params, 0), param(params, 1), param(params, 2)) {
                (Some(kind), Some(version), Some(extra)) => {
                    Classified::Reply(Reply::SecondaryDa {
                        kind,
                        version,
                        extra,
                    })
                }
                _ => Classified::Malformed("secondary DA"),
            }
        }
        (Some(b'?'), b'c') => match param_list(params) {
            Some(params) => Classified::Reply(Reply::PrimaryDa(params)),
            None => Classified::Malformed("primary DA"),
        },
        (None, b'c') => Classified::Malformed("device attributes"),
        (None, b'n') => match param(params, 0) {
            Some(0) => Classified::Reply(Reply::OperatingStatusOk),
            _ => Classified::Malformed("device status"),
        },
        (None, b'R') => {
            if params.is_empty() {
                return Classified::Malformed("cursor report");
            }
            match (param(params, 0), param(params, 1)) {
                (Some(row), Some(col)) => {
                    Classified::Reply(Reply::CursorReport {
                        row,
                        col,
                        dec: false,
                        page: None,
                    })
                }
                _ => Classified::Malformed("cursor report"),
            }
        }
        (Some(b'?'), b'R') => {
            if params.is_empty() {
                return Classified::Malformed("cursor report");
            }
            let page = if params.len() >= 3 {
                match param(params, 2) {
                    Some(page) => Some(page),
                    None => return Classified::Malformed("cursor report"),
                }
            } else {
                None
            };
            match (param(params, 0), param(params, 1)) {
                (Some(row), Some(col)) => {
                    Classified::Reply(Reply::CursorReport {
                        row,
                        col,
                        dec: true,
                        page,
                    })
                }
                _ => Classified::Malformed("cursor report"),
            }
        }
        (None, b'x') => match param_list(params) {
            Some(params) => {
                Classified::Reply(Reply::TerminalParameters(params))
            }
            None => Classified::Malformed("terminal parameters"),
        },
        _ => Classified::Unrecognized,
    }
}

/// Classify an assembled OSC payload. `None` is anything other than a
/// palette color report.
pub(crate) fn classify_osc(data: &[u8], used_bel: bool) -> Option<Reply> {
    let mut fields = data.split(|byte| *byte == b';');
    if fields.next() != Some(b"4".as_slice()) {
        return None;
    }

    let second = fields.next()?;
    // Some terminals (rxvt-unicode) leave the palette index out of the
    // reply entirely.
    let (index, spec) = if second.iter().all(u8::is_ascii_digit) {
        let index = std::str::from_utf8(second).ok()?.parse().ok()?;
        (Some(index), fields.next()?)
    } else {
        (None, second)
    };

    Some(Reply::Color {
        index,
        color: parse_rgb(spec),
        st_terminated: !used_bel,
    })
}

/// Classify the payload of a `DCS ! |` report into the tertiary-DA unit
/// id.
pub(crate) fn classify_dcs_unit_id(data: &[u8]) -> Option<Reply> {
    let hex = std::str::from_utf8(data).ok()?;
    let id = u32::from_str_radix(hex, 16).ok()?;
    Some(Reply::TertiaryDa { id })
}

/// Parse one 1-4 digit hex component, scaled to 16 bits the way X11 color
/// specifications define it.
fn hex_component(input: &[u8]) -> Option<(u16, usize)> {
    let mut value: u16 = 0;
    let mut count = 0usize;

    for &byte in input.iter().take(4) {
        if byte == b'/' {
            break;
        }
        let digit = (byte as char).to_digit(16)?;
        value = (value << 4) | u16::try_from(digit).ok()?;
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let scaled = match count {
        1 => value << 12 | value << 8 | value << 4 | value,
        2 => value << 8 | value,
        3 => value << 4 | value >> 8,
        4 => value,
        _ => unreachable!(),
    };

    Some((scaled, count))
}

/// Parse an `rgb:r/g/b` color specification. Other X11 color schemes are
/// never produced by OSC 4 replies and parse to `None`.
pub(crate) fn parse_rgb(spec: &[u8]) -> Option<RgbColor> {
    let rest = spec.strip_prefix(b"rgb:")?;
    let (red, len) = hex_component(rest)?;
    let rest = rest[len..].strip_prefix(b"/")?;
    let (green, len) = hex_component(rest)?;
    let rest = rest[len..].strip_prefix(b"/")?;
    let (blue, len) = hex_component(rest)?;
    if rest.len() != len {
        return None;
    }
    Some(RgbColor { red, green, blue })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vt_push_parser::{VT_PARSER_INTEREST_ALL, VTPushParser, event::VTEvent};

    fn classify_bytes(input: &[u8]) -> Vec<Classified> {
        let mut parser =
            VTPushParser::new_with_interest::<VT_PARSER_INTEREST_ALL>();
        let mut out = Vec::new();
        parser.feed_with(input, |event: VTEvent| {
            if let VTEvent::Csi(csi) = event {
                out.push(classify_csi(&csi));
            }
        });
        out
    }

    fn classify_one(input: &[u8]) -> Classified {
        let mut classified = classify_bytes(input);
        assert_eq!(classified.len(), 1);
        classified.remove(0)
    }

    #[test]
    fn test_secondary_da() {
        assert_eq!(
            classify_one(b"\x1b[>0;264;0c"),
            Classified::Reply(Reply::SecondaryDa {
                kind: 0,
                version: 264,
                extra: 0
            })
        );
    }

    #[test]
    fn test_secondary_da_defaults_missing_params() {
        assert_eq!(
            classify_one(b"\x1b[>84c"),
            Classified::Reply(Reply::SecondaryDa {
                kind: 84,
                version: 0,
                extra: 0
            })
        );
    }

    #[test]
    fn test_primary_da_echo() {
        let Classified::Reply(Reply::PrimaryDa(params)) =
            classify_one(b"\x1b[?6c")
        else {
            panic!("expected primary DA");
        };
        assert_eq!(params.as_slice(), &[6]);
    }

    #[test]
    fn test_operating_status() {
        assert_eq!(
            classify_one(b"\x1b[0n"),
            Classified::Reply(Reply::OperatingStatusOk)
        );
    }

    #[test]
    fn test_operating_status_malfunction_is_malformed() {
        assert!(matches!(
            classify_one(b"\x1b[3n"),
            Classified::Malformed(_)
        ));
    }

    #[test]
    fn test_cursor_report() {
        assert_eq!(
            classify_one(b"\x1b[3;11R"),
            Classified::Reply(Reply::CursorReport {
                row: 3,
                col: 11,
                dec: false,
                page: None
            })
        );
    }

    #[test]
    fn test_dec_cursor_report_with_page() {
        assert_eq!(
            classify_one(b"\x1b[?3;11;1R"),
            Classified::Reply(Reply::CursorReport {
                row: 3,
                col: 11,
                dec: true,
                page: Some(1)
            })
        );
    }

    #[test]
    fn test_terminal_parameters() {
        let Classified::Reply(Reply::TerminalParameters(params)) =
            classify_one(b"\x1b[3;1;1;128;128;1;0x")
        else {
            panic!("expected terminal parameters");
        };
        assert_eq!(params.as_slice(), &[3, 1, 1, 128, 128, 1, 0]);
    }

    #[test]
    fn test_arrow_key_is_unrecognized() {
        assert_eq!(classify_one(b"\x1b[A"), Classified::Unrecognized);
        assert_eq!(classify_one(b"\x1b[1;5C"), Classified::Unrecognized);
    }

    #[test]
    fn test_intermediates_are_unrecognized() {
        assert_eq!(classify_one(b"\x1b[1 q"), Classified::Unrecognized);
    }

    #[test]
    fn test_osc_color_with_index() {
        assert_eq!(
            classify_osc(b"4;255;rgb:eeee/eeee/eeee", true),
            Some(Reply::Color {
                index: Some(255),
                color: Some(RgbColor {
                    red: 0xeeee,
                    green: 0xeeee,
                    blue: 0xeeee
                }),
                st_terminated: false,
            })
        );
    }

    #[test]
    fn test_osc_color_without_index() {
        // rxvt-unicode answers without echoing the palette index
        assert_eq!(
            classify_osc(b"4;rgb:eeee/eeee/eeee", false),
            Some(Reply::Color {
                index: None,
                color: Some(RgbColor {
                    red: 0xeeee,
                    green: 0xeeee,
                    blue: 0xeeee
                }),
                st_terminated: true,
            })
        );
    }

    #[test]
    fn test_osc_non_color_is_none() {
        assert_eq!(classify_osc(b"0;title", true), None);
        assert_eq!(classify_osc(b"", true), None);
    }

    #[test]
    fn test_dcs_unit_id() {
        assert_eq!(
            classify_dcs_unit_id(b"FFFFFFFF"),
            Some(Reply::TertiaryDa { id: 0xFFFF_FFFF })
        );
        assert_eq!(
            classify_dcs_unit_id(b"7E7E5459"),
            Some(Reply::TertiaryDa { id: 0x7E7E_5459 })
        );
        // mlterm pads to six digits, xterm 280 answers a bare zero
        assert_eq!(
            classify_dcs_unit_id(b"000000"),
            Some(Reply::TertiaryDa { id: 0 })
        );
        assert_eq!(
            classify_dcs_unit_id(b"0"),
            Some(Reply::TertiaryDa { id: 0 })
        );
        assert_eq!(classify_dcs_unit_id(b"xyz"), None);
    }

    #[test]
    fn test_rgb_component_scaling() {
        assert_eq!(
            parse_rgb(b"rgb:e/e/e"),
            Some(RgbColor {
                red: 0xeeee,
                green: 0xeeee,
                blue: 0xeeee
            })
        );
        assert_eq!(
            parse_rgb(b"rgb:12/34/56"),
            Some(RgbColor {
                red: 0x1212,
                green: 0x3434,
                blue: 0x5656
            })
        );
        assert_eq!(
            parse_rgb(b"rgb:123/456/789"),
            Some(RgbColor {
                red: 0x1231,
                green: 0x4564,
                blue: 0x7897
            })
        );
        assert_eq!(parse_rgb(b"rgb:eeee/eeee"), None);
        assert_eq!(parse_rgb(b"#eeeeee"), None);
    }
}
