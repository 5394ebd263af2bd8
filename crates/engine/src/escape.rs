//! Escape codec – renders arbitrary text as a fragment that is safe to place
//! between the double quotes of a script string literal, and back.
//!
//! Every strategy obeys `decode(encode(x, s), s) == x`. Standard, Unicode and
//! Hex can never emit a bare `"`; Raw emits the input untouched and therefore
//! refuses inputs that contain the delimiter.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

/// The character the templates use to delimit string literals.
pub const DELIMITER: char = '"';

/// How the input text is represented inside a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EscapeStrategy {
    /// Backslash escapes for `\\`, `\"`, `\n`, `\r` and `\t`; everything else verbatim.
    #[default]
    Standard,
    /// Every character as a `\uXXXX` code unit (surrogate pairs above U+FFFF).
    Unicode,
    /// Every UTF-8 byte as `\xHH`.
    #[serde(rename = "Hexadecimal")]
    Hex,
    /// No transformation at all.
    Raw,
}

impl EscapeStrategy {
    pub const ALL: [EscapeStrategy; 4] = [
        EscapeStrategy::Standard,
        EscapeStrategy::Unicode,
        EscapeStrategy::Hex,
        EscapeStrategy::Raw,
    ];

    /// Lowercase name, as accepted on the request boundary.
    pub fn name(self) -> &'static str {
        match self {
            EscapeStrategy::Standard => "standard",
            EscapeStrategy::Unicode => "unicode",
            EscapeStrategy::Hex => "hex",
            EscapeStrategy::Raw => "raw",
        }
    }

    /// Text that opens a literal holding a fragment of this strategy.
    pub fn literal_opener(self) -> &'static str {
        match self {
            EscapeStrategy::Raw => "r\"",
            _ => "\"",
        }
    }

    pub fn encode(self, input: &str) -> Result<String, GenerationError> {
        encode(input, self)
    }

    pub fn decode(self, fragment: &str) -> Result<String, DecodeError> {
        decode(fragment, self)
    }
}

impl std::fmt::Display for EscapeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EscapeStrategy {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(EscapeStrategy::Standard),
            "unicode" => Ok(EscapeStrategy::Unicode),
            "hex" | "hexadecimal" => Ok(EscapeStrategy::Hex),
            "raw" => Ok(EscapeStrategy::Raw),
            _ => Err(GenerationError::UnsupportedStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unescaped delimiter at byte {offset}")]
    UnescapedDelimiter { offset: usize },
    #[error("invalid escape sequence at byte {offset}")]
    InvalidEscape { offset: usize },
    #[error("truncated escape sequence at byte {offset}")]
    TruncatedEscape { offset: usize },
    #[error("unexpected character {found:?} at byte {offset}")]
    UnexpectedChar { found: char, offset: usize },
    #[error("unpaired surrogate at byte {offset}")]
    LoneSurrogate { offset: usize },
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

pub fn encode(input: &str, strategy: EscapeStrategy) -> Result<String, GenerationError> {
    let fragment = match strategy {
        EscapeStrategy::Standard => encode_standard(input),
        EscapeStrategy::Unicode => encode_unicode(input),
        EscapeStrategy::Hex => encode_hex(input),
        EscapeStrategy::Raw => {
            check_raw(input)?;
            input.to_string()
        }
    };
    debug_assert!(
        unescaped_delimiter(&fragment, strategy).is_none(),
        "{strategy} fragment leaks a bare delimiter"
    );
    Ok(fragment)
}

/// Fails with `UnsafeRawInput` at the first delimiter in `input`.
pub fn check_raw(input: &str) -> Result<(), GenerationError> {
    match input.char_indices().find(|&(_, c)| c == DELIMITER) {
        Some((offset, found)) => Err(GenerationError::UnsafeRawInput { found, offset }),
        None => Ok(()),
    }
}

pub(crate) fn encode_standard(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 4);
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn encode_unicode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 6);
    for unit in input.encode_utf16() {
        let _ = write!(out, "\\u{:04x}", unit);
    }
    out
}

fn encode_hex(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 4);
    for byte in input.bytes() {
        let _ = write!(out, "\\x{:02x}", byte);
    }
    out
}

/// Byte offset of the first delimiter that would close the literal early.
fn unescaped_delimiter(fragment: &str, strategy: EscapeStrategy) -> Option<usize> {
    if strategy == EscapeStrategy::Raw {
        return fragment.find(DELIMITER);
    }
    let mut escaped = false;
    for (offset, c) in fragment.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            DELIMITER => return Some(offset),
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

pub fn decode(fragment: &str, strategy: EscapeStrategy) -> Result<String, DecodeError> {
    match strategy {
        EscapeStrategy::Standard => decode_standard(fragment),
        EscapeStrategy::Unicode => decode_unicode(fragment),
        EscapeStrategy::Hex => decode_hex(fragment),
        EscapeStrategy::Raw => match fragment.find(DELIMITER) {
            Some(offset) => Err(DecodeError::UnescapedDelimiter { offset }),
            None => Ok(fragment.to_string()),
        },
    }
}

fn decode_standard(fragment: &str) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(fragment.len());
    let mut chars = fragment.char_indices();
    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, next) = chars
                    .next()
                    .ok_or(DecodeError::TruncatedEscape { offset })?;
                out.push(match next {
                    '\\' => '\\',
                    '"' => '"',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    _ => return Err(DecodeError::InvalidEscape { offset }),
                });
            }
            DELIMITER => return Err(DecodeError::UnescapedDelimiter { offset }),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Reads `\` + `marker` + `width` hex digits starting at `offset`.
fn read_escape(fragment: &str, offset: usize, marker: u8, width: usize) -> Result<u32, DecodeError> {
    let bytes = fragment.as_bytes();
    match bytes.get(offset) {
        Some(b'\\') => {}
        Some(_) => {
            let found = fragment[offset..].chars().next().unwrap_or(DELIMITER);
            return Err(if found == DELIMITER {
                DecodeError::UnescapedDelimiter { offset }
            } else {
                DecodeError::UnexpectedChar { found, offset }
            });
        }
        None => return Err(DecodeError::TruncatedEscape { offset }),
    }
    match bytes.get(offset + 1) {
        Some(&b) if b == marker => {}
        Some(_) => return Err(DecodeError::InvalidEscape { offset }),
        None => return Err(DecodeError::TruncatedEscape { offset }),
    }
    let digits = bytes
        .get(offset + 2..offset + 2 + width)
        .ok_or(DecodeError::TruncatedEscape { offset })?;
    digits.iter().try_fold(0u32, |acc, &d| {
        (d as char)
            .to_digit(16)
            .map(|v| acc * 16 + v)
            .ok_or(DecodeError::InvalidEscape { offset })
    })
}

fn decode_unicode(fragment: &str) -> Result<String, DecodeError> {
    let mut units = Vec::with_capacity(fragment.len() / 6);
    let mut offsets = Vec::with_capacity(fragment.len() / 6);
    let mut offset = 0;
    while offset < fragment.len() {
        units.push(read_escape(fragment, offset, b'u', 4)? as u16);
        offsets.push(offset);
        offset += 6;
    }
    let mut out = String::with_capacity(units.len());
    let mut consumed = 0;
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) => {
                consumed += c.len_utf16();
                out.push(c);
            }
            Err(_) => {
                let offset = offsets.get(consumed).copied().unwrap_or(0);
                return Err(DecodeError::LoneSurrogate { offset });
            }
        }
    }
    Ok(out)
}

fn decode_hex(fragment: &str) -> Result<String, DecodeError> {
    let mut bytes = Vec::with_capacity(fragment.len() / 4);
    let mut offset = 0;
    while offset < fragment.len() {
        bytes.push(read_escape(fragment, offset, b'x', 2)? as u8);
        offset += 4;
    }
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "hello",
        "line one\nline two\r\n\tindented",
        "say \"hi\" with a back\\slash",
        "naïve café – ünïcödé",
        "emoji 🦀 and 𝄞 clef",
        "\u{0}\u{1}\u{7f} controls",
        " ",
        "\\\"",
    ];

    #[test]
    fn test_standard_escape() {
        let s = EscapeStrategy::Standard;
        assert_eq!(s.encode("hello").unwrap(), "hello");
        assert_eq!(s.encode("hello\nworld").unwrap(), "hello\\nworld");
        assert_eq!(s.encode("say \"hi\"").unwrap(), "say \\\"hi\\\"");
        assert_eq!(s.encode("back\\slash").unwrap(), "back\\\\slash");
        assert_eq!(s.encode("a\tb\rc").unwrap(), "a\\tb\\rc");
        // everything else passes through
        assert_eq!(s.encode("it's\u{0}é").unwrap(), "it's\u{0}é");
    }

    #[test]
    fn test_newline_and_quote_are_two_char_escapes() {
        let encoded = EscapeStrategy::Standard.encode("\n\"").unwrap();
        assert_eq!(encoded, "\\n\\\"");
        assert_eq!(EscapeStrategy::Standard.decode(&encoded).unwrap(), "\n\"");
    }

    #[test]
    fn test_unicode_escapes_every_char() {
        let s = EscapeStrategy::Unicode;
        assert_eq!(s.encode("hi").unwrap(), "\\u0068\\u0069");
        assert_eq!(s.encode("\"").unwrap(), "\\u0022");
        assert_eq!(s.encode("🦀").unwrap(), "\\ud83e\\udd80");
    }

    #[test]
    fn test_hex_escapes_every_byte() {
        let s = EscapeStrategy::Hex;
        assert_eq!(s.encode("hi\n").unwrap(), "\\x68\\x69\\x0a");
        assert_eq!(s.encode("é").unwrap(), "\\xc3\\xa9");
    }

    #[test]
    fn test_raw_passes_through_or_refuses() {
        let s = EscapeStrategy::Raw;
        assert_eq!(s.encode("a\\b\nc").unwrap(), "a\\b\nc");
        assert_eq!(
            s.encode("ab\"c"),
            Err(GenerationError::UnsafeRawInput { found: '"', offset: 2 })
        );
    }

    #[test]
    fn test_round_trip_all_strategies() {
        for strategy in EscapeStrategy::ALL {
            for sample in SAMPLES {
                if strategy == EscapeStrategy::Raw && sample.contains(DELIMITER) {
                    continue;
                }
                let encoded = strategy.encode(sample).unwrap();
                assert_eq!(
                    strategy.decode(&encoded).unwrap(),
                    *sample,
                    "{strategy} round trip of {sample:?}"
                );
            }
        }
    }

    #[test]
    fn test_no_bare_delimiter_in_escaped_output() {
        for strategy in [EscapeStrategy::Standard, EscapeStrategy::Unicode, EscapeStrategy::Hex] {
            for sample in SAMPLES {
                let encoded = strategy.encode(sample).unwrap();
                assert_eq!(unescaped_delimiter(&encoded, strategy), None);
                if strategy != EscapeStrategy::Standard {
                    assert!(!encoded.contains(DELIMITER));
                }
            }
        }
    }

    #[test]
    fn test_decode_rejects_malformed_fragments() {
        use EscapeStrategy::*;
        assert_eq!(Standard.decode("a\"b"), Err(DecodeError::UnescapedDelimiter { offset: 1 }));
        assert_eq!(Standard.decode("a\\q"), Err(DecodeError::InvalidEscape { offset: 1 }));
        assert_eq!(Standard.decode("ab\\"), Err(DecodeError::TruncatedEscape { offset: 2 }));
        assert_eq!(
            Unicode.decode("\\u0068i"),
            Err(DecodeError::UnexpectedChar { found: 'i', offset: 6 })
        );
        assert_eq!(Unicode.decode("\\u00"), Err(DecodeError::TruncatedEscape { offset: 0 }));
        assert_eq!(Unicode.decode("\\ud83e"), Err(DecodeError::LoneSurrogate { offset: 0 }));
        assert_eq!(Hex.decode("\\xzz"), Err(DecodeError::InvalidEscape { offset: 0 }));
        assert_eq!(Hex.decode("\\xc3"), Err(DecodeError::InvalidUtf8));
        assert_eq!(Raw.decode("x\""), Err(DecodeError::UnescapedDelimiter { offset: 1 }));
    }

    #[test]
    fn test_parse_strategy_names() {
        assert_eq!("standard".parse::<EscapeStrategy>().unwrap(), EscapeStrategy::Standard);
        assert_eq!("Unicode".parse::<EscapeStrategy>().unwrap(), EscapeStrategy::Unicode);
        assert_eq!("hexadecimal".parse::<EscapeStrategy>().unwrap(), EscapeStrategy::Hex);
        assert_eq!(" RAW ".parse::<EscapeStrategy>().unwrap(), EscapeStrategy::Raw);
        assert_eq!(
            "base64".parse::<EscapeStrategy>(),
            Err(GenerationError::UnsupportedStrategy("base64".into()))
        );
    }

    #[test]
    fn test_serialized_strategy_names() {
        let names: Vec<serde_json::Value> = EscapeStrategy::ALL
            .iter()
            .map(|s| serde_json::to_value(s).unwrap())
            .collect();
        assert_eq!(names, ["Standard", "Unicode", "Hexadecimal", "Raw"]);
        let hex: EscapeStrategy = serde_json::from_str("\"Hexadecimal\"").unwrap();
        assert_eq!(hex, EscapeStrategy::Hex);
        assert_eq!(hex.name(), "hex");
    }
}
