//! Percent-escaping of free-text fields.
//!
//! OPL reserves space, comma, `=`, `@` and `%` as structure, so any text field
//! that may contain them is escaped before it is written. Two schemes exist:
//!
//! - [`EscapeScheme::Unicode`] decodes the field as UTF-8 and lets through an
//!   allow-list of printable code points; everything else becomes `%` followed
//!   by the code point in lowercase hex, at least four digits wide.
//! - [`EscapeScheme::Bytes`] works on raw bytes, lets through ASCII
//!   alphanumerics and `- _ . : ;`, and writes everything else as `%` plus two
//!   hex digits.
//!
//! The schemes produce different bytes for the same input and are not
//! interchangeable on the reading side; [`unescape`] must be called with the
//! scheme that produced the text.

use crate::error::{OplError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Which escaping rules to apply to text fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeScheme {
    /// Code-point allow-list, `%xxxx` escapes. Rejects malformed UTF-8.
    #[default]
    Unicode,
    /// Byte allow-list, `%xx` escapes. Accepts any bytes.
    Bytes,
}

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Code points written verbatim by the Unicode scheme.
#[inline]
pub fn is_verbatim_char(c: char) -> bool {
    matches!(
        u32::from(c),
        0x0021..=0x0024
            | 0x0026..=0x002b
            | 0x002d..=0x003c
            | 0x003e..=0x003f
            | 0x0041..=0x007e
            | 0x00a1..=0x00ac
            | 0x00ae..=0x05ff
    )
}

/// Bytes written verbatim by the byte scheme.
#[inline]
pub fn is_verbatim_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':' | b';')
}

/// Append `data` to `out`, escaped with `scheme`.
///
/// `field` names the record field for error messages.
///
/// # Errors
/// [`OplError::Encoding`] when the Unicode scheme meets malformed UTF-8.
pub fn append_escaped(
    out: &mut String,
    field: &'static str,
    data: &[u8],
    scheme: EscapeScheme,
) -> Result<()> {
    match scheme {
        EscapeScheme::Unicode => {
            let text = std::str::from_utf8(data).map_err(|e| {
                OplError::encoding(
                    field,
                    format!("invalid UTF-8 after {} valid bytes", e.valid_up_to()),
                )
            })?;
            for c in text.chars() {
                if is_verbatim_char(c) {
                    out.push(c);
                } else {
                    // infallible on String
                    let _ = write!(out, "%{:04x}", u32::from(c));
                }
            }
        }
        EscapeScheme::Bytes => {
            out.reserve(data.len());
            for &b in data {
                if is_verbatim_byte(b) {
                    out.push(char::from(b));
                } else {
                    out.push('%');
                    out.push(char::from(HEX[usize::from(b >> 4)]));
                    out.push(char::from(HEX[usize::from(b & 0x0f)]));
                }
            }
        }
    }
    Ok(())
}

/// Escape a whole field into a fresh string.
pub fn escape(data: &[u8], scheme: EscapeScheme) -> Result<String> {
    let mut out = String::with_capacity(data.len());
    append_escaped(&mut out, "text", data, scheme)?;
    Ok(out)
}

/// Reverse [`escape`] for text produced with the same `scheme`.
///
/// The Unicode scheme reads four hex digits per escape. Code points above
/// U+FFFF escape to five or six digits, so `%1f600` may be U+1F600 or U+1F60
/// followed by a literal `0`. Such input is rejected rather than guessed:
/// `unescape` either returns the original bytes or an error, never other text.
///
/// # Errors
/// [`OplError::Encoding`] for truncated or non-hex escapes, escapes that name
/// a surrogate, or escapes ambiguous with a code point above U+FFFF.
pub fn unescape(text: &str, scheme: EscapeScheme) -> Result<Vec<u8>> {
    let width = match scheme {
        EscapeScheme::Unicode => 4,
        EscapeScheme::Bytes => 2,
    };
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let digits = bytes
            .get(i + 1..i + 1 + width)
            .ok_or_else(|| OplError::encoding("escape", format!("truncated escape at {i}")))?;
        let value = hex_value(digits)
            .ok_or_else(|| OplError::encoding("escape", format!("bad hex escape at {i}")))?;
        if scheme == EscapeScheme::Unicode
            && digits[0] != b'0'
            && bytes.get(i + 1 + width).is_some_and(u8::is_ascii_hexdigit)
        {
            return Err(OplError::encoding(
                "escape",
                format!("escape at {i} is ambiguous with a code point above U+FFFF"),
            ));
        }
        match scheme {
            EscapeScheme::Unicode => {
                let c = char::from_u32(value).ok_or_else(|| {
                    OplError::encoding("escape", format!("U+{value:04X} is not a scalar value"))
                })?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            EscapeScheme::Bytes => {
                // two hex digits always fit
                out.push(value as u8);
            }
        }
        i += 1 + width;
    }
    Ok(out)
}

fn hex_value(digits: &[u8]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, &b| {
        let d = char::from(b).to_digit(16)?;
        Some(acc * 16 + d)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicode_scheme_escapes_structural_characters() {
        let s = escape(b"a b,c=d@e%f", EscapeScheme::Unicode).unwrap();
        assert_eq!(s, "a%0020b%002cc%003dd%0040e%0025f");
    }

    #[test]
    fn byte_scheme_escapes_everything_outside_the_allow_list() {
        let s = escape(b"a b/c", EscapeScheme::Bytes).unwrap();
        assert_eq!(s, "a%20b%2fc");
        assert_eq!(escape("ü".as_bytes(), EscapeScheme::Bytes).unwrap(), "%c3%bc");
    }

    #[test]
    fn unicode_scheme_keeps_latin_and_escapes_beyond_the_range() {
        assert_eq!(escape("ü".as_bytes(), EscapeScheme::Unicode).unwrap(), "ü");
        assert_eq!(escape("東".as_bytes(), EscapeScheme::Unicode).unwrap(), "%6771");
        assert_eq!(escape("😀".as_bytes(), EscapeScheme::Unicode).unwrap(), "%1f600");
    }

    #[test]
    fn soft_hyphen_and_control_characters_are_escaped() {
        assert_eq!(escape("\u{ad}".as_bytes(), EscapeScheme::Unicode).unwrap(), "%00ad");
        assert_eq!(escape(b"\n\t", EscapeScheme::Unicode).unwrap(), "%000a%0009");
    }

    #[test]
    fn malformed_utf8_is_an_encoding_error() {
        let err = escape(&[b'a', 0xff, b'b'], EscapeScheme::Unicode).unwrap_err();
        assert!(err.is_encoding());
        assert_eq!(escape(&[0xff], EscapeScheme::Bytes).unwrap(), "%ff");
    }

    #[test]
    fn unescape_rejects_truncated_escapes() {
        assert!(unescape("ab%00", EscapeScheme::Unicode).is_err());
        assert!(unescape("ab%g1", EscapeScheme::Bytes).is_err());
        assert!(unescape("%d800", EscapeScheme::Unicode).is_err());
    }

    #[test]
    fn unescape_accepts_only_hex_digits() {
        assert!(unescape("%+f", EscapeScheme::Bytes).is_err());
        assert!(unescape("%+00f", EscapeScheme::Unicode).is_err());
        assert!(unescape("%-1", EscapeScheme::Bytes).is_err());
        assert_eq!(unescape("%2F", EscapeScheme::Bytes).unwrap(), b"/");
    }

    #[test]
    fn unescape_rejects_escapes_ambiguous_with_astral_code_points() {
        let escaped = escape("a b😀".as_bytes(), EscapeScheme::Unicode).unwrap();
        assert_eq!(escaped, "a%0020b%1f600");
        let err = unescape(&escaped, EscapeScheme::Unicode).unwrap_err();
        assert!(err.is_encoding());
        // a leading zero can never start a five-digit escape
        assert_eq!(unescape("%0020a", EscapeScheme::Unicode).unwrap(), b" a");
        assert_eq!(unescape("%6771x", EscapeScheme::Unicode).unwrap(), "東x".as_bytes());
    }
}
