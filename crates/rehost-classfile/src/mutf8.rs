//! Modified UTF-8, the string encoding of `CONSTANT_Utf8` entries.
//!
//! Differs from standard UTF-8 in two ways: `U+0000` is written as the two
//! byte sequence `C0 80`, and supplementary characters are written as a
//! surrogate pair with each half encoded as a three byte sequence.

use crate::error::{ClassError, ClassResult};

/// Decode modified UTF-8 into UTF-16 code units.
fn decode_units(bytes: &[u8]) -> ClassResult<Vec<u16>> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let a = bytes[i] as u16;
        if a & 0x80 == 0 {
            units.push(a);
            i += 1;
        } else if a & 0xE0 == 0xC0 {
            let b = *bytes.get(i + 1).ok_or(ClassError::InvalidUtf8(i))? as u16;
            if b & 0xC0 != 0x80 {
                return Err(ClassError::InvalidUtf8(i + 1));
            }
            units.push(((a & 0x1F) << 6) | (b & 0x3F));
            i += 2;
        } else if a & 0xF0 == 0xE0 {
            let b = *bytes.get(i + 1).ok_or(ClassError::InvalidUtf8(i))? as u16;
            let c = *bytes.get(i + 2).ok_or(ClassError::InvalidUtf8(i))? as u16;
            if b & 0xC0 != 0x80 || c & 0xC0 != 0x80 {
                return Err(ClassError::InvalidUtf8(i + 1));
            }
            units.push(((a & 0x0F) << 12) | ((b & 0x3F) << 6) | (c & 0x3F));
            i += 3;
        } else {
            return Err(ClassError::InvalidUtf8(i));
        }
    }
    Ok(units)
}

/// Decode a `CONSTANT_Utf8` payload.
///
/// Returns `Ok(None)` when the bytes are well formed but hold an unpaired
/// surrogate, which Rust strings cannot represent.
pub fn decode(bytes: &[u8]) -> ClassResult<Option<String>> {
    let units = decode_units(bytes)?;
    Ok(char::decode_utf16(units).collect::<Result<String, _>>().ok())
}

/// Encode a string as a `CONSTANT_Utf8` payload.
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ascii_is_unchanged() {
        assert_eq!(encode("net/minecraft/Block"), b"net/minecraft/Block");
        assert_eq!(decode(b"Lfoo;").unwrap().as_deref(), Some("Lfoo;"));
    }

    #[test]
    fn nul_uses_two_bytes() {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap().as_deref(), Some("a\0b"));
    }

    #[test]
    fn supplementary_chars_use_surrogate_pairs() {
        let encoded = encode("\u{1F600}");
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode(&encoded).unwrap().as_deref(), Some("\u{1F600}"));
    }

    #[test]
    fn unpaired_surrogate_is_not_a_string() {
        // 0xD800 encoded on its own
        assert_eq!(decode(&[0xED, 0xA0, 0x80]).unwrap(), None);
    }

    #[test]
    fn truncated_sequence_is_an_error() {
        assert!(matches!(decode(&[0xE0, 0x80]), Err(ClassError::InvalidUtf8(0))));
    }

    proptest! {
        #[test]
        fn encoding_is_reversible(text in "\\PC*") {
            let encoded = encode(&text);
            prop_assert_eq!(decode(&encoded).unwrap(), Some(text));
        }
    }
}
