//! Text decoding for on-disk names and comments.
//!
//! AmigaDOS stores names as ISO-8859-1. Names written by modern tools are
//! frequently UTF-8, so valid UTF-8 is kept as is and anything else is
//! mapped byte-for-byte from Latin-1.

use std::borrow::Cow;

/// Validate bytes as UTF-8.
///
/// Uses simdutf8 for fast validation when available.
#[inline]
pub fn from_utf8(bytes: &[u8]) -> Option<&str> {
    #[cfg(not(miri))]
    {
        simdutf8::basic::from_utf8(bytes).ok()
    }

    #[cfg(miri)]
    {
        core::str::from_utf8(bytes).ok()
    }
}

/// Decode a name, falling back to Latin-1 for non-UTF-8 bytes.
pub fn decode_name(bytes: &[u8]) -> Cow<'_, str> {
    match from_utf8(bytes) {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Encode a name for comparison with on-disk bytes.
///
/// Text that fits Latin-1 is encoded as Latin-1; anything else keeps its
/// UTF-8 bytes.
pub fn encode_name(name: &str) -> Cow<'_, [u8]> {
    if name.is_ascii() {
        return Cow::Borrowed(name.as_bytes());
    }
    name.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .map_or(Cow::Borrowed(name.as_bytes()), Cow::Owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_utf8() {
        assert_eq!(from_utf8(b"hello"), Some("hello"));
        assert!(matches!(decode_name(b"hello"), Cow::Borrowed("hello")));
    }

    #[test]
    fn test_latin1_fallback() {
        // "Käse" in ISO-8859-1
        assert_eq!(decode_name(&[0x4B, 0xE4, 0x73, 0x65]), "Käse");
    }

    #[test]
    fn test_encode_name() {
        assert!(matches!(encode_name("abc"), Cow::Borrowed(_)));
        assert_eq!(&*encode_name("abc"), b"abc");
        assert_eq!(&*encode_name("Käse"), &[0x4B, 0xE4, 0x73, 0x65]);
        assert_eq!(&*encode_name("日本"), "日本".as_bytes());
    }

    #[test]
    fn test_utf8_multibyte() {
        assert_eq!(decode_name("café".as_bytes()), "café");
    }
}
