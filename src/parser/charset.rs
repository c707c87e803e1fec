//! Charset lookup and byte → text conversion.

use encoding_rs::Encoding;
use tracing::warn;

/// Decode raw message bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn bytes_to_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Decode one part's bytes as text: its declared charset if it names a known
/// non-UTF-8 encoding, otherwise UTF-8 with the Windows-1252 fallback.
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> String {
    match charset.and_then(non_utf8_encoding) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => bytes_to_text(bytes),
    }
}

/// Resolve a charset label to an encoding other than UTF-8.
///
/// Returns `None` for UTF-8, US-ASCII (a strict subset), and unknown labels,
/// all of which are decoded as UTF-8 by callers.
///
/// Labels follow the WHATWG Encoding Standard, so `iso-8859-1` and `latin1`
/// resolve to Windows-1252. It agrees with ISO-8859-1 on every byte except
/// 0x80..=0x9F, where mail labelled Latin-1 carries Windows-1252 punctuation
/// (`€`, curly quotes) rather than C1 controls.
pub fn non_utf8_encoding(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().trim_matches('"');
    if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
        return None;
    }
    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) if encoding != encoding_rs::UTF_8 => Some(encoding),
        Some(_) => None,
        None => {
            warn!(charset = label, "Unknown charset, falling back to UTF-8");
            None
        }
    }
}

/// Decode bytes in the named charset, rejecting malformed input.
pub fn decode_strict(label: &str, bytes: &[u8]) -> Option<String> {
    match non_utf8_encoding(label) {
        Some(encoding) => encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|s| s.into_owned()),
        None => std::str::from_utf8(bytes).ok().map(str::to_string),
    }
}

/// Decode bytes in the named charset, replacing malformed sequences.
pub fn decode_lossy(label: &str, bytes: &[u8]) -> String {
    match non_utf8_encoding(label) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_text_utf8() {
        assert_eq!(bytes_to_text("Señal".as_bytes()), "Señal");
    }

    #[test]
    fn test_bytes_to_text_latin1_fallback() {
        assert_eq!(bytes_to_text(b"Se\xf1al"), "Señal");
    }

    #[test]
    fn test_non_utf8_encoding() {
        assert!(non_utf8_encoding("UTF-8").is_none());
        assert!(non_utf8_encoding("utf8").is_none());
        assert!(non_utf8_encoding("us-ascii").is_none());
        assert!(non_utf8_encoding("x-unknown-charset").is_none());
        assert!(non_utf8_encoding("ISO-8859-1").is_some());
        assert!(non_utf8_encoding("\"koi8-r\"").is_some());
    }

    #[test]
    fn test_decode_strict_rejects_bad_utf8() {
        assert_eq!(decode_strict("utf-8", b"caf\xc3\xa9").as_deref(), Some("café"));
        assert!(decode_strict("utf-8", b"caf\xe9").is_none());
        assert_eq!(decode_strict("iso-8859-1", b"caf\xe9").as_deref(), Some("café"));
    }

    #[test]
    fn test_latin1_label_reads_windows_1252_punctuation() {
        assert_eq!(decode_strict("ISO-8859-1", b"caf\xe9").as_deref(), Some("café"));
        assert_eq!(decode_strict("latin1", b"\x80 \x93x\x94").as_deref(), Some("€ “x”"));
    }

    #[test]
    fn test_decode_text_per_part() {
        assert_eq!(decode_text("Café".as_bytes(), None), "Café");
        assert_eq!(decode_text("Café".as_bytes(), Some("utf-8")), "Café");
        assert_eq!(decode_text(b"Caf\xe9", None), "Café");
        assert_eq!(decode_text(b"\xcf\xf0\xe8", Some("windows-1251")), "При");
    }

    #[test]
    fn test_decode_lossy_unknown_charset() {
        assert_eq!(decode_lossy("nonsense", b"abc"), "abc");
    }
}
