//! Content-Transfer-Encoding decoding (RFC 2045): quoted-printable and base64.
//!
//! Every decoder here is total. Malformed escapes are emitted literally and
//! undecodable base64 is returned unchanged.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::{Serialize, Serializer};

use super::charset;

/// Standard-alphabet base64 that accepts missing padding and trailing bits.
pub const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Declared `Content-Transfer-Encoding` of a part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
    /// Anything else, lower-cased. Passed through undecoded.
    Other(String),
}

impl TransferEncoding {
    /// Parse a header value. An absent header means `7bit`.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::SevenBit;
        };
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "quoted-printable" => Self::QuotedPrintable,
            "base64" => Self::Base64,
            _ => Self::Other(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
            Self::Other(s) => s,
        }
    }
}

impl Serialize for TransferEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Decode a part body according to its transfer encoding.
///
/// Works on the part's own bytes. `charset` is the part's declared
/// `charset=` parameter; decoded bytes are read in that charset when it names
/// a known non-UTF-8 encoding, otherwise as UTF-8 with a Windows-1252
/// fallback. Undecodable base64 is returned as written.
pub fn decode_body(body: &[u8], encoding: &TransferEncoding, charset: Option<&str>) -> String {
    match encoding {
        TransferEncoding::QuotedPrintable => {
            let stripped = strip_soft_breaks(body);
            let decoded = unescape_hex(&stripped, false);
            match charset.and_then(charset::non_utf8_encoding) {
                Some(_) => charset::decode_text(&decoded, charset),
                None => String::from_utf8(decoded)
                    .unwrap_or_else(|_| charset::bytes_to_text(&stripped)),
            }
        }
        TransferEncoding::Base64 => match decode_base64(body) {
            Some(bytes) => charset::decode_text(&bytes, charset),
            None => charset::bytes_to_text(body),
        },
        _ => charset::decode_text(body, charset),
    }
}

/// Decode quoted-printable text.
///
/// Works on bytes so that multi-byte UTF-8 sequences split across `=XX`
/// escapes come out whole. If the result is not valid UTF-8, the input with
/// only its soft line breaks removed is returned.
pub fn decode_quoted_printable(input: &str) -> String {
    let stripped = strip_soft_breaks(input.as_bytes());
    let bytes = unescape_hex(&stripped, false);
    String::from_utf8(bytes).unwrap_or_else(|_| String::from_utf8_lossy(&stripped).into_owned())
}

/// Decode quoted-printable to raw bytes.
pub fn decode_quoted_printable_bytes(input: &[u8]) -> Vec<u8> {
    unescape_hex(&strip_soft_breaks(input), false)
}

/// Decode the RFC 2047 "Q" encoding: quoted-printable plus `_` for space.
pub fn decode_q_encoding(input: &str) -> Vec<u8> {
    unescape_hex(&strip_soft_breaks(input.as_bytes()), true)
}

/// Decode base64, ignoring embedded whitespace. `None` if invalid.
pub fn decode_base64(input: &[u8]) -> Option<Vec<u8>> {
    BASE64_LENIENT.decode(compact_base64(input)).ok()
}

/// Base64 text with all whitespace removed.
pub fn compact_base64(input: &[u8]) -> Vec<u8> {
    input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

/// Encode bytes as standard padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Remove `=` soft line breaks (`=\r\n`, `=\n`, `=\r`).
fn strip_soft_breaks(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'=' {
            if let Some(b"\r\n") = input.get(i + 1..i + 3) {
                i += 3;
                continue;
            }
            if matches!(input.get(i + 1), Some(b'\n' | b'\r')) {
                i += 2;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    out
}

/// Replace `=XX` hex escapes with their byte. Any other `=` is literal.
fn unescape_hex(input: &[u8], underscore_as_space: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'=' if i + 2 < input.len() => {
                match (hex_value(input[i + 1]), hex_value(input[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            b'_' if underscore_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
