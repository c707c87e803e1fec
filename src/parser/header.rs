//! RFC 5322 header handling: message splitting, unfolding, encoded-words (RFC 2047),
//! and date parsing.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use tracing::debug;

use super::charset::{self, bytes_to_text};
use super::transfer::{decode_base64, decode_q_encoding};
use crate::model::part::HeaderMap;

static ENCODED_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").expect("encoded-word pattern is valid")
});

/// Split a raw message or part into its unfolded headers and its body.
///
/// The header block ends at the first blank line (`\n` or `\r\n`) and is
/// read as text. The body is everything after that line, left as bytes so each
/// leaf can be decoded in its own charset. Input without a blank line is all
/// headers and has an empty body.
pub fn split_message(raw: &[u8]) -> (HeaderMap, &[u8]) {
    let mut offset = 0;
    for line in raw.split_inclusive(|&b| b == b'\n') {
        let content = line.strip_suffix(b"\n").unwrap_or(line);
        let content = content.strip_suffix(b"\r").unwrap_or(content);
        if content.is_empty() {
            let headers = unfold_headers(&bytes_to_text(&raw[..offset]));
            return (headers, &raw[offset + line.len()..]);
        }
        offset += line.len();
    }
    (unfold_headers(&bytes_to_text(raw)), &[])
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Names are lower-cased and trimmed; values are trimmed. A repeated name keeps
/// the last value. Lines that are neither a continuation nor contain a colon
/// are dropped.
pub fn unfold_headers(text: &str) -> HeaderMap {
    let mut lines: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = lines.last_mut() {
                let continued = line.trim();
                if !continued.is_empty() {
                    if !last.1.is_empty() {
                        last.1.push(' ');
                    }
                    last.1.push_str(continued);
                }
            }
        } else if let Some((name, value)) = line.split_once(':') {
            lines.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    let mut headers = HeaderMap::new();
    for (name, value) in lines {
        headers.insert(name, value);
    }
    headers
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Each word is decoded on its own; a word that fails (bad base64, bytes
/// invalid in its charset) is kept verbatim. Whitespace separating two
/// decoded words is dropped, all other text is kept.
pub fn decode_encoded_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }

    let mut result = String::with_capacity(input.len());
    let mut last_end = 0;
    let mut last_was_decoded = false;

    for caps in ENCODED_WORD_RE.captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let gap = &input[last_end..whole.start()];

        match decode_word(&caps[1], &caps[2], &caps[3]) {
            Some(text) => {
                // RFC 2047 §6.2
                if !(last_was_decoded && gap.trim().is_empty()) {
                    result.push_str(gap);
                }
                result.push_str(&text);
                last_was_decoded = true;
            }
            None => {
                debug!(word = whole.as_str(), "Leaving undecodable encoded-word as-is");
                result.push_str(gap);
                result.push_str(whole.as_str());
                last_was_decoded = false;
            }
        }
        last_end = whole.end();
    }

    result.push_str(&input[last_end..]);
    result
}

fn decode_word(charset: &str, encoding: &str, text: &str) -> Option<String> {
    // RFC 2231 allows a language suffix: `UTF-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    let bytes = if encoding.eq_ignore_ascii_case("b") {
        decode_base64(text.as_bytes())?
    } else {
        decode_q_encoding(text)
    };
    charset::decode_strict(charset, &bytes)
}

/// Extract content between `<` and `>` (for Message-ID, In-Reply-To).
pub fn extract_angle_bracket(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start..start + end + 1].to_string();
        }
    }
    trimmed.to_string()
}

const DATE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
];

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const NAMED_ZONES: &[(&str, &str)] = &[
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("GMT", "+0000"),
    ("Z", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("JST", "+0900"),
];

/// Parse a `Date:` header value to UTC.
///
/// Accepts RFC 2822, RFC 3339, and common broken variants: missing
/// day-of-week, trailing `(comment)`, named zones, or no zone at all
/// (read as UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = match value.find('(') {
        Some(pos) => value[..pos].trim(),
        None => value.trim(),
    };
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    let candidate = with_numeric_zone(strip_day_of_week(trimmed));
    if let Ok(dt) = DateTime::parse_from_rfc2822(&candidate) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Drop a leading `"Thu, "` style day name.
fn strip_day_of_week(s: &str) -> &str {
    match s.split_once(',') {
        Some((day, rest)) if day.trim().chars().all(|c| c.is_ascii_alphabetic()) => rest.trim(),
        _ => s,
    }
}

/// Replace a trailing zone abbreviation with its numeric offset.
fn with_numeric_zone(s: &str) -> String {
    if let Some((head, zone)) = s.rsplit_once(' ') {
        if let Some((_, offset)) = NAMED_ZONES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(zone))
        {
            return format!("{head} {offset}");
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_message_lf() {
        let (headers, body) = split_message(b"Subject: Hi\nFrom: a@b.com\n\nBody\nline 2\n");
        assert_eq!(headers.get("subject"), Some("Hi"));
        assert_eq!(headers.get("from"), Some("a@b.com"));
        assert_eq!(body, b"Body\nline 2\n");
    }

    #[test]
    fn test_split_message_crlf_and_mixed() {
        let (headers, body) = split_message(b"Subject: Hi\r\nTo: x@y.z\n\r\nBody\r\n");
        assert_eq!(headers.get("to"), Some("x@y.z"));
        assert_eq!(body, b"Body\r\n");
    }

    #[test]
    fn test_split_message_without_blank_line() {
        let (headers, body) = split_message(b"Subject: only headers");
        assert_eq!(headers.get("subject"), Some("only headers"));
        assert!(body.is_empty());
    }

    #[test]
    fn test_split_message_leading_blank_line() {
        let (headers, body) = split_message(b"\r\njust a body");
        assert!(headers.is_empty());
        assert_eq!(body, b"just a body");
    }

    #[test]
    fn test_split_message_body_bytes_untouched() {
        let (headers, body) = split_message(b"Subject: caf\xe9\n\n\x89PNG\xff");
        assert_eq!(headers.get("subject"), Some("café"));
        assert_eq!(body, b"\x89PNG\xff");
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("subject"), Some("This is a long subject line"));
    }

    #[test]
    fn test_unfold_drops_orphans_and_keeps_last_value() {
        let text = "  orphan continuation\ngarbage line\nX-Dup: one\nCONTENT-Type : text/html \nX-Dup: two\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("x-dup"), Some("two"));
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let headers = unfold_headers("Date: Thu, 04 Jan 2024 10:00:00 +0000\n");
        assert_eq!(headers.get("date"), Some("Thu, 04 Jan 2024 10:00:00 +0000"));
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?Q?Caf=C3=A9?="), "Café");
        assert_eq!(decode_encoded_words("=?ISO-8859-1?q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?B?SG9sYQ==?= there";
        assert_eq!(decode_encoded_words(input), "Re: Hola there");
    }

    #[test]
    fn test_whitespace_only_dropped_between_decoded_words() {
        assert_eq!(decode_encoded_words("=?UTF-8?Q?a?= \t =?UTF-8?Q?b?="), "ab");
        assert_eq!(decode_encoded_words("=?UTF-8?Q?a?= x =?UTF-8?Q?b?="), "a x b");
        assert_eq!(
            decode_encoded_words("=?UTF-8?B?!!!?= =?UTF-8?Q?ok?="),
            "=?UTF-8?B?!!!?= ok"
        );
        assert_eq!(decode_encoded_words("  =?UTF-8?Q?a?=  "), "  a  ");
    }

    #[test]
    fn test_failed_word_left_verbatim() {
        let input = "=?UTF-8?B?!!!?= and =?UTF-8?Q?ok?=";
        assert_eq!(decode_encoded_words(input), "=?UTF-8?B?!!!?= and ok");
    }

    #[test]
    fn test_invalid_utf8_word_left_verbatim() {
        let input = "=?UTF-8?Q?caf=E9?=";
        assert_eq!(decode_encoded_words(input), input);
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        assert_eq!(decode_encoded_words("=?x-made-up?Q?Caf=C3=A9?="), "Café");
    }

    #[test]
    fn test_charset_with_language_suffix() {
        assert_eq!(decode_encoded_words("=?UTF-8*en?Q?hello_world?="), "hello world");
    }

    #[test]
    fn test_decode_iso8859_encoded_word() {
        let input = "=?ISO-8859-1?Q?R=E9sum=E9_du_projet?=";
        assert_eq!(decode_encoded_words(input), "Résumé du projet");
    }

    #[test]
    fn test_decode_utf8_base64_japanese() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?5bGx55Sw5aSq6YOO?="), "山田太郎");
    }

    #[test]
    fn test_plain_passthrough() {
        assert_eq!(decode_encoded_words("Normal subject = fine?"), "Normal subject = fine?");
    }

    #[test]
    fn test_extract_angle_bracket() {
        assert_eq!(
            extract_angle_bracket(" <msg001@example.com> "),
            "<msg001@example.com>"
        );
        assert_eq!(extract_angle_bracket("bare@example.com"), "bare@example.com");
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-04 10:00");
    }

    #[test]
    fn test_parse_date_with_comment() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000 (UTC)").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_named_zone() {
        let dt = parse_date("04 Jan 2024 10:00:00 CEST").unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "08:00");
    }

    #[test]
    fn test_parse_date_iso8601_and_naive() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
        assert!(parse_date("2024-01-04 10:00:00").is_some());
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday-ish").is_none());
    }
}
