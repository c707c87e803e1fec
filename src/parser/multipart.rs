//! Content-Type parameters, boundary resolution, and multipart body splitting (RFC 2046).

use regex::bytes::Regex;
use tracing::warn;

/// Lower-cased media type of a Content-Type value, without parameters.
///
/// Absent or empty values mean `text/plain`.
pub fn media_type(content_type: Option<&str>) -> String {
    let main = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();
    if main.is_empty() {
        "text/plain".to_string()
    } else {
        main
    }
}

/// Value of the parameter `name` (case-insensitive) in a structured header value
/// such as `text/plain; charset="utf-8"`.
///
/// Quoted values may contain `;` and backslash escapes. Bare values run until
/// `;`, a quote, or the end of the value. Empty values count as absent.
pub fn header_param(value: &str, name: &str) -> Option<String> {
    for param in split_params(value).into_iter().skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case(name) {
            continue;
        }
        let parsed = unquote(raw.trim());
        if !parsed.is_empty() {
            return Some(parsed);
        }
    }
    None
}

/// Boundary declared in a Content-Type value, if any.
pub fn resolve_boundary(content_type: &str) -> Option<String> {
    header_param(content_type, "boundary")
}

/// Split on `;` outside double quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(raw: &str) -> String {
    match raw.strip_prefix('"') {
        Some(rest) => {
            let mut out = String::with_capacity(rest.len());
            let mut chars = rest.chars();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(next) = chars.next() {
                            out.push(next);
                        }
                    }
                    _ => out.push(c),
                }
            }
            out
        }
        None => raw
            .split(['"', '\r', '\n'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

/// Result of splitting one multipart body.
#[derive(Debug, Default)]
pub struct Split<'a> {
    /// Raw bytes of each part: headers, blank line, body.
    pub parts: Vec<&'a [u8]>,
    /// `true` if usable parts were dropped because `max_parts` was reached.
    pub truncated: bool,
}

/// Split a multipart body into its raw parts.
///
/// A delimiter is `--boundary` at the start of a line, optionally followed by
/// the closing `--`, trailing blanks, and a line ending. The line ending before
/// it belongs to the delimiter. The preamble, the epilogue after the closing
/// delimiter, and parts that are empty or just `--` are discarded. A body cut
/// off before its closing delimiter keeps its last part.
pub fn split_parts<'a>(body: &'a [u8], boundary: &str, max_parts: usize) -> Split<'a> {
    let pattern = format!(
        r"(?m)(?:\r?\n)?^--{}(--)?[ \t]*(?:\r?\n|\r?\z)",
        regex::escape(boundary)
    );
    let delimiter = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!(boundary, error = %e, "Unusable multipart boundary");
            return Split::default();
        }
    };

    let mut split = Split::default();
    let mut segment_start: Option<usize> = None;
    let mut closed = false;

    for caps in delimiter.captures_iter(body) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if let Some(start) = segment_start {
            if !push_segment(&mut split, &body[start..whole.start()], max_parts) {
                return split;
            }
        }
        if caps.get(1).is_some() {
            closed = true;
            break;
        }
        segment_start = Some(whole.end());
    }

    if !closed {
        if let Some(start) = segment_start {
            push_segment(&mut split, &body[start..], max_parts);
        }
    }
    split
}

/// Keep a usable segment. Returns `false` once the part budget is exhausted.
fn push_segment<'a>(split: &mut Split<'a>, segment: &'a [u8], max_parts: usize) -> bool {
    let trimmed = segment.trim_ascii();
    if trimmed.is_empty() || trimmed == b"--" {
        return true;
    }
    if split.parts.len() >= max_parts {
        split.truncated = true;
        return false;
    }
    split.parts.push(segment);
    true
}
