//! Top-level decoding of one raw message into an [`EmailRecord`].
//!
//! [`decode`] and [`decode_with`] are total: whatever the input bytes, they
//! return a record. Failures inside the decoder degrade to the raw body with a
//! [`ParseWarning::InternalFailure`] warning.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

use super::charset::bytes_to_text;
use super::entity::decode_entities;
use super::header::{decode_encoded_words, extract_angle_bracket, parse_date, split_message};
use super::mime::{Limits, TreeBuilder};
use super::multipart::{media_type, resolve_boundary};
use super::transfer::{decode_quoted_printable, TransferEncoding};
use crate::error::{DecodeError, Result};
use crate::model::part::{HeaderMap, MimePart};
use crate::model::record::{BodyKind, EmailRecord, ParseWarning};

/// Raw header fields copied into [`EmailRecord::headers`], in output order.
const SELECTED_HEADERS: &[&str] = &[
    "from",
    "to",
    "cc",
    "reply-to",
    "date",
    "message-id",
    "in-reply-to",
    "references",
    "mime-version",
    "content-type",
];

/// Decode a raw message with default limits.
pub fn decode(raw: &[u8]) -> EmailRecord {
    decode_with(raw, &Limits::default())
}

/// Decode a raw message. Never fails and never panics.
pub fn decode_with(raw: &[u8], limits: &Limits) -> EmailRecord {
    match panic::catch_unwind(AssertUnwindSafe(|| try_decode(raw, limits))) {
        Ok(Ok(record)) => record,
        Ok(Err(e)) => {
            warn!(error = %e, "Decoding failed, returning raw body");
            fallback_record(raw, e.to_string())
        }
        Err(payload) => {
            let reason = match payload.downcast_ref::<&str>() {
                Some(s) => s.to_string(),
                None => payload
                    .downcast_ref::<String>()
                    .cloned()
                    .unwrap_or_else(|| "decoder panicked".to_string()),
            };
            warn!(reason = %reason, "Decoder panicked, returning raw body");
            fallback_record(raw, DecodeError::Internal(reason).to_string())
        }
    }
}

/// Read and decode a single `.eml` file.
///
/// Unlike [`decode_with`], oversized files are reported as an error instead of
/// being degraded.
pub fn decode_file(path: impl AsRef<Path>, limits: &Limits) -> Result<EmailRecord> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DecodeError::FileNotFound(path.to_path_buf())
        } else {
            DecodeError::io(path, e)
        }
    })?;
    check_size(&data, limits)?;
    debug!(path = %path.display(), bytes = data.len(), "Decoding message file");
    Ok(decode_with(&data, limits))
}

fn check_size(raw: &[u8], limits: &Limits) -> Result<()> {
    if raw.len() > limits.max_message_size {
        return Err(DecodeError::MessageTooLarge {
            size: raw.len(),
            limit: limits.max_message_size,
        });
    }
    Ok(())
}

fn try_decode(raw: &[u8], limits: &Limits) -> Result<EmailRecord> {
    check_size(raw, limits)?;

    let (headers, body) = split_message(skip_envelope(raw));

    let content_type_header = headers.get("content-type");
    let is_multipart = media_type(content_type_header).starts_with("multipart/")
        && content_type_header.and_then(resolve_boundary).is_some();
    let encoding = TransferEncoding::from_header(headers.get("content-transfer-encoding"));

    // Transfer-decode first, then resolve encoded-words.
    let mut subject = headers.get("subject").unwrap_or_default().to_string();
    if !is_multipart && encoding == TransferEncoding::QuotedPrintable {
        subject = decode_quoted_printable(&subject);
    }
    let subject = decode_encoded_words(&subject);

    let from = decode_encoded_words(headers.get("from").unwrap_or_default());
    let to = decode_encoded_words(headers.get("to").unwrap_or_default());
    let cc = decode_encoded_words(headers.get("cc").unwrap_or_default());
    let date = headers.get("date").and_then(parse_date);
    let message_id = headers
        .get("message-id")
        .map(extract_angle_bracket)
        .filter(|id| !id.is_empty());
    let selected = select_headers(&headers);

    let (root, collected) = TreeBuilder::new(*limits).build_root(headers, body);
    let warnings = collected.warnings.clone();
    let attachments = collected.attachments.clone();

    let (body, content_type, structure) = if root.is_container() {
        let (content, content_type) = match collected.into_preferred() {
            Some(preferred) => (
                render(preferred.kind.as_str(), preferred.content),
                preferred.kind.as_str().to_string(),
            ),
            None => (String::new(), BodyKind::Plain.as_str().to_string()),
        };
        (content, content_type, Some(root))
    } else {
        let (content, content_type) = single_part_body(&root, body);
        (content, content_type, None)
    };

    debug!(
        content_type = %content_type,
        attachments = attachments.len(),
        warnings = warnings.len(),
        "Decoded message"
    );

    Ok(EmailRecord {
        from,
        to,
        cc,
        subject,
        date,
        message_id,
        headers: selected,
        body,
        content_type,
        structure,
        has_attachments: !attachments.is_empty(),
        attachment_count: attachments.len(),
        attachments,
        warnings,
    })
}

/// Body and type for a message that did not become a container.
///
/// A non-multipart root keeps its declared type, even when it is also listed
/// as an attachment.
fn single_part_body(root: &MimePart, raw_body: &[u8]) -> (String, String) {
    if root.content_type.starts_with("multipart/") {
        // Undecodable multipart: hand back the raw body
        return (bytes_to_text(raw_body), BodyKind::Plain.as_str().to_string());
    }
    let decoded = root.decoded_body().unwrap_or_default().to_string();
    (render(&root.content_type, decoded), root.content_type.clone())
}

/// HTML bodies get their character entities resolved.
fn render(content_type: &str, content: String) -> String {
    if content_type == BodyKind::Html.as_str() {
        decode_entities(&content)
    } else {
        content
    }
}

fn select_headers(headers: &HeaderMap) -> HeaderMap {
    let mut selected = HeaderMap::new();
    for name in SELECTED_HEADERS {
        if let Some(value) = headers.get(name) {
            selected.insert(name.to_string(), value.to_string());
        }
    }
    selected
}

/// Skip a UTF-8 BOM and a leading mbox `From ` separator line.
fn skip_envelope(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Record returned when decoding fails outright.
fn fallback_record(raw: &[u8], reason: String) -> EmailRecord {
    let text = String::from_utf8_lossy(skip_envelope(raw));
    let body = if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else {
        text.to_string()
    };

    EmailRecord {
        from: String::new(),
        to: String::new(),
        cc: String::new(),
        subject: String::new(),
        date: None,
        message_id: None,
        headers: HeaderMap::new(),
        body,
        content_type: BodyKind::Plain.as_str().to_string(),
        structure: None,
        attachments: Vec::new(),
        has_attachments: false,
        attachment_count: 0,
        warnings: vec![ParseWarning::InternalFailure { reason }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::AttachmentEncoding;

    #[test]
    fn test_simple_plain_message() {
        let raw = b"From: Alice <alice@example.com>\r\nTo: bob@example.com\r\nSubject: Hi\r\nDate: Thu, 04 Jan 2024 10:00:00 +0000\r\nMessage-ID: <m1@example.com>\r\n\r\nHello Bob\r\n";
        let record = decode(raw);
        assert_eq!(record.from, "Alice <alice@example.com>");
        assert_eq!(record.to, "bob@example.com");
        assert_eq!(record.subject, "Hi");
        assert_eq!(record.body, "Hello Bob\r\n");
        assert_eq!(record.content_type, "text/plain");
        assert_eq!(record.message_id.as_deref(), Some("<m1@example.com>"));
        assert!(record.date.is_some());
        assert!(record.structure.is_none());
        assert!(!record.has_attachments);
        assert!(!record.is_degraded());
    }

    #[test]
    fn test_qp_subject_and_body_on_single_part() {
        let raw = b"Subject: =?UTF-8?Q?Caf=C3=A9?= caf=C3=A9\nContent-Transfer-Encoding: quoted-printable\n\nr=C3=A9sum=C3=A9 =\nok\n";
        let record = decode(raw);
        assert_eq!(record.subject, "Café café");
        assert_eq!(record.body, "résumé ok\n");
    }

    #[test]
    fn test_subject_not_transfer_decoded_for_multipart() {
        let raw = b"Subject: 100=25 sure\nContent-Type: multipart/mixed; boundary=m\nContent-Transfer-Encoding: quoted-printable\n\n--m\n\nhi\n--m--\n";
        let record = decode(raw);
        assert_eq!(record.subject, "100=25 sure");
    }

    #[test]
    fn test_single_part_html_entities_decoded() {
        let raw = b"Content-Type: text/html; charset=utf-8\n\n<p>Tom &amp; Jerry &#169;</p>";
        let record = decode(raw);
        assert_eq!(record.content_type, "text/html");
        assert!(record.is_html());
        assert_eq!(record.body, "<p>Tom & Jerry ©</p>");
    }

    #[test]
    fn test_single_part_declared_type_kept() {
        let raw = b"Content-Type: text/calendar\n\nBEGIN:VCALENDAR\n";
        let record = decode(raw);
        assert_eq!(record.content_type, "text/calendar");
        assert_eq!(record.body, "BEGIN:VCALENDAR\n");
    }

    #[test]
    fn test_single_part_binary_becomes_attachment() {
        let raw = b"Content-Type: application/pdf; name=doc.pdf\nContent-Transfer-Encoding: base64\n\nJVBERi0xLjQ=\n";
        let record = decode(raw);
        assert_eq!(record.body, "JVBERi0xLjQ=");
        assert_eq!(record.content_type, "application/pdf");
        assert_eq!(record.attachment_count, 1);
        assert_eq!(record.attachments[0].filename.as_deref(), Some("doc.pdf"));
        assert_eq!(record.attachments[0].content, "JVBERi0xLjQ=");
    }

    #[test]
    fn test_single_part_json_keeps_body_and_type() {
        let record = decode(b"Content-Type: application/json\n\n{\"a\":1}\n");
        assert_eq!(record.body, "{\"a\":1}\n");
        assert_eq!(record.content_type, "application/json");
        assert_eq!(record.attachment_count, 1);
        assert_eq!(record.attachments[0].encoding, AttachmentEncoding::Raw);
        assert_eq!(record.attachments[0].content, "{\"a\":1}\n");
    }

    #[test]
    fn test_body_charset_independent_of_headers() {
        let record = decode("Subject: caf\u{e9}\nContent-Type: text/plain; charset=utf-8\n\nna\u{ef}ve".as_bytes());
        assert_eq!(record.subject, "café");
        assert_eq!(record.body, "naïve");

        let record = decode(b"Subject: caf\xe9\nContent-Type: text/html; charset=utf-8\n\n<p>Caf\xc3\xa9</p>");
        assert_eq!(record.subject, "café");
        assert_eq!(record.body, "<p>Café</p>");
    }

    #[test]
    fn test_multipart_html_entities_decoded() {
        let raw = b"Content-Type: multipart/alternative; boundary=a\n\n--a\nContent-Type: text/html\n\nA&amp;B\n--a--\n";
        let record = decode(raw);
        assert_eq!(record.body, "A&B");
        assert_eq!(record.content_type, "text/html");
        assert!(record.structure.is_some());
    }

    #[test]
    fn test_multipart_without_text_has_empty_body() {
        let raw = b"Content-Type: multipart/mixed; boundary=m\n\n--m\nContent-Type: image/png\nContent-Transfer-Encoding: base64\n\niVBORw0KGgo=\n--m--\n";
        let record = decode(raw);
        assert_eq!(record.body, "");
        assert_eq!(record.content_type, "text/plain");
        assert_eq!(record.attachment_count, 1);
        assert!(record.has_attachments);
    }

    #[test]
    fn test_boundary_missing_from_body_falls_back_to_raw() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"gone\"\n\nnot really multipart\n";
        let record = decode(raw);
        assert_eq!(record.body, "not really multipart\n");
        assert_eq!(record.content_type, "text/plain");
        assert_eq!(record.attachment_count, 0);
        assert!(record.structure.is_none());
    }

    #[test]
    fn test_multipart_without_boundary_param_is_raw() {
        let raw = b"Content-Type: multipart/mixed\n\n--x\n\nbody\n";
        let record = decode(raw);
        assert_eq!(record.body, "--x\n\nbody\n");
        assert_eq!(record.content_type, "text/plain");
    }

    #[test]
    fn test_selected_headers() {
        let raw = b"Received: from a\nFrom: a@b.c\nX-Spam: yes\nMIME-Version: 1.0\n\nbody";
        let record = decode(raw);
        let names: Vec<&str> = record.headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["from", "mime-version"]);
    }

    #[test]
    fn test_envelope_and_bom_skipped() {
        let raw = b"\xEF\xBB\xBFFrom sender@example.com Thu Jan 04 10:00:00 2024\nFrom: real@example.com\nSubject: S\n\nB";
        let record = decode(raw);
        assert_eq!(record.from, "real@example.com");
        assert_eq!(record.subject, "S");
    }

    #[test]
    fn test_encoded_from_decoded() {
        let record = decode(b"From: =?UTF-8?B?Sm9zw6k=?= <jose@example.com>\n\nx");
        assert_eq!(record.from, "José <jose@example.com>");
    }

    #[test]
    fn test_latin1_bytes_survive() {
        let record = decode(b"Subject: caf\xe9\n\nna\xefve");
        assert_eq!(record.subject, "café");
        assert_eq!(record.body, "naïve");
    }

    #[test]
    fn test_oversized_message_degrades() {
        let limits = Limits {
            max_message_size: 10,
            ..Limits::default()
        };
        let record = decode_with(b"Subject: big\n\nway too long body", &limits);
        assert_eq!(record.subject, "");
        assert_eq!(record.body, "way too long body");
        assert!(matches!(
            record.warnings.as_slice(),
            [ParseWarning::InternalFailure { .. }]
        ));
    }

    #[test]
    fn test_garbage_input_never_panics() {
        let inputs: [&[u8]; 6] = [
            b"",
            b"\r\n\r\n",
            b"\xff\xfe\x00\x01",
            b"Content-Type: multipart/mixed; boundary=\n\n--\n--\n",
            b"Content-Type: multipart/mixed; boundary=a\n\n--a\nContent-Type: multipart/mixed; boundary=a\n\n--a\n--a--",
            b"=?UTF-8?B?=?=: =?",
        ];
        for raw in inputs {
            let record = decode(raw);
            assert!(record.attachments.len() == record.attachment_count);
        }
    }

    #[test]
    fn test_skip_envelope_without_from_line() {
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_envelope(data), data);
    }
}
