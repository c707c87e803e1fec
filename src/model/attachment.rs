//! Attachment view extracted from the part tree.
//!
//! Attachments are owned by the [`EmailRecord`](super::record::EmailRecord)
//! and do not borrow from the tree they were derived from.

use base64::Engine as _;
use serde::Serialize;

use crate::parser::transfer::BASE64_LENIENT;

/// How [`Attachment::content`] is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentEncoding {
    /// Decoded text.
    Raw,
    /// Base64 text of the binary payload.
    Base64,
}

/// A single attachment and its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Filename from `Content-Disposition` or `Content-Type`, if declared.
    pub filename: Option<String>,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded size in bytes.
    pub size: u64,

    /// Payload, either decoded text or base64 depending on `encoding`.
    pub content: String,

    pub encoding: AttachmentEncoding,

    /// Content-ID (without angle brackets) for parts referenced from HTML.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,

    /// `true` if declared `Content-Disposition: inline`.
    pub is_inline: bool,
}

impl Attachment {
    /// Payload as bytes, decoding base64 content.
    ///
    /// Returns `None` only if base64 content is corrupt.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        match self.encoding {
            AttachmentEncoding::Raw => Some(self.content.as_bytes().to_vec()),
            AttachmentEncoding::Base64 => BASE64_LENIENT.decode(self.content.as_bytes()).ok(),
        }
    }

    /// Filename to use when saving, generated from the position if missing.
    pub fn display_name(&self, index: usize) -> String {
        match &self.filename {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("attachment_{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(content: &str, encoding: AttachmentEncoding) -> Attachment {
        Attachment {
            filename: None,
            content_type: "application/octet-stream".into(),
            size: 0,
            content: content.into(),
            encoding,
            content_id: None,
            is_inline: false,
        }
    }

    #[test]
    fn test_bytes_base64() {
        let att = attachment("JVBERi0xLjQ=", AttachmentEncoding::Base64);
        assert_eq!(att.bytes().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_bytes_raw() {
        let att = attachment("{\"a\":1}", AttachmentEncoding::Raw);
        assert_eq!(att.bytes().unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_display_name_fallback() {
        let mut att = attachment("", AttachmentEncoding::Raw);
        assert_eq!(att.display_name(2), "attachment_2");
        att.filename = Some("x.pdf".into());
        assert_eq!(att.display_name(2), "x.pdf");
    }

    #[test]
    fn test_encoding_serializes_lowercase() {
        let json = serde_json::to_value(attachment("", AttachmentEncoding::Base64)).unwrap();
        assert_eq!(json["encoding"], "base64");
        assert_eq!(json["contentType"], "application/octet-stream");
        assert!(json.get("contentId").is_none());
    }
}
