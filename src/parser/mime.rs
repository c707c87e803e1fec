//! Recursive MIME tree construction.
//!
//! One depth-first, left-to-right walk builds the part tree, classifies
//! attachments, and picks the preferred displayable body. Everything besides
//! the tree is gathered in a [`Collected`] accumulator owned by the walk.

use tracing::{debug, warn};

use super::charset;
use super::header::{decode_encoded_words, split_message};
use super::multipart::{header_param, media_type, resolve_boundary, split_parts};
use super::transfer::{
    compact_base64, decode_base64, decode_body, decode_quoted_printable_bytes, encode_base64,
    TransferEncoding,
};
use crate::model::attachment::{Attachment, AttachmentEncoding};
use crate::model::part::{HeaderMap, MimePart, PartContent, PartPath};
use crate::model::record::{BodyKind, ParseWarning, PreferredContent};

/// Resource bounds for a single decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Deepest multipart nesting still descended into. Deeper multiparts
    /// become opaque leaves.
    pub max_depth: usize,
    /// Maximum number of parts in the tree, root included.
    pub max_parts: usize,
    /// Maximum raw message size in bytes.
    pub max_message_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 20,
            max_parts: 500,
            max_message_size: 64 * 1024 * 1024,
        }
    }
}

/// What a walk gathers besides the tree itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    /// First non-empty `text/html` leaf.
    pub html: Option<PreferredContent>,
    /// First non-empty `text/plain` leaf.
    pub plain: Option<PreferredContent>,
    /// Attachments in document order.
    pub attachments: Vec<Attachment>,
    pub warnings: Vec<ParseWarning>,
}

impl Collected {
    /// HTML wins over plain text wherever it sits in the tree.
    pub fn preferred(&self) -> Option<&PreferredContent> {
        self.html.as_ref().or(self.plain.as_ref())
    }

    pub fn into_preferred(self) -> Option<PreferredContent> {
        self.html.or(self.plain)
    }

    fn warn(&mut self, warning: ParseWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    fn offer(&mut self, content_type: &str, body: &str, path: &PartPath) {
        let (slot, kind) = match content_type {
            "text/html" => (&mut self.html, BodyKind::Html),
            "text/plain" => (&mut self.plain, BodyKind::Plain),
            _ => return,
        };
        if slot.is_some() || body.is_empty() {
            return;
        }
        debug!(path = %path, content_type, "Selected preferred body candidate");
        *slot = Some(PreferredContent {
            kind,
            content: body.to_string(),
            origin: path.clone(),
        });
    }
}

/// Parse a raw part and build its tree.
pub fn build_tree(raw: &[u8], limits: Limits) -> (MimePart, Collected) {
    let (headers, body) = split_message(raw);
    TreeBuilder::new(limits).build_root(headers, body)
}

/// Builds one part tree. Consumed by [`TreeBuilder::build_root`].
#[derive(Debug)]
pub struct TreeBuilder {
    limits: Limits,
    parts_built: usize,
    collected: Collected,
}

impl TreeBuilder {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            parts_built: 0,
            collected: Collected::default(),
        }
    }

    /// Build the tree for a root whose headers have already been unfolded.
    pub fn build_root(mut self, headers: HeaderMap, body: &[u8]) -> (MimePart, Collected) {
        self.parts_built = 1;
        let root = self.build(headers, body, PartPath::root());
        (root, self.collected)
    }

    fn build(&mut self, headers: HeaderMap, body: &[u8], path: PartPath) -> MimePart {
        let content_type = media_type(headers.get("content-type"));
        let transfer_encoding =
            TransferEncoding::from_header(headers.get("content-transfer-encoding"));

        if content_type.starts_with("multipart/") {
            if let Some(children) = self.build_children(&headers, body, &path) {
                return MimePart {
                    headers,
                    raw_body: body.to_vec(),
                    content_type,
                    transfer_encoding,
                    filename: None,
                    is_attachment: false,
                    content: PartContent::Container { children },
                };
            }
        }

        self.build_leaf(headers, content_type, transfer_encoding, body, path)
    }

    /// Split and recurse. `None` means the multipart is kept as an opaque leaf.
    fn build_children(
        &mut self,
        headers: &HeaderMap,
        body: &[u8],
        path: &PartPath,
    ) -> Option<Vec<MimePart>> {
        let Some(boundary) = headers.get("content-type").and_then(resolve_boundary) else {
            warn!(path = %path, "Multipart part without boundary, keeping it opaque");
            self.collected.warn(ParseWarning::MissingBoundary { path: path.clone() });
            return None;
        };

        let depth = path.depth() + 1;
        if depth > self.limits.max_depth {
            warn!(path = %path, depth, "Multipart nesting too deep, keeping it opaque");
            self.collected.warn(ParseWarning::DepthLimit {
                path: path.clone(),
                depth,
            });
            return None;
        }

        let budget = self.limits.max_parts.saturating_sub(self.parts_built);
        let split = split_parts(body, &boundary, budget);
        if split.truncated {
            warn!(limit = self.limits.max_parts, "Part limit reached, dropping remaining parts");
            self.collected.warn(ParseWarning::PartLimit {
                limit: self.limits.max_parts,
            });
        }
        if split.parts.is_empty() {
            if !split.truncated {
                debug!(path = %path, boundary = %boundary, "Boundary matched no usable parts");
                self.collected.warn(ParseWarning::NoUsableParts { path: path.clone() });
            }
            return None;
        }

        self.parts_built += split.parts.len();
        let children = split
            .parts
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let (child_headers, child_body) = split_message(raw);
                self.build(child_headers, child_body, path.child(i))
            })
            .collect();
        Some(children)
    }

    fn build_leaf(
        &mut self,
        headers: HeaderMap,
        content_type: String,
        transfer_encoding: TransferEncoding,
        body: &[u8],
        path: PartPath,
    ) -> MimePart {
        let disposition = headers
            .get("content-disposition")
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let is_attachment = disposition.contains("attachment")
            || !(content_type.starts_with("text/") || content_type.starts_with("multipart/"));
        let filename = resolve_filename(&headers);

        let decoded_body = if is_attachment && !is_text_like(&content_type) {
            let (content, size) = self.binary_payload(body, &transfer_encoding, &path);
            self.collected.attachments.push(Attachment {
                filename: filename.clone(),
                content_type: content_type.clone(),
                size,
                content: content.clone(),
                encoding: AttachmentEncoding::Base64,
                content_id: content_id(&headers),
                is_inline: disposition.starts_with("inline"),
            });
            content
        } else {
            let charset = headers
                .get("content-type")
                .and_then(|ct| header_param(ct, "charset"));
            let decoded = decode_body(body, &transfer_encoding, charset.as_deref());
            if is_attachment {
                self.collected.attachments.push(Attachment {
                    filename: filename.clone(),
                    content_type: content_type.clone(),
                    size: decoded.len() as u64,
                    content: decoded.clone(),
                    encoding: AttachmentEncoding::Raw,
                    content_id: content_id(&headers),
                    is_inline: disposition.starts_with("inline"),
                });
            } else {
                self.collected.offer(&content_type, &decoded, &path);
            }
            decoded
        };

        MimePart {
            headers,
            raw_body: body.to_vec(),
            content_type,
            transfer_encoding,
            filename,
            is_attachment,
            content: PartContent::Leaf { decoded_body },
        }
    }

    /// Base64 text and decoded size of a binary payload. Never decodes to text.
    ///
    /// Unencoded payloads are base64-encoded from their original bytes.
    fn binary_payload(
        &mut self,
        body: &[u8],
        encoding: &TransferEncoding,
        path: &PartPath,
    ) -> (String, u64) {
        match encoding {
            TransferEncoding::Base64 => {
                let compact = compact_base64(body);
                let text = String::from_utf8_lossy(&compact).into_owned();
                match decode_base64(&compact) {
                    Some(bytes) => (text, bytes.len() as u64),
                    None => {
                        warn!(path = %path, "Attachment is not valid base64, keeping it as-is");
                        self.collected.warn(ParseWarning::InvalidBase64 { path: path.clone() });
                        (text, compact.len() as u64)
                    }
                }
            }
            TransferEncoding::QuotedPrintable => {
                let bytes = decode_quoted_printable_bytes(body);
                (encode_base64(&bytes), bytes.len() as u64)
            }
            _ => (encode_base64(body), body.len() as u64),
        }
    }
}

/// Types whose attachment payload is stored as decoded text.
pub fn is_text_like(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.starts_with("message/")
        || content_type == "application/json"
        || content_type == "application/xml"
        || content_type.ends_with("+json")
        || content_type.ends_with("+xml")
}

/// Filename from Content-Disposition or Content-Type, RFC 2231 form first.
fn resolve_filename(headers: &HeaderMap) -> Option<String> {
    let disposition = headers.get("content-disposition");
    let content_type = headers.get("content-type");

    disposition
        .and_then(|d| extended_param(d, "filename"))
        .or_else(|| disposition.and_then(|d| header_param(d, "filename")))
        .or_else(|| content_type.and_then(|ct| extended_param(ct, "name")))
        .or_else(|| content_type.and_then(|ct| header_param(ct, "name")))
        .map(|name| decode_encoded_words(&name))
}

/// RFC 2231 `name*=charset'lang'percent-encoded` parameter.
fn extended_param(value: &str, name: &str) -> Option<String> {
    let raw = header_param(value, &format!("{name}*"))?;
    let (label, rest) = raw.split_once('\'')?;
    let (_language, encoded) = rest.split_once('\'')?;
    Some(charset::decode_lossy(label, &percent_decode(encoded)))
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = match (bytes[i], bytes.get(i + 1), bytes.get(i + 2)) {
            (b'%', Some(&hi), Some(&lo)) => {
                match ((hi as char).to_digit(16), (lo as char).to_digit(16)) {
                    (Some(hi), Some(lo)) => Some((hi * 16 + lo) as u8),
                    _ => None,
                }
            }
            _ => None,
        };
        match escaped {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    out
}

fn content_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("content-id")
        .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>').to_string())
        .filter(|v| !v.is_empty())
}
