//! The structured result of decoding one message.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::attachment::Attachment;
use super::part::{HeaderMap, MimePart, PartPath};

/// Kind of displayable body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodyKind {
    #[serde(rename = "text/html")]
    Html,
    #[serde(rename = "text/plain")]
    Plain,
}

impl BodyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyKind::Html => "text/html",
            BodyKind::Plain => "text/plain",
        }
    }
}

/// The single body chosen for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredContent {
    #[serde(rename = "type")]
    pub kind: BodyKind,
    pub content: String,
    /// Where in the part tree the content came from.
    #[serde(rename = "originPart")]
    pub origin: PartPath,
}

/// A local recovery the decoder had to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParseWarning {
    /// A multipart part declared no usable boundary.
    MissingBoundary { path: PartPath },
    /// The boundary never split the body into any part.
    NoUsableParts { path: PartPath },
    /// Nesting went past the depth bound; the subtree was kept opaque.
    DepthLimit { path: PartPath, depth: usize },
    /// The part count bound was hit; remaining parts were dropped.
    PartLimit { limit: usize },
    /// Base64 content did not decode and was kept as-is.
    InvalidBase64 { path: PartPath },
    /// The decoder failed outright and returned the raw body.
    InternalFailure { reason: String },
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingBoundary { path } => write!(f, "part {path}: multipart without boundary"),
            Self::NoUsableParts { path } => write!(f, "part {path}: boundary never matched"),
            Self::DepthLimit { path, depth } => {
                write!(f, "part {path}: nesting depth {depth} exceeds limit")
            }
            Self::PartLimit { limit } => write!(f, "part limit of {limit} reached"),
            Self::InvalidBase64 { path } => write!(f, "part {path}: invalid base64 kept as-is"),
            Self::InternalFailure { reason } => write!(f, "decoder failure: {reason}"),
        }
    }
}

/// Final decoded form of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cc: String,
    /// Subject with transfer and RFC 2047 encodings resolved.
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub message_id: Option<String>,

    /// Selected raw header fields.
    pub headers: HeaderMap,

    /// Preferred content, or the raw body when nothing could be decoded.
    pub body: String,
    pub content_type: String,

    /// Part tree, present only for multipart messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<MimePart>,

    pub attachments: Vec<Attachment>,
    pub has_attachments: bool,
    pub attachment_count: usize,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ParseWarning>,
}

impl EmailRecord {
    pub fn is_html(&self) -> bool {
        self.content_type == BodyKind::Html.as_str()
    }

    /// `true` if the decoder had to fall back anywhere.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}
