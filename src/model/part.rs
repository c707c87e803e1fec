//! Decoded MIME part tree.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::parser::transfer::TransferEncoding;

/// Ordered header mapping: lower-cased name → single unfolded value.
///
/// A repeated name keeps its first position but takes the last value.
/// Duplicate `Received` lines therefore collapse to one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
    /// Name → index into `entries`.
    positions: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header. `name` must already be lower-cased.
    pub fn insert(&mut self, name: String, value: String) {
        match self.positions.get(&name) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    /// Value for a lower-cased header name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.positions
            .get(name)
            .map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Position of a part in the tree: child indices walked from the root.
///
/// The root itself is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PartPath(Vec<usize>);

impl PartPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of the `index`-th child of this part.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl std::fmt::Display for PartPath {
    /// IMAP-style section numbering (`1.2`), with `0` for the root.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("0");
        }
        let parts: Vec<String> = self.0.iter().map(|i| (i + 1).to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// What a part holds: decoded content or child parts, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PartContent {
    /// Content leaf. Binary attachments keep their base64 text here.
    Leaf {
        #[serde(rename = "decodedBody")]
        decoded_body: String,
    },
    /// Multipart container.
    Container {
        #[serde(rename = "parts")]
        children: Vec<MimePart>,
    },
}

/// One node of the decoded structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MimePart {
    pub headers: HeaderMap,

    /// Body bytes after splitting, before any decoding.
    #[serde(skip)]
    pub raw_body: Vec<u8>,

    /// Lower-cased MIME type without parameters (e.g. `text/html`).
    pub content_type: String,

    pub transfer_encoding: TransferEncoding,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    pub is_attachment: bool,

    #[serde(flatten)]
    pub content: PartContent,
}

impl MimePart {
    /// Decoded body of a leaf, `None` for containers.
    pub fn decoded_body(&self) -> Option<&str> {
        match &self.content {
            PartContent::Leaf { decoded_body } => Some(decoded_body),
            PartContent::Container { .. } => None,
        }
    }

    /// Child parts of a container, empty for leaves.
    pub fn children(&self) -> &[MimePart] {
        match &self.content {
            PartContent::Container { children } => children,
            PartContent::Leaf { .. } => &[],
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.content, PartContent::Container { .. })
    }

    /// Look up a descendant by path.
    pub fn find(&self, path: &PartPath) -> Option<&MimePart> {
        path.indices()
            .iter()
            .try_fold(self, |part, &i| part.children().get(i))
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children().iter().map(MimePart::count).sum::<usize>()
    }
}
