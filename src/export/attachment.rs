//! Write decoded attachments to disk.

use std::path::{Path, PathBuf};

use crate::error::{DecodeError, Result};
use crate::model::attachment::Attachment;
use crate::model::record::EmailRecord;

/// Write one attachment into `output_dir`, never overwriting an existing file.
pub fn export_attachment(
    attachment: &Attachment,
    index: usize,
    output_dir: &Path,
) -> Result<PathBuf> {
    let data = attachment.bytes().ok_or_else(|| {
        DecodeError::Export(format!(
            "Attachment '{}' has corrupt base64 content",
            attachment.display_name(index)
        ))
    })?;
    let filename = sanitize_filename_part(&attachment.display_name(index), 150);
    let path = unique_path(&output_dir.join(filename));

    std::fs::write(&path, &data).map_err(|e| DecodeError::io(&path, e))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "Exported attachment");
    Ok(path)
}

/// Write every attachment of a record into `output_dir`.
///
/// Attachments that fail are logged and skipped; the paths written are returned.
pub fn export_all_attachments(record: &EmailRecord, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| DecodeError::io(output_dir, e))?;

    let mut paths = Vec::new();
    for (i, att) in record.attachments.iter().enumerate() {
        match export_attachment(att, i, output_dir) {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(
                    filename = %att.display_name(i),
                    error = %e,
                    "Failed to export attachment"
                );
            }
        }
    }
    Ok(paths)
}

/// Replace characters that are unsafe in file names and cap the length.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@' | ' ') {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    let sanitized = sanitized.trim_start_matches('.').trim().to_string();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().unwrap_or(Path::new("."));

    (1..)
        .map(|i| match ext {
            Some(ext) => parent.join(format!("{stem}_{i}.{ext}")),
            None => parent.join(format!("{stem}_{i}")),
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
