//! Multi-format extraction into the normalized document model.
//!
//! Extraction is pure with respect to its inputs and never fails for
//! malformed content: unrecoverable parse failures degrade to a
//! placeholder document that records the failure in metadata, so a crawl
//! is never silently incomplete for files it promised to scan.
//!
//! Dispatch is keyed by the finite [`DocumentType`] tag; each handler
//! satisfies the same `(bytes, path) -> ExtractedFields` contract.

pub mod html;
pub mod json;
pub mod markdown;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::models::{Document, DocumentType};

/// Title candidates longer than this are ignored (plain-text first-line
/// heuristic).
const MAX_TEXT_TITLE_LEN: usize = 100;

/// Fields produced by a per-format handler before normalization into a
/// [`Document`].
#[derive(Debug, Default)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub content: String,
    pub metadata: Map<String, Value>,
    pub tags: Vec<String>,
}

/// Derives the deterministic document id for `(source_id, source_path)`.
/// Stable across re-crawls of the same file, independent of content.
pub fn document_id(source_id: &str, source_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(source_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Content hash over raw bytes, computed before any parsing so it is
/// format-independent.
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Collapses all runs of whitespace into single spaces and trims.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts a normalized document from raw bytes.
///
/// `modified` is the file's modification time; it is clamped to "now" to
/// defend against clock skew. Unknown extensions are handled as text.
pub fn extract(
    bytes: &[u8],
    path: &Path,
    source_id: &str,
    modified: Option<DateTime<Utc>>,
) -> Document {
    let doc_type = DocumentType::from_path(path).unwrap_or(DocumentType::Text);

    let mut fields = match doc_type {
        DocumentType::Markdown => markdown::extract(&String::from_utf8_lossy(bytes)),
        DocumentType::Html => html::extract(&String::from_utf8_lossy(bytes)),
        DocumentType::Json => json::extract(bytes)
            .unwrap_or_else(|| extract_text(&String::from_utf8_lossy(bytes))),
        DocumentType::Pdf => extract_pdf(bytes),
        DocumentType::Text => extract_text(&String::from_utf8_lossy(bytes)),
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    fields
        .metadata
        .insert("filename".to_string(), json!(filename));

    let title = fields
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| file_stem(path));

    let now = Utc::now();
    let updated_at = match modified {
        // Future mtimes are clamped to now.
        Some(m) if m <= now => m,
        _ => now,
    };

    let source_path = path.to_string_lossy().to_string();

    Document {
        id: document_id(source_id, &source_path),
        title,
        content: fields.content,
        doc_type,
        source_id: source_id.to_string(),
        source_path,
        metadata: Value::Object(fields.metadata),
        tags: fields.tags,
        created_at: now,
        updated_at,
        size: bytes.len() as u64,
        checksum: checksum(bytes),
    }
}

/// Plain text handling: first line under 100 chars is the title
/// candidate, content is whitespace-collapsed.
pub fn extract_text(text: &str) -> ExtractedFields {
    let title = text
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.len() < MAX_TEXT_TITLE_LEN)
        .map(str::to_string);

    ExtractedFields {
        title,
        content: collapse_whitespace(text),
        metadata: Map::new(),
        tags: Vec::new(),
    }
}

/// PDF handling: text extraction via `pdf-extract`; decode failures
/// degrade to a placeholder that records the byte length and error
/// message rather than aborting the crawl.
fn extract_pdf(bytes: &[u8]) -> ExtractedFields {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => {
            let mut metadata = Map::new();
            metadata.insert("bytes".to_string(), json!(bytes.len()));
            ExtractedFields {
                title: None,
                content: collapse_whitespace(&text),
                metadata,
                tags: Vec::new(),
            }
        }
        Err(err) => {
            let mut metadata = Map::new();
            metadata.insert("bytes".to_string(), json!(bytes.len()));
            metadata.insert("extraction_error".to_string(), json!(err.to_string()));
            ExtractedFields {
                title: None,
                content: format!("PDF document ({} bytes, extraction failed)", bytes.len()),
                metadata,
                tags: Vec::new(),
            }
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
