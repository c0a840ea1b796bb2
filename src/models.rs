//! Core data models used throughout docshelf.
//!
//! These types represent the sources, documents, crawl results, and search
//! results that flow through the ingestion and retrieval pipeline.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default maximum traversal depth for a crawl.
pub const DEFAULT_MAX_DEPTH: usize = 10;
/// Default per-file size cap in bytes (10 MiB).
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// The finite set of formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Markdown,
    Html,
    Pdf,
    Text,
    Json,
}

impl DocumentType {
    /// Maps a file extension to a document type. Returns `None` for
    /// extensions the crawler does not scan.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Maps a path to a document type via its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "pdf" => Ok(Self::Pdf),
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown document type: {}", other)),
        }
    }
}

/// Normalized document stored in SQLite.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Deterministic id derived from `(source_id, source_path)`.
    pub id: String,
    pub title: String,
    /// Plain text used for matching, whitespace-collapsed.
    pub content: String,
    pub doc_type: DocumentType,
    pub source_id: String,
    pub source_path: String,
    /// Format-specific metadata. Always carries a `filename` key.
    pub metadata: serde_json::Value,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Raw byte length of the source file.
    pub size: u64,
    /// Hex SHA-256 of the raw bytes, computed before any parsing.
    pub checksum: String,
}

/// Kind of origin a source points at. Only `local` is crawlable today;
/// the others are declared so configurations round-trip, and a crawl of
/// them fails deterministically with "not implemented".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Git,
    Web,
    Api,
}

impl Default for SourceType {
    fn default() -> Self {
        Self::Local
    }
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Git => "git",
            Self::Web => "web",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "git" => Ok(Self::Git),
            "web" => Ok(Self::Web),
            "api" => Ok(Self::Api),
            other => Err(format!("unknown source type: {}", other)),
        }
    }
}

/// Crawl filters attached to a source. All fields optional; defaults are
/// applied by the crawler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFilters {
    /// Glob patterns a relative path must match (any of) when present.
    #[serde(default)]
    pub include: Vec<String>,
    /// Glob patterns that reject a relative path regardless of `include`.
    #[serde(default)]
    pub exclude: Vec<String>,
    pub max_depth: Option<usize>,
    pub max_size: Option<u64>,
}

/// A configured origin of documentation plus crawl filters and
/// enablement state.
#[derive(Debug, Clone, Serialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub source_type: SourceType,
    /// For `local`, a `file://`-prefixed absolute root.
    pub url: String,
    pub enabled: bool,
    /// Opaque schedule expression; not enforced by the core.
    pub schedule: Option<String>,
    pub last_crawled: Option<DateTime<Utc>>,
    pub filters: SourceFilters,
    /// Opaque passthrough settings.
    pub settings: serde_json::Value,
}

/// Terminal and transitional states of a crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Idle,
    Crawling,
    Success,
    Error,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Crawling => "crawling",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrawlStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "crawling" => Ok(Self::Crawling),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown crawl status: {}", other)),
        }
    }
}

/// Per-source run status. One row per source, fully replaced on each run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub status: CrawlStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub documents_found: u64,
    pub documents_processed: u64,
    pub documents_skipped: u64,
    pub duration_ms: u64,
}

impl SourceStatus {
    /// A fresh idle status for a source with no runs yet.
    pub fn idle(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            status: CrawlStatus::Idle,
            last_run: None,
            last_error: None,
            documents_found: 0,
            documents_processed: 0,
            documents_skipped: 0,
            duration_ms: 0,
        }
    }
}

/// Outcome of a single crawl run. Per-file errors accumulate here and do
/// not abort the run; a fatal error yields a result with `errors`
/// populated and a terminal `error` status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlResult {
    pub found: u64,
    pub processed: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

/// Aggregate statistics computed from current document rows.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_documents: u64,
    pub documents_by_type: HashMap<String, u64>,
    pub documents_by_source: HashMap<String, u64>,
    pub total_size: u64,
    /// Maximum `updated_at` across all documents; the index staleness
    /// signal.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Options accepted by `search`.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Match tolerance in [0, 1]; 0 = exact, 1 = match anything.
    /// `None` uses the default matcher.
    pub threshold: Option<f64>,
    pub source_ids: Vec<String>,
    pub types: Vec<DocumentType>,
    pub tags: Vec<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: None,
            source_ids: Vec::new(),
            types: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// A snippet of a matched field, windowed around the match span.
#[derive(Debug, Clone, Serialize)]
pub struct Highlight {
    pub field: String,
    pub snippet: String,
}

/// A ranked search result. `score` is in [0, 1], higher = better.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document: Document,
    pub score: f64,
    pub highlights: Vec<Highlight>,
}
