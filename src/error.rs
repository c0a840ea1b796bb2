//! Error taxonomy for core operations.
//!
//! Per-file extraction failures never surface here: they degrade to
//! placeholder documents or land in a run's error list. `CoreError` covers
//! the failures callers must handle: bad configuration, missing entities,
//! rejected input, and hard storage failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid or inaccessible source root, unknown or unimplemented
    /// source type. Fatal to a single crawl run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single file failed to parse. Non-fatal; recorded in the run's
    /// error list or degraded to a placeholder document.
    #[error("extraction failed for {path}: {message}")]
    Extraction { path: String, message: String },

    /// An operation referenced a missing source or document.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Malformed input to a core operation; rejected before any store
    /// mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The persistence layer failed. Propagated hard, no retries.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn source_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "source",
            id: id.to_string(),
        }
    }

    pub fn document_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "document",
            id: id.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
