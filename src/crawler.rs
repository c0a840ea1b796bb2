//! Source crawling: discovery, filtering, change detection, ingestion.
//!
//! A run walks one source's tree strictly sequentially (depth-first),
//! decides which files are new or changed, extracts them, and writes the
//! results through the store. Per-file errors accumulate into the run
//! result; only a fatal condition (bad root, unimplemented source type)
//! terminates a run with an `error` status.

use std::path::Path;
use std::time::{Instant, UNIX_EPOCH};

use anyhow::Result;
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::CoreError;
use crate::extract;
use crate::models::{
    CrawlResult, CrawlStatus, DocumentType, SourceConfig, SourceStatus, SourceType,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_SIZE,
};
use crate::store::Store;

pub struct Crawler {
    store: Store,
}

impl Crawler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Runs a full crawl of one source.
    ///
    /// Writes a `crawling` status up front and a terminal `success` or
    /// `error` status at the end; updates the source's `last_crawled`
    /// timestamp on success. Fatal errors are recorded into the status
    /// and returned inside the result, not propagated; only storage
    /// failures surface as `Err`.
    pub async fn run(&self, source: &SourceConfig) -> Result<CrawlResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        info!(source = %source.id, name = %source.name, "crawl started");

        self.store
            .upsert_status(&SourceStatus {
                source_id: source.id.clone(),
                status: CrawlStatus::Crawling,
                last_run: Some(started_at),
                last_error: None,
                documents_found: 0,
                documents_processed: 0,
                documents_skipped: 0,
                duration_ms: 0,
            })
            .await?;

        let outcome = match source.source_type {
            SourceType::Local => self.crawl_local(source).await,
            other => Err(CoreError::Configuration(format!(
                "source type not implemented: {}",
                other
            ))),
        };

        let duration_ms = timer.elapsed().as_millis() as u64;

        let (result, status, last_error) = match outcome {
            Ok(result) => (result, CrawlStatus::Success, None),
            Err(fatal) => {
                let message = fatal.to_string();
                (
                    CrawlResult {
                        errors: vec![message.clone()],
                        ..Default::default()
                    },
                    CrawlStatus::Error,
                    Some(message),
                )
            }
        };

        self.store
            .upsert_status(&SourceStatus {
                source_id: source.id.clone(),
                status,
                last_run: Some(started_at),
                last_error,
                documents_found: result.found,
                documents_processed: result.processed,
                documents_skipped: result.skipped,
                duration_ms,
            })
            .await?;

        if status == CrawlStatus::Success {
            self.store.set_last_crawled(&source.id, started_at).await?;
        }

        info!(
            source = %source.id,
            status = %status,
            found = result.found,
            processed = result.processed,
            skipped = result.skipped,
            errors = result.errors.len(),
            duration_ms,
            "crawl finished"
        );

        Ok(result)
    }

    /// Runs every enabled source sequentially. One source's failure does
    /// not prevent the next from running.
    pub async fn run_all_enabled(&self) -> Result<Vec<(String, CrawlResult)>> {
        let sources = self.store.list_enabled_sources().await?;
        let mut results = Vec::with_capacity(sources.len());

        for source in &sources {
            let result = match self.run(source).await {
                Ok(r) => r,
                Err(e) => CrawlResult {
                    errors: vec![e.to_string()],
                    ..Default::default()
                },
            };
            results.push((source.id.clone(), result));
        }

        Ok(results)
    }

    async fn crawl_local(&self, source: &SourceConfig) -> Result<CrawlResult, CoreError> {
        let root = source
            .url
            .strip_prefix("file://")
            .ok_or_else(|| {
                CoreError::Configuration(format!(
                    "local source url must start with file://: {}",
                    source.url
                ))
            })?
            .to_string();
        let root = Path::new(&root);

        if !root.is_dir() {
            return Err(CoreError::Configuration(format!(
                "source root is not a directory: {}",
                root.display()
            )));
        }

        let include = build_globset(&source.filters.include)
            .map_err(|e| CoreError::Configuration(format!("invalid include pattern: {}", e)))?;
        let exclude = build_globset(&source.filters.exclude)
            .map_err(|e| CoreError::Configuration(format!("invalid exclude pattern: {}", e)))?;
        let has_includes = !source.filters.include.is_empty();
        let max_depth = source.filters.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let max_size = source.filters.max_size.unwrap_or(DEFAULT_MAX_SIZE);

        let mut result = CrawlResult::default();

        let mut walker = WalkDir::new(root)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    result.errors.push(e.to_string());
                    result.skipped += 1;
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let passes = passes_filters(&rel, &include, &exclude, has_includes);

            if entry.file_type().is_dir() {
                // Non-matching directories are skipped whole: their
                // entries are never visited.
                if !passes {
                    result.skipped += 1;
                    walker.skip_current_dir();
                }
                continue;
            }

            result.found += 1;

            if !passes {
                debug!(path = %rel, "filtered out");
                result.skipped += 1;
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    result.errors.push(
                        CoreError::Extraction {
                            path: rel.clone(),
                            message: e.to_string(),
                        }
                        .to_string(),
                    );
                    result.skipped += 1;
                    continue;
                }
            };

            if metadata.len() > max_size {
                debug!(path = %rel, size = metadata.len(), "over size limit");
                result.skipped += 1;
                continue;
            }

            if DocumentType::from_path(entry.path()).is_none() {
                result.skipped += 1;
                continue;
            }

            let full_path = entry.path().to_string_lossy().to_string();
            let doc_id = extract::document_id(&source.id, &full_path);
            let mtime = file_mtime(&metadata);

            // Incremental re-crawl: an existing document at least as new
            // as the file's mtime is left untouched.
            if let (Some(mtime), Some(existing)) =
                (mtime, self.store.get_document(&doc_id).await.map_err(CoreError::Storage)?)
            {
                if existing.updated_at >= mtime {
                    result.skipped += 1;
                    continue;
                }
            }

            match std::fs::read(entry.path()) {
                Ok(bytes) => {
                    let doc = extract::extract(&bytes, entry.path(), &source.id, mtime);
                    self.store
                        .upsert_document(&doc)
                        .await
                        .map_err(CoreError::Storage)?;
                    result.processed += 1;
                }
                Err(e) => {
                    result.errors.push(
                        CoreError::Extraction {
                            path: rel.clone(),
                            message: e.to_string(),
                        }
                        .to_string(),
                    );
                    result.skipped += 1;
                }
            }
        }

        Ok(result)
    }
}

/// Exclude wins over include; include patterns, when present, must match.
fn passes_filters(rel: &str, include: &GlobSet, exclude: &GlobSet, has_includes: bool) -> bool {
    if exclude.is_match(rel) {
        return false;
    }
    if has_includes && !include.is_match(rel) {
        return false;
    }
    true
}

/// Case-insensitive shell-glob semantics; `*` crosses path separators
/// (globset default).
fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    builder.build()
}

/// File mtime truncated to whole seconds, matching the stored timestamp
/// resolution.
fn file_mtime(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata
        .modified()
        .ok()
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| DateTime::from_timestamp(d.as_secs() as i64, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globs(patterns: &[&str]) -> GlobSet {
        build_globset(&patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn include_must_match_when_present() {
        let include = globs(&["*.md"]);
        let exclude = globs(&[]);
        assert!(passes_filters("guide.md", &include, &exclude, true));
        assert!(passes_filters("sub/guide.md", &include, &exclude, true));
        assert!(!passes_filters("notes.txt", &include, &exclude, true));
    }

    #[test]
    fn exclude_wins_over_include() {
        let include = globs(&["*.md"]);
        let exclude = globs(&["drafts/**"]);
        assert!(!passes_filters("drafts/wip.md", &include, &exclude, true));
        assert!(passes_filters("final/done.md", &include, &exclude, true));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let include = globs(&["*.MD"]);
        let exclude = globs(&[]);
        assert!(passes_filters("readme.md", &include, &exclude, true));
    }

    #[test]
    fn no_includes_means_everything_passes() {
        let include = globs(&[]);
        let exclude = globs(&[]);
        assert!(passes_filters("anything.bin", &include, &exclude, false));
    }
}
