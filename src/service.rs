//! The top-level context object.
//!
//! [`Shelf`] constructs the store, crawler, and search index once and
//! passes references explicitly to every operation; no ambient mutable
//! globals. It exposes exactly the operation surface the request layer
//! is allowed to call; that layer performs no business logic of its own.

use anyhow::Result;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::crawler::Crawler;
use crate::error::{CoreError, CoreResult};
use crate::index::SearchIndex;
use crate::models::{
    CrawlResult, Document, SearchHit, SearchOptions, SourceConfig, SourceFilters, SourceStatus,
    SourceType, StoreStats,
};
use crate::store::Store;
use crate::{db, migrate};

/// Caller-supplied fields for a new source. The id is generated unless
/// provided.
#[derive(Debug, Clone, Default)]
pub struct NewSource {
    pub id: Option<String>,
    pub name: String,
    pub source_type: SourceType,
    pub url: String,
    pub enabled: bool,
    pub schedule: Option<String>,
    pub filters: SourceFilters,
    pub settings: serde_json::Value,
}

pub struct Shelf {
    store: Store,
    crawler: Crawler,
    index: Mutex<SearchIndex>,
}

impl Shelf {
    /// Opens (and migrates) the database and wires up the components.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;
        let store = Store::new(pool);

        Ok(Self {
            crawler: Crawler::new(store.clone()),
            store,
            index: Mutex::new(SearchIndex::new()),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ============ Sources ============

    /// Registers a source. Input is validated before any store mutation.
    pub async fn add_source(&self, new: NewSource) -> CoreResult<SourceConfig> {
        validate_source_input(&new.name, new.source_type, &new.url)?;

        let source = SourceConfig {
            id: new.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: new.name,
            source_type: new.source_type,
            url: new.url,
            enabled: new.enabled,
            schedule: new.schedule,
            last_crawled: None,
            filters: new.filters,
            settings: new.settings,
        };

        self.store.upsert_source(&source).await?;
        Ok(source)
    }

    pub async fn get_source(&self, id: &str) -> CoreResult<SourceConfig> {
        self.store
            .get_source(id)
            .await?
            .ok_or_else(|| CoreError::source_not_found(id))
    }

    pub async fn list_sources(&self) -> CoreResult<Vec<SourceConfig>> {
        Ok(self.store.list_sources().await?)
    }

    /// Replaces an existing source's configuration. The source must
    /// exist; `last_crawled` is preserved.
    pub async fn update_source(&self, source: SourceConfig) -> CoreResult<SourceConfig> {
        validate_source_input(&source.name, source.source_type, &source.url)?;

        let existing = self
            .store
            .get_source(&source.id)
            .await?
            .ok_or_else(|| CoreError::source_not_found(&source.id))?;

        let updated = SourceConfig {
            last_crawled: existing.last_crawled,
            ..source
        };
        self.store.upsert_source(&updated).await?;
        Ok(updated)
    }

    /// Deletes a source, cascading to its documents and status row.
    pub async fn delete_source(&self, id: &str) -> CoreResult<()> {
        if self.store.get_source(id).await?.is_none() {
            return Err(CoreError::source_not_found(id));
        }
        self.store.delete_source(id).await?;
        Ok(())
    }

    pub async fn source_status(&self, id: &str) -> CoreResult<SourceStatus> {
        if self.store.get_source(id).await?.is_none() {
            return Err(CoreError::source_not_found(id));
        }
        Ok(self
            .store
            .get_status(id)
            .await?
            .unwrap_or_else(|| SourceStatus::idle(id)))
    }

    // ============ Crawling ============

    pub async fn crawl_source(&self, id: &str) -> CoreResult<CrawlResult> {
        let source = self
            .store
            .get_source(id)
            .await?
            .ok_or_else(|| CoreError::source_not_found(id))?;
        Ok(self.crawler.run(&source).await?)
    }

    pub async fn crawl_all_enabled(&self) -> CoreResult<Vec<(String, CrawlResult)>> {
        Ok(self.crawler.run_all_enabled().await?)
    }

    // ============ Retrieval ============

    pub async fn search(&self, query: &str, options: &SearchOptions) -> CoreResult<Vec<SearchHit>> {
        if let Some(t) = options.threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(CoreError::Validation(format!(
                    "threshold must be in [0, 1], got {}",
                    t
                )));
            }
        }

        let mut index = self.index.lock().await;
        index.refresh(&self.store).await?;
        Ok(index.search(query, options))
    }

    pub async fn get_document(&self, id: &str) -> CoreResult<Document> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| CoreError::document_not_found(id))
    }

    pub async fn recent_documents(&self, limit: usize) -> CoreResult<Vec<Document>> {
        let mut index = self.index.lock().await;
        index.refresh(&self.store).await?;
        Ok(index.recent_documents(limit))
    }

    pub async fn similar_documents(&self, id: &str, limit: usize) -> CoreResult<Vec<SearchHit>> {
        let mut index = self.index.lock().await;
        index.refresh(&self.store).await?;

        if self.store.get_document(id).await?.is_none() {
            return Err(CoreError::document_not_found(id));
        }
        Ok(index.similar_documents(id, limit))
    }

    pub async fn stats(&self) -> CoreResult<StoreStats> {
        Ok(self.store.stats().await?)
    }
}

fn validate_source_input(name: &str, source_type: SourceType, url: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("source name must not be empty".into()));
    }
    if url.trim().is_empty() {
        return Err(CoreError::Validation("source url must not be empty".into()));
    }
    if source_type == SourceType::Local && !url.starts_with("file://") {
        return Err(CoreError::Validation(format!(
            "local source url must start with file://, got {}",
            url
        )));
    }
    Ok(())
}
