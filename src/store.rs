//! Durable persistence of documents, sources, and run status.
//!
//! The store is the single source of truth. All writes are upserts keyed
//! by id (insert-or-replace: a re-saved row fully replaces the prior one,
//! metadata and tags included). Deleting a source cascades to its
//! documents and status row with explicit ordered deletes rather than
//! foreign-key triggers, keeping the behavior portable.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{
    CrawlStatus, Document, SourceConfig, SourceFilters, SourceStatus, SourceType, StoreStats,
};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ============ Documents ============

    /// Insert-or-replace a document by id.
    pub async fn upsert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, title, content, doc_type, source_id, source_path,
                 metadata_json, tags_json, created_at, updated_at, size, checksum)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                doc_type = excluded.doc_type,
                source_id = excluded.source_id,
                source_path = excluded.source_path,
                metadata_json = excluded.metadata_json,
                tags_json = excluded.tags_json,
                updated_at = excluded.updated_at,
                size = excluded.size,
                checksum = excluded.checksum
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(doc.doc_type.as_str())
        .bind(&doc.source_id)
        .bind(&doc.source_path)
        .bind(serde_json::to_string(&doc.metadata)?)
        .bind(serde_json::to_string(&doc.tags)?)
        .bind(doc.created_at.timestamp())
        .bind(doc.updated_at.timestamp())
        .bind(doc.size as i64)
        .bind(&doc.checksum)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| document_from_row(&r)).transpose()
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents ORDER BY updated_at DESC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(document_from_row).collect()
    }

    pub async fn documents_by_source(&self, source_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT * FROM documents WHERE source_id = ? ORDER BY updated_at DESC, id ASC",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ============ Sources ============

    /// Insert-or-replace a source configuration by id.
    pub async fn upsert_source(&self, source: &SourceConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sources
                (id, name, source_type, url, enabled, schedule, last_crawled,
                 include_json, exclude_json, max_depth, max_size, settings_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                source_type = excluded.source_type,
                url = excluded.url,
                enabled = excluded.enabled,
                schedule = excluded.schedule,
                last_crawled = excluded.last_crawled,
                include_json = excluded.include_json,
                exclude_json = excluded.exclude_json,
                max_depth = excluded.max_depth,
                max_size = excluded.max_size,
                settings_json = excluded.settings_json
            "#,
        )
        .bind(&source.id)
        .bind(&source.name)
        .bind(source.source_type.as_str())
        .bind(&source.url)
        .bind(source.enabled)
        .bind(&source.schedule)
        .bind(source.last_crawled.map(|t| t.timestamp()))
        .bind(serde_json::to_string(&source.filters.include)?)
        .bind(serde_json::to_string(&source.filters.exclude)?)
        .bind(source.filters.max_depth.map(|d| d as i64))
        .bind(source.filters.max_size.map(|s| s as i64))
        .bind(serde_json::to_string(&source.settings)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_source(&self, id: &str) -> Result<Option<SourceConfig>> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| source_from_row(&r)).transpose()
    }

    pub async fn list_sources(&self) -> Result<Vec<SourceConfig>> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(source_from_row).collect()
    }

    pub async fn list_enabled_sources(&self) -> Result<Vec<SourceConfig>> {
        let rows = sqlx::query("SELECT * FROM sources WHERE enabled = 1 ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(source_from_row).collect()
    }

    /// Deletes a source and everything it owns: documents first, then the
    /// status row, then the source row itself. Each delete is individually
    /// atomic; a crash between them leaves rows a future crawl re-creates.
    pub async fn delete_source(&self, id: &str) -> Result<bool> {
        sqlx::query("DELETE FROM documents WHERE source_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM source_status WHERE source_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_last_crawled(&self, source_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sources SET last_crawled = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ============ Status ============

    /// Fully replaces the status row for a source.
    pub async fn upsert_status(&self, status: &SourceStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_status
                (source_id, status, last_run, last_error,
                 documents_found, documents_processed, documents_skipped, duration_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                status = excluded.status,
                last_run = excluded.last_run,
                last_error = excluded.last_error,
                documents_found = excluded.documents_found,
                documents_processed = excluded.documents_processed,
                documents_skipped = excluded.documents_skipped,
                duration_ms = excluded.duration_ms
            "#,
        )
        .bind(&status.source_id)
        .bind(status.status.as_str())
        .bind(status.last_run.map(|t| t.timestamp()))
        .bind(&status.last_error)
        .bind(status.documents_found as i64)
        .bind(status.documents_processed as i64)
        .bind(status.documents_skipped as i64)
        .bind(status.duration_ms as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_status(&self, source_id: &str) -> Result<Option<SourceStatus>> {
        let row = sqlx::query("SELECT * FROM source_status WHERE source_id = ?")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| status_from_row(&r)).transpose()
    }

    // ============ Stats ============

    /// Aggregate statistics over current document rows. `last_updated` is
    /// the maximum `updated_at`, used by the index as its staleness
    /// signal.
    pub async fn stats(&self) -> Result<StoreStats> {
        let total_documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        let total_size: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM documents")
                .fetch_one(&self.pool)
                .await?;

        let last_updated: Option<i64> = sqlx::query_scalar("SELECT MAX(updated_at) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        let type_rows =
            sqlx::query("SELECT doc_type, COUNT(*) AS n FROM documents GROUP BY doc_type")
                .fetch_all(&self.pool)
                .await?;
        let mut documents_by_type = HashMap::new();
        for row in &type_rows {
            documents_by_type.insert(row.get::<String, _>("doc_type"), row.get::<i64, _>("n") as u64);
        }

        let source_rows =
            sqlx::query("SELECT source_id, COUNT(*) AS n FROM documents GROUP BY source_id")
                .fetch_all(&self.pool)
                .await?;
        let mut documents_by_source = HashMap::new();
        for row in &source_rows {
            documents_by_source
                .insert(row.get::<String, _>("source_id"), row.get::<i64, _>("n") as u64);
        }

        Ok(StoreStats {
            total_documents: total_documents as u64,
            documents_by_type,
            documents_by_source,
            total_size: total_size as u64,
            last_updated: last_updated.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }
}

// ============ Row mapping ============

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let doc_type: String = row.get("doc_type");
    let metadata_json: String = row.get("metadata_json");
    let tags_json: String = row.get("tags_json");
    let created_at: i64 = row.get("created_at");
    let updated_at: i64 = row.get("updated_at");

    Ok(Document {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        doc_type: doc_type
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?,
        source_id: row.get("source_id"),
        source_path: row.get("source_path"),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
        size: row.get::<i64, _>("size") as u64,
        checksum: row.get("checksum"),
    })
}

fn source_from_row(row: &SqliteRow) -> Result<SourceConfig> {
    let source_type: String = row.get("source_type");
    let include_json: String = row.get("include_json");
    let exclude_json: String = row.get("exclude_json");
    let settings_json: String = row.get("settings_json");
    let last_crawled: Option<i64> = row.get("last_crawled");

    Ok(SourceConfig {
        id: row.get("id"),
        name: row.get("name"),
        source_type: source_type
            .parse::<SourceType>()
            .map_err(|e| anyhow::anyhow!(e))?,
        url: row.get("url"),
        enabled: row.get("enabled"),
        schedule: row.get("schedule"),
        last_crawled: last_crawled.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        filters: SourceFilters {
            include: serde_json::from_str(&include_json).unwrap_or_default(),
            exclude: serde_json::from_str(&exclude_json).unwrap_or_default(),
            max_depth: row.get::<Option<i64>, _>("max_depth").map(|d| d as usize),
            max_size: row.get::<Option<i64>, _>("max_size").map(|s| s as u64),
        },
        settings: serde_json::from_str(&settings_json).unwrap_or(serde_json::json!({})),
    })
}

fn status_from_row(row: &SqliteRow) -> Result<SourceStatus> {
    let status: String = row.get("status");
    let last_run: Option<i64> = row.get("last_run");

    Ok(SourceStatus {
        source_id: row.get("source_id"),
        status: status
            .parse::<CrawlStatus>()
            .map_err(|e| anyhow::anyhow!(e))?,
        last_run: last_run.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        last_error: row.get("last_error"),
        documents_found: row.get::<i64, _>("documents_found") as u64,
        documents_processed: row.get::<i64, _>("documents_processed") as u64,
        documents_skipped: row.get::<i64, _>("documents_skipped") as u64,
        duration_ms: row.get::<i64, _>("duration_ms") as u64,
    })
}
