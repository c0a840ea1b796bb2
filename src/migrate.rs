use anyhow::Result;
use sqlx::SqlitePool;

/// Creates the schema. Idempotent, safe to run on every open.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            source_id TEXT NOT NULL,
            source_path TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            tags_json TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            size INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            source_type TEXT NOT NULL,
            url TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            schedule TEXT,
            last_crawled INTEGER,
            include_json TEXT NOT NULL DEFAULT '[]',
            exclude_json TEXT NOT NULL DEFAULT '[]',
            max_depth INTEGER,
            max_size INTEGER,
            settings_json TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_status (
            source_id TEXT PRIMARY KEY REFERENCES sources(id),
            status TEXT NOT NULL,
            last_run INTEGER,
            last_error TEXT,
            documents_found INTEGER NOT NULL DEFAULT 0,
            documents_processed INTEGER NOT NULL DEFAULT 0,
            documents_skipped INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Secondary lookups: documents by source, by type, by recency;
    // sources by enablement.
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_source_id ON documents(source_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_doc_type ON documents(doc_type)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents(updated_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sources_enabled ON sources(enabled)")
        .execute(pool)
        .await?;

    Ok(())
}
