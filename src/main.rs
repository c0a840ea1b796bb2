//! # docshelf CLI (`shelf`)
//!
//! The `shelf` binary is the request surface for docshelf. It translates
//! arguments into [`Shelf`](docshelf::service::Shelf) calls and formats
//! results; it performs no crawling, filtering, or ranking decisions of
//! its own.
//!
//! ## Usage
//!
//! ```bash
//! shelf --config ./shelf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shelf init` | Create the SQLite database and run schema migrations |
//! | `shelf source add <name> <url>` | Register a documentation source |
//! | `shelf source list` | List configured sources |
//! | `shelf source show <id>` | Show a source and its last run status |
//! | `shelf source remove <id>` | Delete a source and everything it owns |
//! | `shelf crawl <id>` / `shelf crawl --all` | Run a crawl |
//! | `shelf search "<query>"` | Fuzzy search the collection |
//! | `shelf get <id>` | Print a full document |
//! | `shelf recent` | Most recently updated documents |
//! | `shelf similar <id>` | Documents similar to the given one |
//! | `shelf stats` | Collection statistics |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use docshelf::config::{self, Config};
use docshelf::models::{DocumentType, SearchOptions, SourceFilters, SourceType};
use docshelf::service::{NewSource, Shelf};

/// docshelf: aggregate documentation from local sources into a
/// searchable, normalized collection.
#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Aggregates documentation from local sources into a searchable collection",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./shelf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables.
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Manage documentation sources.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Crawl a source (or all enabled sources).
    ///
    /// Walks the source tree, extracts new or changed files, and writes
    /// them to the store. Per-file errors are reported but do not abort
    /// the run.
    Crawl {
        /// Source id to crawl.
        id: Option<String>,

        /// Crawl every enabled source sequentially.
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },

    /// Fuzzy search the collection.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Match tolerance in [0, 1]: 0 = exact, 1 = match anything.
        #[arg(long)]
        threshold: Option<f64>,

        /// Restrict to documents from this source id (repeatable).
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Restrict to a document type (repeatable): markdown, html,
        /// pdf, text, json.
        #[arg(long = "type", value_parser = DocumentType::from_str)]
        types: Vec<DocumentType>,

        /// Restrict to documents carrying this tag (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Print a document by id.
    Get {
        /// Document id.
        id: String,
    },

    /// List the most recently updated documents.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Find documents similar to the given one.
    Similar {
        /// Document id.
        id: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Show collection statistics.
    Stats,
}

#[derive(Subcommand)]
enum SourceAction {
    /// Register a new source.
    Add {
        /// Human-readable source name.
        name: String,

        /// Source root; for local sources a file:// path.
        url: String,

        /// Source type: local, git, web, api. Only local is crawlable.
        #[arg(long = "type", default_value = "local", value_parser = SourceType::from_str)]
        source_type: SourceType,

        /// Glob pattern a relative path must match (repeatable).
        #[arg(long)]
        include: Vec<String>,

        /// Glob pattern that rejects a relative path (repeatable).
        #[arg(long)]
        exclude: Vec<String>,

        /// Maximum traversal depth (default 10).
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum file size in bytes (default 10 MiB).
        #[arg(long)]
        max_size: Option<u64>,

        /// Register the source disabled.
        #[arg(long)]
        disabled: bool,
    },

    /// List configured sources.
    List,

    /// Show a source and its last run status.
    Show {
        /// Source id.
        id: String,
    },

    /// Delete a source, its documents, and its status.
    Remove {
        /// Source id.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;
    let shelf = Shelf::open(&cfg).await?;

    match cli.command {
        Commands::Init => {
            // Shelf::open already ran the migrations.
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Source { action } => run_source(&shelf, action).await?,
        Commands::Crawl { id, all } => run_crawl(&shelf, id, all).await?,
        Commands::Search {
            query,
            limit,
            threshold,
            sources,
            types,
            tags,
        } => {
            let options = SearchOptions {
                limit: limit.unwrap_or(cfg.search.limit),
                threshold: threshold.or(Some(cfg.search.threshold)),
                source_ids: sources,
                types,
                tags,
            };
            let hits = shelf.search(&query, &options).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.2}] {} ({})",
                    i + 1,
                    hit.score,
                    hit.document.title,
                    hit.document.doc_type
                );
                println!("    path: {}", hit.document.source_path);
                for h in &hit.highlights {
                    println!("    {}: \"{}\"", h.field, h.snippet);
                }
                println!("    id: {}", hit.document.id);
                println!();
            }
        }
        Commands::Get { id } => {
            let doc = shelf.get_document(&id).await?;
            println!("--- Document ---");
            println!("id:        {}", doc.id);
            println!("title:     {}", doc.title);
            println!("type:      {}", doc.doc_type);
            println!("source:    {}", doc.source_id);
            println!("path:      {}", doc.source_path);
            println!("updated:   {}", doc.updated_at.format("%Y-%m-%dT%H:%M:%SZ"));
            println!("size:      {}", doc.size);
            println!("checksum:  {}", doc.checksum);
            if !doc.tags.is_empty() {
                println!("tags:      {}", doc.tags.join(", "));
            }
            println!("metadata:  {}", doc.metadata);
            println!();
            println!("--- Content ---");
            println!("{}", doc.content);
        }
        Commands::Recent { limit } => {
            for doc in shelf.recent_documents(limit).await? {
                println!(
                    "{}  {}  {}",
                    doc.updated_at.format("%Y-%m-%d %H:%M"),
                    doc.id,
                    doc.title
                );
            }
        }
        Commands::Similar { id, limit } => {
            for (i, hit) in shelf.similar_documents(&id, limit).await?.iter().enumerate() {
                println!(
                    "{}. [{:.2}] {}  {}",
                    i + 1,
                    hit.score,
                    hit.document.id,
                    hit.document.title
                );
            }
        }
        Commands::Stats => {
            let stats = shelf.stats().await?;
            println!("docshelf - Collection Stats");
            println!("===========================");
            println!();
            println!("  Documents:  {}", stats.total_documents);
            println!("  Total size: {} bytes", stats.total_size);
            if let Some(last) = stats.last_updated {
                println!("  Updated:    {}", last.format("%Y-%m-%dT%H:%M:%SZ"));
            }
            if !stats.documents_by_type.is_empty() {
                println!();
                println!("  By type:");
                let mut by_type: Vec<_> = stats.documents_by_type.iter().collect();
                by_type.sort();
                for (doc_type, n) in by_type {
                    println!("    {:<10} {}", doc_type, n);
                }
            }
            if !stats.documents_by_source.is_empty() {
                println!();
                println!("  By source:");
                let mut by_source: Vec<_> = stats.documents_by_source.iter().collect();
                by_source.sort();
                for (source, n) in by_source {
                    println!("    {:<38} {}", source, n);
                }
            }
        }
    }

    Ok(())
}

/// The config file is optional: a missing file falls back to defaults
/// rooted at `./shelf.db`.
fn load_or_default(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::with_db_path(PathBuf::from("./shelf.db")))
    }
}

async fn run_source(shelf: &Shelf, action: SourceAction) -> anyhow::Result<()> {
    match action {
        SourceAction::Add {
            name,
            url,
            source_type,
            include,
            exclude,
            max_depth,
            max_size,
            disabled,
        } => {
            let source = shelf
                .add_source(NewSource {
                    id: None,
                    name,
                    source_type,
                    url,
                    enabled: !disabled,
                    schedule: None,
                    filters: SourceFilters {
                        include,
                        exclude,
                        max_depth,
                        max_size,
                    },
                    settings: serde_json::json!({}),
                })
                .await?;
            println!("Added source {} ({})", source.id, source.name);
        }
        SourceAction::List => {
            for source in shelf.list_sources().await? {
                println!(
                    "{}  {:<7} {:<9} {:<24} {}",
                    source.id,
                    source.source_type,
                    if source.enabled { "enabled" } else { "disabled" },
                    source.name,
                    source.url
                );
            }
        }
        SourceAction::Show { id } => {
            let source = shelf.get_source(&id).await?;
            let status = shelf.source_status(&id).await?;
            println!("id:        {}", source.id);
            println!("name:      {}", source.name);
            println!("type:      {}", source.source_type);
            println!("url:       {}", source.url);
            println!("enabled:   {}", source.enabled);
            if !source.filters.include.is_empty() {
                println!("include:   {}", source.filters.include.join(", "));
            }
            if !source.filters.exclude.is_empty() {
                println!("exclude:   {}", source.filters.exclude.join(", "));
            }
            if let Some(last) = source.last_crawled {
                println!("crawled:   {}", last.format("%Y-%m-%dT%H:%M:%SZ"));
            }
            println!();
            println!("status:    {}", status.status);
            if let Some(err) = &status.last_error {
                println!("error:     {}", err);
            }
            println!(
                "counts:    found={} processed={} skipped={}",
                status.documents_found, status.documents_processed, status.documents_skipped
            );
            println!("duration:  {} ms", status.duration_ms);
        }
        SourceAction::Remove { id } => {
            shelf.delete_source(&id).await?;
            println!("Removed source {}", id);
        }
    }
    Ok(())
}

async fn run_crawl(shelf: &Shelf, id: Option<String>, all: bool) -> anyhow::Result<()> {
    if all {
        for (source_id, result) in shelf.crawl_all_enabled().await? {
            print_crawl_result(&source_id, &result);
        }
        return Ok(());
    }

    let id = id.ok_or_else(|| anyhow::anyhow!("pass a source id or --all"))?;
    let result = shelf.crawl_source(&id).await?;
    print_crawl_result(&id, &result);
    Ok(())
}

fn print_crawl_result(source_id: &str, result: &docshelf::models::CrawlResult) {
    println!("crawl {}", source_id);
    println!("  found:     {}", result.found);
    println!("  processed: {}", result.processed);
    println!("  skipped:   {}", result.skipped);
    for err in &result.errors {
        println!("  error: {}", err);
    }
}
