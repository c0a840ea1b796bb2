//! End-to-end pipeline tests: crawl, extract, store, search through the
//! public `Shelf` surface against a temporary database and source tree.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use docshelf::config::Config;
use docshelf::error::CoreError;
use docshelf::models::{CrawlStatus, SearchOptions, SourceFilters, SourceType};
use docshelf::service::{NewSource, Shelf};

async fn open_shelf(tmp: &TempDir) -> Shelf {
    let config = Config::with_db_path(tmp.path().join("shelf.db"));
    Shelf::open(&config).await.unwrap()
}

fn local_source(name: &str, root: &Path, filters: SourceFilters) -> NewSource {
    NewSource {
        id: None,
        name: name.to_string(),
        source_type: SourceType::Local,
        url: format!("file://{}", root.display()),
        enabled: true,
        schedule: None,
        filters,
        settings: serde_json::json!({}),
    }
}

fn write_docs_tree(root: &Path) {
    fs::create_dir_all(root).unwrap();
    fs::write(
        root.join("kubernetes.md"),
        "# Kubernetes Deployment\n\nHow to deploy workloads to a kubernetes cluster.\nPods, services, and ingress are covered.",
    )
    .unwrap();
    fs::write(
        root.join("docker.md"),
        "# Docker Basics\n\nBuilding container images and running them locally.",
    )
    .unwrap();
    fs::write(
        root.join("notes.txt"),
        "Deployment notes\n\nMiscellaneous notes about rollouts and kubernetes upgrades.",
    )
    .unwrap();
}

#[tokio::test]
async fn crawl_ingests_supported_files() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_docs_tree(&docs);

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();

    let result = shelf.crawl_source(&source.id).await.unwrap();
    assert_eq!(result.found, 3);
    assert_eq!(result.processed, 3);
    assert_eq!(result.skipped, 0);
    assert!(result.errors.is_empty());
    assert_eq!(result.found, result.processed + result.skipped);

    let status = shelf.source_status(&source.id).await.unwrap();
    assert_eq!(status.status, CrawlStatus::Success);
    assert_eq!(status.documents_processed, 3);
    assert!(status.last_run.is_some());

    let updated = shelf.get_source(&source.id).await.unwrap();
    assert!(updated.last_crawled.is_some());
}

#[tokio::test]
async fn document_identity_is_stable_across_content_changes() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("guide.md"), "# Guide\n\nFirst version.").unwrap();

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();

    shelf.crawl_source(&source.id).await.unwrap();
    let before = shelf.store().documents_by_source(&source.id).await.unwrap();
    assert_eq!(before.len(), 1);

    // Stored timestamps have second resolution; make the rewrite land on
    // a strictly newer mtime.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    fs::write(docs.join("guide.md"), "# Guide\n\nSecond version, revised.").unwrap();

    let result = shelf.crawl_source(&source.id).await.unwrap();
    assert_eq!(result.processed, 1);

    let after = shelf.store().documents_by_source(&source.id).await.unwrap();
    assert_eq!(after.len(), 1, "re-crawl must not duplicate documents");
    assert_eq!(after[0].id, before[0].id);
    assert_ne!(after[0].checksum, before[0].checksum);
    assert_eq!(after[0].created_at, before[0].created_at);
    assert!(after[0].updated_at > before[0].updated_at);
}

#[tokio::test]
async fn unchanged_files_are_skipped_on_recrawl() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_docs_tree(&docs);

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();

    let first = shelf.crawl_source(&source.id).await.unwrap();
    assert_eq!(first.processed, 3);

    let second = shelf.crawl_source(&source.id).await.unwrap();
    assert_eq!(second.found, 3);
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 3);
}

#[tokio::test]
async fn markdown_front_matter_drives_title_and_tags() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("setup.md"),
        "---\ntitle: Setup\ntags: [setup]\n---\n# Getting Started\n\nRun `npm install`.",
    )
    .unwrap();

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();
    shelf.crawl_source(&source.id).await.unwrap();

    let docs = shelf.store().documents_by_source(&source.id).await.unwrap();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.title, "Setup");
    assert_eq!(doc.tags, vec!["setup".to_string()]);
    assert!(doc.content.contains("Run npm install"));
    assert!(!doc.content.contains('#'), "markup must be stripped");
    assert_eq!(doc.metadata["filename"], "setup.md");
}

#[tokio::test]
async fn filters_and_size_cap_are_applied() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(docs.join("drafts")).unwrap();
    fs::write(docs.join("guide.md"), "# Guide\n\nShip it.").unwrap();
    fs::write(docs.join("notes.txt"), "plain notes").unwrap();
    fs::write(docs.join("big.md"), "x".repeat(2048)).unwrap();
    fs::write(docs.join("drafts").join("wip.md"), "# WIP").unwrap();

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source(
            "docs",
            &docs,
            SourceFilters {
                include: Vec::new(),
                exclude: vec!["drafts/**".to_string(), "*.txt".to_string()],
                max_depth: None,
                max_size: Some(1024),
            },
        ))
        .await
        .unwrap();

    let result = shelf.crawl_source(&source.id).await.unwrap();
    assert_eq!(result.found, 4);
    assert_eq!(result.processed, 1);
    assert_eq!(result.skipped, 3);
    assert_eq!(result.found, result.processed + result.skipped);

    let stored = shelf.store().documents_by_source(&source.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Guide");
}

#[tokio::test]
async fn deleting_a_source_removes_its_documents_and_status() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_docs_tree(&docs);

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();
    shelf.crawl_source(&source.id).await.unwrap();

    let ingested = shelf.store().documents_by_source(&source.id).await.unwrap();
    assert!(!ingested.is_empty());
    let doc_id = ingested[0].id.clone();

    shelf.delete_source(&source.id).await.unwrap();

    assert!(matches!(
        shelf.get_source(&source.id).await,
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        shelf.get_document(&doc_id).await,
        Err(CoreError::NotFound { .. })
    ));
    assert!(shelf
        .store()
        .documents_by_source(&source.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unimplemented_source_types_record_an_error_status() {
    let tmp = TempDir::new().unwrap();
    let shelf = open_shelf(&tmp).await;

    let source = shelf
        .add_source(NewSource {
            id: None,
            name: "upstream".to_string(),
            source_type: SourceType::Git,
            url: "https://example.com/docs.git".to_string(),
            enabled: true,
            schedule: None,
            filters: SourceFilters::default(),
            settings: serde_json::json!({}),
        })
        .await
        .unwrap();

    let result = shelf.crawl_source(&source.id).await.unwrap();
    assert_eq!(result.processed, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("not implemented"));

    let status = shelf.source_status(&source.id).await.unwrap();
    assert_eq!(status.status, CrawlStatus::Error);
    assert!(status.last_error.as_deref().unwrap().contains("not implemented"));

    let updated = shelf.get_source(&source.id).await.unwrap();
    assert!(updated.last_crawled.is_none(), "failed runs must not advance last_crawled");
}

#[cfg(unix)]
#[tokio::test]
async fn per_file_failures_are_reported_without_aborting_the_run() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("good.md"), "# Good\n\nReadable content.").unwrap();
    // A dangling symlink: discovered as a file, but unreadable.
    std::os::unix::fs::symlink(tmp.path().join("gone.md"), docs.join("broken.md")).unwrap();

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();

    let result = shelf.crawl_source(&source.id).await.unwrap();
    assert_eq!(result.found, 2);
    assert_eq!(result.processed, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("extraction failed for broken.md"));

    // Per-file failures leave the run successful.
    let status = shelf.source_status(&source.id).await.unwrap();
    assert_eq!(status.status, CrawlStatus::Success);
}

#[tokio::test]
async fn missing_root_is_a_fatal_crawl_error() {
    let tmp = TempDir::new().unwrap();
    let shelf = open_shelf(&tmp).await;

    let source = shelf
        .add_source(local_source(
            "ghost",
            &tmp.path().join("does-not-exist"),
            SourceFilters::default(),
        ))
        .await
        .unwrap();

    let result = shelf.crawl_source(&source.id).await.unwrap();
    assert_eq!(result.processed, 0);
    assert!(!result.errors.is_empty());

    let status = shelf.source_status(&source.id).await.unwrap();
    assert_eq!(status.status, CrawlStatus::Error);
}

#[tokio::test]
async fn search_finds_crawled_documents() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_docs_tree(&docs);

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();
    shelf.crawl_source(&source.id).await.unwrap();

    let hits = shelf
        .search("kubernetes", &SearchOptions::default())
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].document.title, "Kubernetes Deployment");
    assert!(hits[0].score > 0.0 && hits[0].score <= 1.0);
    assert!(!hits[0].highlights.is_empty());

    // The typo still matches fuzzily at the default tolerance.
    let fuzzy = shelf
        .search("kubernets", &SearchOptions::default())
        .await
        .unwrap();
    assert!(fuzzy
        .iter()
        .any(|h| h.document.title == "Kubernetes Deployment"));
}

#[tokio::test]
async fn search_rejects_out_of_range_threshold() {
    let tmp = TempDir::new().unwrap();
    let shelf = open_shelf(&tmp).await;

    let err = shelf
        .search(
            "anything",
            &SearchOptions {
                threshold: Some(1.5),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn similar_documents_excludes_the_subject() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_docs_tree(&docs);

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();
    shelf.crawl_source(&source.id).await.unwrap();

    let hits = shelf
        .search("kubernetes deployment", &SearchOptions::default())
        .await
        .unwrap();
    let subject = hits[0].document.id.clone();

    let similar = shelf.similar_documents(&subject, 5).await.unwrap();
    assert!(similar.iter().all(|h| h.document.id != subject));

    assert!(matches!(
        shelf.similar_documents("no-such-doc", 5).await,
        Err(CoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn index_refreshes_after_new_crawls() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("one.md"), "# Alpha Topic\n\nAbout alpha.").unwrap();

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();
    shelf.crawl_source(&source.id).await.unwrap();

    let hits = shelf.search("omega", &SearchOptions::default()).await.unwrap();
    assert!(hits.is_empty());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    fs::write(docs.join("two.md"), "# Omega Topic\n\nAbout omega.").unwrap();
    shelf.crawl_source(&source.id).await.unwrap();

    let hits = shelf.search("omega", &SearchOptions::default()).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.title, "Omega Topic");
}

#[tokio::test]
async fn stats_reflect_the_collection() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_docs_tree(&docs);

    let shelf = open_shelf(&tmp).await;
    let source = shelf
        .add_source(local_source("docs", &docs, SourceFilters::default()))
        .await
        .unwrap();
    shelf.crawl_source(&source.id).await.unwrap();

    let stats = shelf.stats().await.unwrap();
    assert_eq!(stats.total_documents, 3);
    assert_eq!(stats.documents_by_type.get("markdown"), Some(&2));
    assert_eq!(stats.documents_by_type.get("text"), Some(&1));
    assert_eq!(stats.documents_by_source.get(&source.id), Some(&3));
    assert!(stats.total_size > 0);
    assert!(stats.last_updated.is_some());
}

#[tokio::test]
async fn source_validation_rejects_bad_input() {
    let tmp = TempDir::new().unwrap();
    let shelf = open_shelf(&tmp).await;

    let err = shelf
        .add_source(NewSource {
            name: "".to_string(),
            url: "file:///tmp".to_string(),
            enabled: true,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let err = shelf
        .add_source(NewSource {
            name: "docs".to_string(),
            source_type: SourceType::Local,
            url: "/no/scheme".to_string(),
            enabled: true,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn crawl_all_runs_every_enabled_source() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    fs::create_dir_all(&a).unwrap();
    fs::create_dir_all(&b).unwrap();
    fs::write(a.join("a.md"), "# A\n\nalpha").unwrap();
    fs::write(b.join("b.md"), "# B\n\nbeta").unwrap();

    let shelf = open_shelf(&tmp).await;
    shelf
        .add_source(local_source("a", &a, SourceFilters::default()))
        .await
        .unwrap();
    shelf
        .add_source(local_source("b", &b, SourceFilters::default()))
        .await
        .unwrap();
    let mut disabled = local_source("c", &a, SourceFilters::default());
    disabled.enabled = false;
    shelf.add_source(disabled).await.unwrap();

    let results = shelf.crawl_all_enabled().await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.processed == 1));
}
