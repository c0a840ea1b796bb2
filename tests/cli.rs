//! CLI integration tests driving the `shelf` binary end to end.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn shelf_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("shelf");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt covers cargo and crates.",
    ).unwrap();
    fs::write(
        docs_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nNotes about deployment and infrastructure.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/shelf.db"

[search]
threshold = 0.3
limit = 10
"#,
        root.display()
    );

    let config_path = root.join("shelf.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_shelf(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = shelf_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run shelf binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Adds a local source over the docs dir and returns its id, parsed from
/// the "Added source <id> (<name>)" line.
fn add_docs_source(config_path: &Path) -> String {
    let docs = config_path.parent().unwrap().join("docs");
    let url = format!("file://{}", docs.display());
    let (stdout, stderr, success) =
        run_shelf(config_path, &["source", "add", "docs", &url]);
    assert!(success, "source add failed: stdout={}, stderr={}", stdout, stderr);

    stdout
        .split_whitespace()
        .nth(2)
        .expect("source id in output")
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_shelf(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_shelf(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_shelf(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_source_add_list_show_remove() {
    let (_tmp, config_path) = setup_test_env();
    run_shelf(&config_path, &["init"]);

    let id = add_docs_source(&config_path);

    let (stdout, _, success) = run_shelf(&config_path, &["source", "list"]);
    assert!(success);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("docs"));
    assert!(stdout.contains("enabled"));

    let (stdout, _, success) = run_shelf(&config_path, &["source", "show", &id]);
    assert!(success);
    assert!(stdout.contains("status:    idle"));

    let (stdout, _, success) = run_shelf(&config_path, &["source", "remove", &id]);
    assert!(success);
    assert!(stdout.contains("Removed source"));

    let (stdout, _, _) = run_shelf(&config_path, &["source", "list"]);
    assert!(!stdout.contains(&id));
}

#[test]
fn test_crawl_and_search_flow() {
    let (_tmp, config_path) = setup_test_env();
    run_shelf(&config_path, &["init"]);
    let id = add_docs_source(&config_path);

    let (stdout, stderr, success) = run_shelf(&config_path, &["crawl", &id]);
    assert!(success, "crawl failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("found:     3"));
    assert!(stdout.contains("processed: 3"));

    let (stdout, stderr, success) = run_shelf(&config_path, &["search", "Rust programming"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Alpha Document"));

    // Re-crawl skips everything unchanged.
    let (stdout, _, success) = run_shelf(&config_path, &["crawl", &id]);
    assert!(success);
    assert!(stdout.contains("processed: 0"));
    assert!(stdout.contains("skipped:   3"));
}

#[test]
fn test_crawl_all() {
    let (_tmp, config_path) = setup_test_env();
    run_shelf(&config_path, &["init"]);
    add_docs_source(&config_path);

    let (stdout, stderr, success) = run_shelf(&config_path, &["crawl", "--all"]);
    assert!(success, "crawl --all failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("processed: 3"));
}

#[test]
fn test_get_recent_and_stats() {
    let (_tmp, config_path) = setup_test_env();
    run_shelf(&config_path, &["init"]);
    let id = add_docs_source(&config_path);
    run_shelf(&config_path, &["crawl", &id]);

    let (stdout, _, success) = run_shelf(&config_path, &["recent", "--limit", "2"]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 2);

    let doc_id = stdout
        .lines()
        .next()
        .unwrap()
        .split_whitespace()
        .nth(2)
        .unwrap()
        .to_string();

    let (stdout, _, success) = run_shelf(&config_path, &["get", &doc_id]);
    assert!(success);
    assert!(stdout.contains("--- Content ---"));
    assert!(stdout.contains(&doc_id));

    let (stdout, _, success) = run_shelf(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:  3"));
    assert!(stdout.contains("markdown"));
}

#[test]
fn test_get_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_shelf(&config_path, &["init"]);

    let (_, stderr, success) = run_shelf(&config_path, &["get", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}
