use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cbr_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cbr");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/cbr.sqlite"

[server]
bind = "127.0.0.1:7332"
secret = "test-secret"

[sync]
page_size = 10
"#,
        root.display()
    );

    let config_path = config_dir.join("cbr.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cbr(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cbr_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cbr binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// A saved-event payload for one published post.
fn saved_event(id: i64, title: &str, body_html: &str) -> String {
    format!(
        r#"{{"event":"saved","item":{{"id":{id},"type":"post","status":"publish","title":"{title}","url":"https://example.com/{id}","body_html":"{body_html}","updated_at":1700000000}}}}"#
    )
}

fn write_events(root: &Path, events: &[String]) -> PathBuf {
    let path = root.join("events.json");
    fs::write(&path, format!("[{}]", events.join(","))).unwrap();
    path
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cbr(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_cbr(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_cbr(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_status_unconfigured() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);

    let (stdout, stderr, success) = run_cbr(&config_path, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("NOT SET"));
    assert!(stdout.contains("NOT CREATED"));
    assert!(stdout.contains("mirrored items:  0"));
}

#[test]
fn test_credential_set_and_status() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_cbr(&config_path, &["credential", "set", "test-api-key-123"]);
    assert!(success, "credential set failed: {}", stderr);
    assert!(stdout.contains("saved"));

    let (stdout, _, _) = run_cbr(&config_path, &["status"]);
    assert!(stdout.contains("credential:      SET"));
    // The key itself never appears in output.
    assert!(!stdout.contains("test-api-key-123"));

    let (stdout, _, success) = run_cbr(&config_path, &["credential", "clear"]);
    assert!(success);
    assert!(stdout.contains("cleared"));

    let (stdout, _, _) = run_cbr(&config_path, &["status"]);
    assert!(stdout.contains("credential:      NOT SET"));
}

#[test]
fn test_types_set_and_list() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);

    let (stdout, _, success) = run_cbr(&config_path, &["types", "list"]);
    assert!(success);
    assert!(stdout.contains("No indexable types configured"));

    let (stdout, stderr, success) = run_cbr(&config_path, &["types", "set", "post", "page"]);
    assert!(success, "types set failed: {}", stderr);
    assert!(stdout.contains("post, page"));

    let (stdout, _, success) = run_cbr(&config_path, &["types", "list"]);
    assert!(success);
    assert!(stdout.contains("post"));
    assert!(stdout.contains("page"));
}

#[test]
fn test_model_list_and_set() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);

    let (stdout, _, success) = run_cbr(&config_path, &["model", "list"]);
    assert!(success);
    assert!(stdout.contains("gemini-2.5-flash"));
    // The first model is the default selection.
    assert!(stdout.contains("* gemini-2.5-flash"));

    let (stdout, stderr, success) = run_cbr(&config_path, &["model", "set", "gemini-2.5-pro"]);
    assert!(success, "model set failed: {}", stderr);
    assert!(stdout.contains("gemini-2.5-pro"));

    let (stdout, _, _) = run_cbr(&config_path, &["model", "list"]);
    assert!(stdout.contains("* gemini-2.5-pro"));

    let (_, stderr, success) = run_cbr(&config_path, &["model", "set", "not-a-model"]);
    assert!(!success);
    assert!(stderr.contains("unknown model"));
}

#[test]
fn test_ingest_populates_mirror_without_credential() {
    let (tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);
    run_cbr(&config_path, &["types", "set", "post"]);

    let events = write_events(
        tmp.path(),
        &[
            saved_event(1, "Rust widgets", "<p>All about widget assembly.</p>"),
            saved_event(2, "Deployment notes", "<p>Kubernetes deployment guide.</p>"),
        ],
    );

    // No API key configured: uploads fail silently, the mirror still fills.
    let (stdout, stderr, success) = run_cbr(&config_path, &["ingest", events.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("events: 2"));
    assert!(stdout.contains("mirrored items: 2"));
    assert!(stdout.contains("mapped documents: 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_deleted_event_removes_item() {
    let (tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);
    run_cbr(&config_path, &["types", "set", "post"]);

    let events = write_events(
        tmp.path(),
        &[
            saved_event(7, "Ephemeral", "<p>Soon gone.</p>"),
            r#"{"event":"deleted","id":7}"#.to_string(),
        ],
    );

    let (stdout, _, success) = run_cbr(&config_path, &["ingest", events.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("mirrored items: 0"));
}

#[test]
fn test_search_finds_mirrored_content() {
    let (tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);
    run_cbr(&config_path, &["types", "set", "post"]);

    let events = write_events(
        tmp.path(),
        &[
            saved_event(1, "Rust widgets", "<p>All about widget assembly.</p>"),
            saved_event(2, "Deployment notes", "<p>Kubernetes deployment guide.</p>"),
        ],
    );
    run_cbr(&config_path, &["ingest", events.to_str().unwrap()]);

    let (stdout, stderr, success) = run_cbr(&config_path, &["search", "widget"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("Rust widgets"));
    assert!(stdout.contains("https://example.com/1"));
    assert!(!stdout.contains("Deployment notes"));
}

#[test]
fn test_search_rejects_short_query() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);

    let (_, stderr, success) = run_cbr(&config_path, &["search", "ab"]);
    assert!(!success);
    assert!(stderr.contains("3"), "expected length bound in: {}", stderr);
}

#[test]
fn test_search_no_matches_is_not_an_error() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);
    run_cbr(&config_path, &["types", "set", "post"]);

    let (stdout, stderr, success) = run_cbr(&config_path, &["search", "nonexistent"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_token_is_stable_per_action() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);

    let (search1, _, success) = run_cbr(&config_path, &["token", "search"]);
    assert!(success);
    let (search2, _, _) = run_cbr(&config_path, &["token", "search"]);
    let (chat, _, _) = run_cbr(&config_path, &["token", "chat"]);

    // Same secret + action: stable. Different action: different token.
    assert_eq!(search1, search2);
    assert_ne!(search1, chat);
    assert_eq!(search1.trim().len(), 64); // hex sha256

    let (_, stderr, success) = run_cbr(&config_path, &["token", "nope"]);
    assert!(!success);
    assert!(stderr.contains("unknown action"));
}

#[test]
fn test_backfill_requires_indexable_types() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);

    let (_, stderr, success) = run_cbr(&config_path, &["backfill"]);
    assert!(!success);
    assert!(
        stderr.contains("indexable"),
        "expected type-configuration error, got: {}",
        stderr
    );
}

#[test]
fn test_store_create_requires_credential() {
    let (_tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);

    let (_, stderr, success) = run_cbr(&config_path, &["store", "create"]);
    assert!(!success);
    assert!(stderr.contains("Configuration error"), "got: {}", stderr);
}

#[test]
fn test_purge_requires_confirmation() {
    let (tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);
    run_cbr(&config_path, &["types", "set", "post"]);

    let events = write_events(
        tmp.path(),
        &[saved_event(1, "Kept", "<p>Body text here.</p>")],
    );
    run_cbr(&config_path, &["ingest", events.to_str().unwrap()]);

    let (_, stderr, success) = run_cbr(&config_path, &["purge"]);
    assert!(!success);
    assert!(stderr.contains("--yes"));

    let (stdout, _, success) = run_cbr(&config_path, &["purge", "--yes"]);
    assert!(success);
    assert!(stdout.contains("deleted"));

    let (stdout, _, _) = run_cbr(&config_path, &["status"]);
    assert!(stdout.contains("mirrored items:  0"));
    assert!(stdout.contains("indexable types: (none)"));
}

#[test]
fn test_resave_replaces_mirror_row() {
    let (tmp, config_path) = setup_test_env();
    run_cbr(&config_path, &["init"]);
    run_cbr(&config_path, &["types", "set", "post"]);

    let first = write_events(
        tmp.path(),
        &[saved_event(3, "Original title", "<p>First body.</p>")],
    );
    run_cbr(&config_path, &["ingest", first.to_str().unwrap()]);

    let second = write_events(
        tmp.path(),
        &[saved_event(3, "Revised title", "<p>Second body.</p>")],
    );
    run_cbr(&config_path, &["ingest", second.to_str().unwrap()]);

    let (stdout, _, _) = run_cbr(&config_path, &["status"]);
    assert!(stdout.contains("mirrored items:  1"));

    let (stdout, _, success) = run_cbr(&config_path, &["search", "Revised"]);
    assert!(success);
    assert!(stdout.contains("Revised title"));

    let (stdout, _, _) = run_cbr(&config_path, &["search", "Original"]);
    assert!(!stdout.contains("Original title"));
}
