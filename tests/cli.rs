mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::FakeBackend;
use tempfile::TempDir;
use tokio::process::Command;

fn docsync_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docsync"))
}

/// Temp dir with a `files/` tree and a config pointing at `backend`.
fn setup_test_env(backend: &FakeBackend, sync_section: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("nested")).unwrap();
    fs::write(files_dir.join("alpha.md"), "# Alpha\n").unwrap();
    fs::write(files_dir.join("beta.pdf"), "%PDF-1.4 beta").unwrap();
    fs::write(files_dir.join("nested").join("gamma.txt"), "gamma").unwrap();
    fs::write(files_dir.join("skip.exe"), "binary").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let extra = format!(
        r#"{}

[sources.local]
root = "{}"
"#,
        sync_section,
        files_dir.display()
    );
    let config_path = config_dir.join("docsync.toml");
    fs::write(&config_path, backend.config_toml(&extra)).unwrap();

    (tmp, config_path)
}

async fn run_docsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .await
        .unwrap_or_else(|e| panic!("Failed to run docsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

const FILTER: &str = "[sync]\ninclude_ext = [\"md\", \"pdf\", \"txt\"]";

#[tokio::test]
async fn test_sources_lists_origins() {
    let backend = FakeBackend::start().await;
    let (_tmp, config_path) = setup_test_env(&backend, FILTER);

    let (stdout, stderr, success) = run_docsync(&config_path, &["sources"]).await;
    assert!(success, "sources failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ORIGIN"));
    let local = stdout.lines().find(|l| l.starts_with("local")).unwrap();
    assert!(local.contains("OK") && local.contains("true"));
    let sp = stdout.lines().find(|l| l.starts_with("sharepoint")).unwrap();
    assert!(sp.contains("NOT CONFIGURED"));
}

#[tokio::test]
async fn test_dry_run_json_changes_nothing() {
    let backend = FakeBackend::start().await;
    backend.seed("alpha.md");
    backend.seed("obsolete.pdf");
    let (_tmp, config_path) = setup_test_env(&backend, FILTER);

    let (stdout, stderr, success) = run_docsync(
        &config_path,
        &["sync", "local", "--dry-run", "--json", "--progress", "off"],
    )
    .await;
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["to_upload"], serde_json::json!(["beta.pdf", "gamma.txt"]));
    assert_eq!(report["to_delete"], serde_json::json!(["obsolete.pdf"]));
    assert_eq!(report["kept"], serde_json::json!(["alpha.md"]));
    assert_eq!(backend.mutations(), 0);
}

#[tokio::test]
async fn test_sync_then_resync_is_noop() {
    let backend = FakeBackend::start().await;
    backend.seed("obsolete.pdf");
    let (_tmp, config_path) = setup_test_env(&backend, FILTER);

    let (stdout, stderr, success) =
        run_docsync(&config_path, &["sync", "local", "--progress", "off"]).await;
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("to upload (3): alpha.md, beta.pdf, gamma.txt"));
    assert!(stdout.contains("uploaded: 3"));
    assert!(stdout.contains("deleted: 1"));
    assert!(stdout.trim_end().ends_with("ok"));
    assert_eq!(
        backend.attached_names(),
        vec!["alpha.md", "beta.pdf", "gamma.txt"]
    );

    let mutations = backend.mutations();
    let (stdout, _, success) =
        run_docsync(&config_path, &["sync", "local", "--progress", "off"]).await;
    assert!(success);
    assert!(stdout.contains("to upload (0): -"));
    assert!(stdout.contains("kept (3)"));
    assert_eq!(backend.mutations(), mutations);
}

#[tokio::test]
async fn test_keep_extra_flag() {
    let backend = FakeBackend::start().await;
    backend.seed("obsolete.pdf");
    let (_tmp, config_path) = setup_test_env(&backend, FILTER);

    let (stdout, stderr, success) = run_docsync(
        &config_path,
        &["sync", "local", "--keep-extra", "--progress", "off"],
    )
    .await;
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(!stdout.contains("to delete"));
    assert!(backend.attached_names().contains(&"obsolete.pdf".to_string()));
}

#[tokio::test]
async fn test_dedupe_removes_same_named_files() {
    let backend = FakeBackend::start().await;
    let kept = backend.seed("alpha.md");
    let extra = backend.seed("alpha.md");
    let (_tmp, config_path) = setup_test_env(&backend, FILTER);

    let (stdout, stderr, success) =
        run_docsync(&config_path, &["dedupe", "--progress", "off"]).await;
    assert!(success, "dedupe failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&format!("alpha.md: keep {}, remove {}", kept, extra)));
    assert!(backend.blob(&extra).is_none());
    assert!(backend.blob(&kept).is_some());
}

#[tokio::test]
async fn test_sharepoint_not_configured() {
    let backend = FakeBackend::start().await;
    let (_tmp, config_path) = setup_test_env(&backend, FILTER);

    let (_, stderr, success) = run_docsync(
        &config_path,
        &["sync", "sharepoint", "--progress", "off"],
    )
    .await;
    assert!(!success);
    assert!(stderr.contains("SharePoint source not configured"));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let backend = FakeBackend::start().await;
    let (_tmp, config_path) = setup_test_env(&backend, "[sync]\nbatch_size = 0");

    let (_, stderr, success) = run_docsync(&config_path, &["sources"]).await;
    assert!(!success);
    assert!(stderr.contains("batch_size"));
}

#[tokio::test]
async fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) =
        run_docsync(&tmp.path().join("absent.toml"), &["sources"]).await;
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[tokio::test]
async fn test_completions_need_no_config() {
    let tmp = TempDir::new().unwrap();
    let (stdout, _, success) =
        run_docsync(&tmp.path().join("absent.toml"), &["completions", "bash"]).await;
    assert!(success);
    assert!(stdout.contains("docsync"));
}
