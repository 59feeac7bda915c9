use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docqa"))
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    ).unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    ).unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    ).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/docqa.sqlite"

[chunking]
max_chunk_size = 400
overlap_size = 40

[embedding]
provider = "hash"
dims = 128

[generation]
provider = "extractive"
"#,
        root.display()
    );

    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, files_dir)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn ingest_files(config_path: &Path, files_dir: &Path) -> String {
    let (stdout, stderr, success) = run_docqa(config_path, &["ingest", files_dir.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    stdout
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/docqa.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, success1) = run_docqa(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_docqa(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_directory() {
    let (_tmp, config_path, files_dir) = setup_test_env();

    let stdout = ingest_files(&config_path, &files_dir);
    assert!(stdout.contains("accepted: 3"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));

    let (list, _, success) = run_docqa(&config_path, &["list"]);
    assert!(success);
    for id in ["alpha.md", "beta.md", "gamma.txt"] {
        assert!(list.contains(id), "missing {} in {}", id, list);
    }
    assert!(list.contains("Alpha Document"));
}

#[test]
fn test_reingest_unchanged_is_noop() {
    let (_tmp, config_path, files_dir) = setup_test_env();

    ingest_files(&config_path, &files_dir);
    let stdout = ingest_files(&config_path, &files_dir);
    assert!(stdout.contains("unchanged: 3"), "stdout={}", stdout);
    assert!(stdout.contains("accepted: 0"));
}

#[test]
fn test_ask_cites_ingested_document() {
    let (_tmp, config_path, files_dir) = setup_test_env();
    ingest_files(&config_path, &files_dir);

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["ask", "What does the alpha document say about cargo?"],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("[doc:alpha.md:0-"), "stdout={}", stdout);
    assert!(stdout.contains("--- Sources"));
}

#[test]
fn test_ask_json_output() {
    let (_tmp, config_path, files_dir) = setup_test_env();
    ingest_files(&config_path, &files_dir);

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["ask", "Which frameworks cover deep learning?", "--json"],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);

    let answer: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(answer["fallback"].is_null());
    let citations = answer["citations"].as_array().unwrap();
    assert!(!citations.is_empty());
    assert_eq!(citations[0]["document_id"], "beta.md");
}

#[test]
fn test_ask_without_documents_falls_back() {
    let (_tmp, config_path, _) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (stdout, stderr, success) = run_docqa(&config_path, &["ask", "Anything at all?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("I cannot answer"));
    assert!(stdout.contains("no_documents"));
}

#[test]
fn test_delete_removes_document() {
    let (_tmp, config_path, files_dir) = setup_test_env();
    ingest_files(&config_path, &files_dir);

    let (stdout, _, success) = run_docqa(&config_path, &["delete", "alpha.md"]);
    assert!(success);
    assert!(stdout.contains("deleted alpha.md"));

    let (list, _, _) = run_docqa(&config_path, &["list"]);
    assert!(!list.contains("alpha.md"));

    let (again, _, success) = run_docqa(&config_path, &["delete", "alpha.md"]);
    assert!(success);
    assert!(again.contains("not found"));
}

#[test]
fn test_status_summary_counts_indexed_documents() {
    let (_tmp, config_path, files_dir) = setup_test_env();
    ingest_files(&config_path, &files_dir);

    let (stdout, _, success) = run_docqa(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("documents: 3"), "stdout={}", stdout);
    assert!(stdout.contains("indexed:  3"));

    let (doc, _, success) = run_docqa(&config_path, &["status", "gamma.txt"]);
    assert!(success);
    assert!(doc.contains("status:       indexed"));
    assert!(doc.contains("content_type: text/plain"));
}

#[test]
fn test_single_file_with_explicit_id() {
    let (_tmp, config_path, files_dir) = setup_test_env();
    let file = files_dir.join("gamma.txt");

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--id", "ops-notes", "--title", "Ops"],
    );
    assert!(success, "stdout={}, stderr={}", stdout, stderr);

    let (list, _, _) = run_docqa(&config_path, &["list"]);
    assert!(list.contains("ops-notes"));
    assert!(list.contains("Ops"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_docqa(&tmp.path().join("nope.toml"), &["list"]);
    assert!(!success);
    assert!(stderr.contains("config"));
}
