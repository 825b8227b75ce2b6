mod common;

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

fn write_config(dir: &TempDir, dsn: &str) -> PathBuf {
    let path = dir.path().join("mapping.json");
    let json = common::CONFIG_JSON.replace("sqlite::memory:", dsn);
    std::fs::write(&path, json).expect("write config");
    path
}

fn prepare_db(path: &Path) {
    let conn = rusqlite::Connection::open(path).expect("db");
    conn.execute_batch(common::SCHEMA).expect("schema");
    conn.execute_batch(
        "INSERT INTO projects (name, status_id) VALUES ('Alpha', 1), ('Beta', 2);",
    )
    .expect("rows");
}

fn entitymap() -> Command {
    Command::new(env!("CARGO_BIN_EXE_entitymap"))
}

#[test]
fn test_cli_help() {
    let output = entitymap().arg("--help").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert!(stdout.contains("Usage: entitymap"));
}

#[test]
fn test_cli_requires_config() {
    entitymap().args(["--command", "entities"]).assert().code(2);
}

#[test]
fn test_cli_rejects_unknown_flag() {
    entitymap().arg("--verbose").assert().code(2);
}

#[test]
fn test_cli_lists_entities() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(&dir, "sqlite::memory:");
    let output = entitymap()
        .args(["--config", config.to_str().expect("path"), "entities"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert!(stdout.contains("Bug -> bugs (4 properties, 1 associations)"));
    assert!(stdout.contains("Project -> projects (3 properties, 2 associations)"));
}

#[test]
fn test_cli_translates_placeholders() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(&dir, "sqlite::memory:");
    let output = entitymap()
        .args([
            "--config",
            config.to_str().expect("path"),
            "--command",
            "translate",
            "--input",
            "SELECT {p.Name} FROM {Project p}",
        ])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).expect("utf8").trim(),
        "SELECT p.name FROM projects p"
    );
}

#[test]
fn test_cli_counts_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("tracker.db");
    prepare_db(&db);
    let config = write_config(&dir, db.to_str().expect("path"));
    let output = entitymap()
        .args([
            "--config",
            config.to_str().expect("path"),
            "--command",
            "count",
            "--input",
            "Project",
        ])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).expect("utf8").trim(),
        "Project=2"
    );
}

#[test]
fn test_cli_unknown_command_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(&dir, "sqlite::memory:");
    entitymap()
        .args(["--config", config.to_str().expect("path"), "--command", "migrate"])
        .assert()
        .code(1);
}

#[test]
fn test_cli_translate_without_input_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(&dir, "sqlite::memory:");
    entitymap()
        .args(["--config", config.to_str().expect("path"), "translate"])
        .assert()
        .code(1);
}
