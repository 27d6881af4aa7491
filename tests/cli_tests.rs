//! CLI integration tests: run the actual binary against a workbook.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn mfops() -> Command {
    Command::cargo_bin("mfops").expect("mfops binary")
}

/// Write a config pointing at an xlsx workbook inside `dir`.
fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let config_path = dir.path().join("mfops.yaml");
    let workbook = dir.path().join("ops.xlsx");
    fs::write(
        &config_path,
        format!(
            "sheet:\n  backend: xlsx\n  xlsx_path: {}\n",
            workbook.display()
        ),
    )
    .unwrap();
    config_path
}

#[test]
fn help_lists_commands() {
    mfops()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MetaFlex Ops"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("archive"));
}

#[test]
fn version_prints() {
    mfops()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn add_list_update_archive_flow() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    mfops()
        .env("MFOPS_CONFIG", &config)
        .args([
            "add",
            "--person",
            "Megan Cole",
            "--task",
            "Draft campaign",
            "--project",
            "Marketing",
            "--transcript-id",
            "T1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Task added"));

    mfops()
        .env("MFOPS_CONFIG", &config)
        .args(["list", "--include-done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Draft campaign"))
        .stdout(predicate::str::contains("Megan Cole"));

    mfops()
        .env("MFOPS_CONFIG", &config)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sheet shape OK"));

    // Done via update: the row leaves the active sheet for the Archive tab.
    mfops()
        .env("MFOPS_CONFIG", &config)
        .args(["update", "T1", "--status", "Done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Task updated"));

    mfops()
        .env("MFOPS_CONFIG", &config)
        .args(["list", "--include-done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks"));
}

#[test]
fn update_unknown_transcript_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    mfops()
        .env("MFOPS_CONFIG", &config)
        .args([
            "add",
            "--person",
            "Alice",
            "--task",
            "Something",
            "--project",
            "General",
        ])
        .assert()
        .success();

    mfops()
        .env("MFOPS_CONFIG", &config)
        .args(["update", "NOPE", "--status", "Done"])
        .assert()
        .failure();
}

#[test]
fn add_requires_person() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    mfops()
        .env("MFOPS_CONFIG", &config)
        .args(["add", "--person", "  ", "--task", "x", "--project", "y"])
        .assert()
        .failure();
}
