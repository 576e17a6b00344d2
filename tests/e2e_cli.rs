//! CLI end-to-end tests
//!
//! Tests for the shutterbox command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the shutterbox binary
#[allow(deprecated)]
fn shutterbox_cmd() -> Command {
    Command::cargo_bin("shutterbox").unwrap()
}

/// Write a config with one empty root and a database inside `dir`.
///
/// No image files exist, so the metadata tool is never started and any
/// executable name will do.
fn library(dir: &TempDir) -> PathBuf {
    let root = dir.path().join("photos");
    fs::create_dir_all(&root).unwrap();
    write_config(
        dir.path(),
        &format!(
            r#"
[database]
path = "{db}"

[filesystem.roots.photos]
root = "{root}"

[sync.exiftool]
path = "exiftool"
"#,
            db = dir.path().join("library.db").display(),
            root = root.display(),
        ),
    )
}

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("shutterbox.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = shutterbox_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_lists_commands() {
    let mut cmd = shutterbox_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("runs"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = shutterbox_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shutterbox"));
}

#[test]
fn test_cli_validate_valid_config() {
    let dir = tempdir().unwrap();
    let config = library(&dir);

    let mut cmd = shutterbox_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Roots: 1"));
}

#[test]
fn test_cli_validate_rejects_unknown_scope_root() {
    let dir = tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[[sync.paths]]
root = "missing"
[sync.paths.filters]
op = "all"
rules = [{ type = "extension", mode = "any", extensions = ["jpg"] }]
"#,
    );

    let mut cmd = shutterbox_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown root 'missing'"));
}

#[test]
fn test_cli_sync_requires_roots() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "[render]\nworkers = 1\n");

    let mut cmd = shutterbox_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No filesystem roots configured"));
}

#[test]
fn test_cli_sync_then_runs() {
    let dir = tempdir().unwrap();
    let config = library(&dir);

    let mut cmd = shutterbox_cmd();
    cmd.arg("-c")
        .arg(&config)
        .args(["sync", "--cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(full)"))
        .stdout(predicate::str::contains("Seen:        0"));

    let mut cmd = shutterbox_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("full"))
        .stdout(predicate::str::contains("finished"));
}

#[test]
fn test_cli_runs_empty_database() {
    let dir = tempdir().unwrap();
    let config = library(&dir);

    let mut cmd = shutterbox_cmd();
    cmd.arg("-c")
        .arg(&config)
        .args(["runs", "--limit", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sync runs recorded"));
}

#[test]
fn test_cli_render_unknown_image() {
    let dir = tempdir().unwrap();
    let config = library(&dir);
    let mut body = fs::read_to_string(&config).unwrap();
    body.push_str("\n[[derivatives]]\nname = \"thumb\"\nmax_width = 200\n");
    fs::write(&config, body).unwrap();

    let mut cmd = shutterbox_cmd();
    cmd.arg("-c")
        .arg(&config)
        .args(["render", "--image", "67e55044-10b1-426f-9247-bb680e5fe0c8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Image not found"));
}

#[test]
fn test_cli_render_invalid_id() {
    let dir = tempdir().unwrap();
    let config = library(&dir);
    let mut body = fs::read_to_string(&config).unwrap();
    body.push_str("\n[[derivatives]]\nname = \"thumb\"\nmax_width = 200\n");
    fs::write(&config, body).unwrap();

    let mut cmd = shutterbox_cmd();
    cmd.arg("-c")
        .arg(&config)
        .args(["render", "--image", "not-a-uuid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid image id"));
}
