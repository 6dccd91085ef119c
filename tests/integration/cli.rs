//! Tests for the `bundlesmith` binary

use super::common::{bundlesmith_command, hash, Harness};
use assert_cmd::Command;
use bundlesmith::{EntryKind, Manifest, ManifestEntry};
use bundlesmith_core::manifest;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn sample_manifest() -> String {
    let mut m = Manifest::new(30, 20, 10, 1_700_000_000);
    m.insert(ManifestEntry::new("/usr/bin/tool", EntryKind::File, hash('a'), 20));
    m.insert(ManifestEntry::new("/usr/bin", EntryKind::Directory, hash('b'), 10));
    manifest::serialize(&m)
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("bundlesmith")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_check_valid_manifest() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("Manifest.editors");
    fs::write(&path, sample_manifest()).unwrap();

    Command::cargo_bin("bundlesmith")
        .unwrap()
        .args(["check", "--strict"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("version 20, 2 entries"));
}

#[test]
fn test_check_reports_non_canonical_order() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("Manifest.editors");
    // Swap the two entry lines
    let canonical = sample_manifest();
    let mut lines: Vec<&str> = canonical.lines().collect();
    let n = lines.len();
    lines.swap(n - 1, n - 2);
    fs::write(&path, lines.join("\n") + "\n").unwrap();

    Command::cargo_bin("bundlesmith")
        .unwrap()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("not in canonical form"));

    Command::cargo_bin("bundlesmith")
        .unwrap()
        .args(["check", "--strict"])
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn test_check_missing_file_section() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("Manifest.broken");
    fs::write(&path, "MANIFEST\t30\nversion:\t10\nprevious:\t0\n").unwrap();

    let output = bundlesmith_command().arg("check").arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing file section"));
}

#[test]
fn test_build_with_missing_config() {
    let temp = TempDir::new().unwrap();

    let output = bundlesmith_command()
        .arg("build")
        .arg(temp.path().join("state"))
        .arg(temp.path().join("chroot"))
        .arg(temp.path().join("missing.toml"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration error"));
}

#[test]
fn test_build_with_self_including_bundle() {
    let harness = Harness::new();
    let config = harness.temp.path().join("bundle.toml");
    fs::write(&config, harness.config_text(&["editors"])).unwrap();

    Command::cargo_bin("bundlesmith")
        .unwrap()
        .arg("build")
        .arg(&harness.statedir)
        .arg(&harness.chroot)
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot include itself"));
}
