//! CLI smoke tests for weft.
//!
//! These tests verify that the commands parse and fail cleanly on bad input.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn weft_cmd() -> Command {
  cargo_bin_cmd!("weft")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  weft_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  weft_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("weft"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "env-check"] {
    weft_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// Error Handling
// =============================================================================

#[test]
fn build_without_available_env_fails() {
  let temp = TempDir::new().unwrap();

  weft_cmd()
    .arg("build")
    .arg("--top")
    .arg(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("error:"))
    .stderr(predicate::str::contains("--available-env"));
}

#[test]
fn build_with_malformed_available_env_fails() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("env.json"), "not json").unwrap();

  weft_cmd()
    .arg("build")
    .arg("--top")
    .arg(temp.path())
    .arg("--available-env")
    .arg("env.json")
    .assert()
    .failure()
    .stderr(predicate::str::contains("malformed environment file"));
}

#[test]
fn env_check_requires_used_env() {
  weft_cmd().arg("env-check").assert().failure();
}
