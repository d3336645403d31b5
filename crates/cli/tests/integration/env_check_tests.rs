//! Env-check command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn fresh_snapshot_is_up_to_date() {
  let env = TestEnv::with_modules(&[("ALLOW_MISSING_DEPENDENCIES", "false")]);
  env.build_cmd().assert().success();

  env
    .env_check_cmd()
    .arg("--available-env")
    .arg(env.path("available.env"))
    .assert()
    .success()
    .stdout(predicate::str::contains("up to date"));

  assert!(env.path("out/gen/used.env").exists());
}

#[test]
fn changed_variable_removes_snapshot() {
  let env = TestEnv::with_modules(&[("ALLOW_MISSING_DEPENDENCIES", "false")]);
  env.build_cmd().assert().success();
  env.write_env("changed.env", &[("ALLOW_MISSING_DEPENDENCIES", "true")]);

  env
    .env_check_cmd()
    .arg("--available-env")
    .arg(env.path("changed.env"))
    .assert()
    .success()
    .stderr(predicate::str::contains("environment changed"));

  assert!(!env.path("out/gen/used.env").exists());
}

#[test]
fn unrelated_variable_is_ignored() {
  let env = TestEnv::with_modules(&[("ALLOW_MISSING_DEPENDENCIES", "false")]);
  env.build_cmd().assert().success();
  env.write_env(
    "changed.env",
    &[("ALLOW_MISSING_DEPENDENCIES", "false"), ("UNRELATED", "1")],
  );

  env
    .env_check_cmd()
    .arg("--available-env")
    .arg(env.path("changed.env"))
    .assert()
    .success()
    .stdout(predicate::str::contains("up to date"));
}

#[test]
fn missing_snapshot_is_reported() {
  let env = TestEnv::with_modules(&[]);

  env
    .env_check_cmd()
    .arg("--available-env")
    .arg(env.path("available.env"))
    .assert()
    .success()
    .stdout(predicate::str::contains("does not exist"));
}
