//! Build command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn normal_build_writes_ninja_and_depfile() {
  let env = TestEnv::with_modules(&[]);

  env
    .build_cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("build.ninja (normal)"));

  assert!(env.read_file("build.ninja").starts_with("# Generated by weft"));
  let depfile = env.read_file("build.ninja.d");
  assert!(depfile.starts_with("build.ninja:"));
  assert!(depfile.contains("modules.list"));
  assert!(depfile.contains("a/mod.json"));
  assert!(env.path("out/gen/used.env").exists());
}

#[test]
fn module_graph_build_writes_json() {
  let env = TestEnv::with_modules(&[]);

  env
    .build_cmd()
    .arg("--module-graph-file")
    .arg("out/graph.json")
    .arg("--module-actions-file")
    .arg("out/actions.json")
    .assert()
    .success()
    .stdout(predicate::str::contains("(module-graph)"));

  let graph = env.read_file("out/graph.json");
  assert!(graph.contains("\"foo\""));
  assert!(graph.contains("\"bar\""));
  assert!(env.path("out/actions.json").exists());
  assert!(env.read_file("out/graph.json.d").starts_with("out/graph.json:"));
}

#[test]
fn module_graph_without_actions_file_fails() {
  let env = TestEnv::with_modules(&[]);

  env
    .build_cmd()
    .arg("--module-graph-file")
    .arg("out/graph.json")
    .assert()
    .failure()
    .stderr(predicate::str::contains("error:"));
}

#[test]
fn unknown_dependency_fails_without_depfile() {
  let env = TestEnv::with_modules(&[]);
  env.write_file(
    "b/mod.json",
    r#"{"modules": [{"name": "bar", "kind": "cc_binary", "deps": ["nope"]}]}"#,
  );

  env
    .build_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("nope"));

  assert!(!env.path("build.ninja.d").exists());
}

#[test]
fn missing_dependencies_allowed_by_environment() {
  let env = TestEnv::with_modules(&[("ALLOW_MISSING_DEPENDENCIES", "true")]);
  env.write_file(
    "b/mod.json",
    r#"{"modules": [{"name": "bar", "kind": "cc_binary", "deps": ["nope"]}]}"#,
  );

  env.build_cmd().assert().success();

  assert!(env.read_file("out/gen/used.env").contains("ALLOW_MISSING_DEPENDENCIES"));
}

#[test]
fn docs_build_writes_markdown() {
  let env = TestEnv::with_modules(&[]);

  env.build_cmd().arg("--docs").arg("out/docs.md").assert().success();

  let docs = env.read_file("out/docs.md");
  assert!(docs.contains("## cc_library"));
  assert!(docs.contains("`foo`"));
}

#[cfg(unix)]
#[test]
fn mixed_build_runs_partitioner() {
  let env = TestEnv::with_modules(&[("BAZEL_DEPS_FILE", "out/bazel.deps")]);
  env.write_file("partition.sh", "mkdir -p out\nprintf 'x/BUILD.bazel\\n' > out/bazel.deps\n");

  env
    .build_cmd()
    .arg("--bazel-mode-dev")
    .arg("--partitioner-cmd")
    .arg("sh")
    .arg("partition.sh")
    .assert()
    .success()
    .stdout(predicate::str::contains("(bazel-dev)"));

  assert!(env.read_file("build.ninja.d").contains("x/BUILD.bazel"));
}

#[test]
fn mixed_build_without_partitioner_command_fails() {
  let env = TestEnv::with_modules(&[("BAZEL_DEPS_FILE", "out/bazel.deps")]);

  env
    .build_cmd()
    .arg("--bazel-mode")
    .assert()
    .failure()
    .stderr(predicate::str::contains("no partitioner command configured"));
}
