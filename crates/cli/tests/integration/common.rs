//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Two declaration files: `foo` in `a` (with a glob) and `bar` in `b`
/// depending on it.
pub const MODULE_LIST: &str = "a/mod.json\nb/mod.json\n";
pub const A_DECL: &str = r#"{"modules": [{"name": "foo", "kind": "cc_library", "srcs": ["src/*.c"]}]}"#;
pub const B_DECL: &str = r#"{"modules": [{"name": "bar", "kind": "cc_binary", "deps": ["foo"]}]}"#;

/// Isolated source tree.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create a tree with the standard module fixture and an available
  /// environment of `vars`.
  pub fn with_modules(vars: &[(&str, &str)]) -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file("modules.list", MODULE_LIST);
    env.write_file("a/mod.json", A_DECL);
    env.write_file("b/mod.json", B_DECL);
    env.write_file("a/src/x.c", "int x;");
    env.write_env("available.env", vars);
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Write an environment file in the on-disk JSON form.
  pub fn write_env(&self, relative_path: &str, vars: &[(&str, &str)]) {
    let entries: Vec<String> = vars
      .iter()
      .map(|(k, v)| format!(r#"{{"key": "{}", "value": "{}"}}"#, k, v))
      .collect();
    self.write_file(relative_path, &format!("[{}]\n", entries.join(", ")));
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.path(relative_path))
      .unwrap_or_else(|e| panic!("Failed to read {}: {}", relative_path, e))
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.temp.path().join(relative_path)
  }

  /// Get a `weft build` command rooted at the temp directory.
  pub fn build_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("weft");
    cmd
      .arg("build")
      .arg("--top")
      .arg(self.temp.path())
      .arg("--available-env")
      .arg("available.env")
      .arg("--used-env")
      .arg("out/gen/used.env");
    cmd
  }

  /// Get a `weft env-check` command for the used environment file.
  pub fn env_check_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("weft");
    cmd.arg("env-check").arg("--used-env").arg(self.path("out/gen/used.env"));
    cmd
  }
}
