//! Exclude sets for the symlink forest.
//!
//! Some subtrees must never appear in the merged workspace: the second build
//! system's own output directories, our output directory when it lives in the
//! tree, directories with symlink loops, and checked-in BUILD files that would
//! clash with generated ones unless a directory explicitly keeps them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::consts::BAZEL_LIST_FILE;
use crate::util::files::join_path;

#[derive(Debug, Error)]
pub enum AllowlistError {
  #[error("failed to read allowlist '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed allowlist '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Directories whose checked-in BUILD files survive into the workspace.
///
/// Loaded from a JSON object mapping a directory to a `recursive` flag:
///
/// ```json
/// { "build/bazel": true, "external/zlib": false }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct KeepBuildFileAllowlist {
  dirs: BTreeMap<String, bool>,
}

impl KeepBuildFileAllowlist {
  pub fn new(dirs: BTreeMap<String, bool>) -> Self {
    Self { dirs }
  }

  pub fn load(path: &Path) -> Result<Self, AllowlistError> {
    let data = fs::read(path).map_err(|source| AllowlistError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_slice(&data).map_err(|source| AllowlistError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Whether the BUILD file in `dir` is kept: `dir` is listed, or an ancestor
  /// is listed as recursive.
  pub fn should_keep_existing_build_file_for_dir(&self, dir: &str) -> bool {
    if self.dirs.contains_key(dir) {
      return true;
    }
    let mut current = dir;
    while let Some(pos) = current.rfind('/') {
      current = &current[..pos];
      if self.dirs.get(current).copied().unwrap_or(false) {
        return true;
      }
    }
    false
  }
}

/// Output directories of the second build system, plus its convenience link
/// named after the workspace.
pub fn bazel_artifacts(top_dir: &Path) -> Vec<String> {
  let base = dunce::canonicalize(top_dir)
    .ok()
    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    .or_else(|| top_dir.file_name().map(|n| n.to_string_lossy().into_owned()))
    .unwrap_or_default();

  vec![
    "bazel-bin".to_string(),
    "bazel-genfiles".to_string(),
    "bazel-out".to_string(),
    "bazel-testlogs".to_string(),
    format!("bazel-{}", base),
  ]
}

/// Subtrees known to break the second build system: symlinks pointing back
/// into the tree and packages with unfixable naming problems.
pub fn temporary_excludes() -> Vec<String> {
  [
    "external/autotest/venv/autotest_lib",
    "external/autotest/autotest_lib",
    "external/autotest/client/autotest_lib/client",
    "external/google-fruit/extras/bazel_root/third_party/fruit",
    "frameworks/compile/slang",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

/// Read the finder's list of Bazel-related files sitting next to the module
/// list file. Relative locations are resolved against `top_dir`.
pub fn read_bazel_list(module_list_file: &Path, top_dir: &Path) -> io::Result<Vec<String>> {
  let list = module_list_file
    .parent()
    .map(|dir| dir.join(BAZEL_LIST_FILE))
    .unwrap_or_else(|| PathBuf::from(BAZEL_LIST_FILE));
  let data = fs::read_to_string(join_path(top_dir, &list))?;
  Ok(
    data
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(String::from)
      .collect(),
  )
}

/// Checked-in `BUILD`/`BUILD.bazel` files the allowlist does not keep.
///
/// Entries that cannot be stat'ed are skipped with a warning; directories are
/// never ignored.
pub fn ignored_build_files(
  allowlist: &KeepBuildFileAllowlist,
  top_dir: &Path,
  files: &[String],
  verbose: bool,
) -> Vec<String> {
  let mut ignored = Vec::new();

  for rel in files {
    let full = top_dir.join(rel);
    let meta = match fs::metadata(&full) {
      Ok(meta) => meta,
      Err(e) => {
        warn!(path = %full.display(), error = %e, "cannot access Bazel-related file");
        continue;
      }
    };
    if meta.is_dir() {
      continue;
    }

    let path = Path::new(rel);
    let is_build_file = path
      .file_name()
      .is_some_and(|name| name == "BUILD" || name == "BUILD.bazel");
    if !is_build_file {
      continue;
    }

    let dir = path.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
    let dir = if dir.is_empty() { ".".to_string() } else { dir };
    if allowlist.should_keep_existing_build_file_for_dir(&dir) {
      continue;
    }

    if verbose {
      info!(path = %rel, "ignoring existing BUILD file");
    }
    ignored.push(rel.clone());
  }

  ignored
}

/// For API export every checked-in Bazel file is excluded except the root
/// workspace files and the support trees the export itself loads.
pub fn api_build_file_excludes(files: &[String]) -> Vec<String> {
  files
    .iter()
    .filter(|src| {
      !matches!(src.as_str(), "WORKSPACE" | "BUILD" | "BUILD.bazel")
        && !src.starts_with("build/bazel")
        && !src.starts_with("prebuilts/clang")
    })
    .cloned()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn allowlist_exact_and_recursive() {
    let allowlist = KeepBuildFileAllowlist::new(BTreeMap::from([
      ("build/bazel".to_string(), true),
      ("external/zlib".to_string(), false),
    ]));

    assert!(allowlist.should_keep_existing_build_file_for_dir("build/bazel"));
    assert!(allowlist.should_keep_existing_build_file_for_dir("build/bazel/rules/cc"));
    assert!(allowlist.should_keep_existing_build_file_for_dir("external/zlib"));
    assert!(!allowlist.should_keep_existing_build_file_for_dir("external/zlib/contrib"));
    assert!(!allowlist.should_keep_existing_build_file_for_dir("frameworks/base"));
  }

  #[test]
  fn allowlist_loads_from_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("keep.json");
    fs::write(&path, r#"{"a/b": true}"#).unwrap();

    let allowlist = KeepBuildFileAllowlist::load(&path).unwrap();
    assert!(allowlist.should_keep_existing_build_file_for_dir("a/b/c"));
  }

  #[test]
  fn allowlist_rejects_malformed_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("keep.json");
    fs::write(&path, "[1, 2]").unwrap();

    assert!(matches!(
      KeepBuildFileAllowlist::load(&path),
      Err(AllowlistError::Parse { .. })
    ));
  }

  #[test]
  fn artifacts_include_workspace_link() {
    let temp = TempDir::new().unwrap();
    let top = temp.path().join("mytree");
    fs::create_dir_all(&top).unwrap();

    let artifacts = bazel_artifacts(&top);
    assert_eq!(artifacts.len(), 5);
    assert!(artifacts.contains(&"bazel-out".to_string()));
    assert!(artifacts.contains(&"bazel-mytree".to_string()));
  }

  #[test]
  fn bazel_list_is_read_next_to_module_list() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("out")).unwrap();
    fs::write(temp.path().join("out/bazel.list"), "a/BUILD\n\nb/BUILD.bazel\n").unwrap();

    let files = read_bazel_list(Path::new("out/modules.list"), temp.path()).unwrap();
    assert_eq!(files, strings(&["a/BUILD", "b/BUILD.bazel"]));
  }

  #[test]
  #[traced_test]
  fn ignored_build_files_respects_allowlist() {
    let temp = TempDir::new().unwrap();
    for rel in ["BUILD", "keep/BUILD", "drop/BUILD.bazel", "drop/WORKSPACE.bzl"] {
      let path = temp.path().join(rel);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, "").unwrap();
    }
    fs::create_dir_all(temp.path().join("dir/BUILD")).unwrap();

    let allowlist = KeepBuildFileAllowlist::new(BTreeMap::from([("keep".to_string(), false)]));
    let files = strings(&[
      "BUILD",
      "keep/BUILD",
      "drop/BUILD.bazel",
      "drop/WORKSPACE.bzl",
      "dir/BUILD",
      "missing/BUILD",
    ]);

    let ignored = ignored_build_files(&allowlist, temp.path(), &files, true);

    assert_eq!(ignored, strings(&["BUILD", "drop/BUILD.bazel"]));
    assert!(logs_contain("cannot access Bazel-related file"));
    assert!(logs_contain("ignoring existing BUILD file"));
  }

  #[test]
  fn api_excludes_keep_root_and_support_trees() {
    let files = strings(&[
      "WORKSPACE",
      "BUILD",
      "build/bazel/rules/BUILD",
      "prebuilts/clang/host/BUILD",
      "frameworks/base/BUILD",
      "external/x/BUILD.bazel",
    ]);

    assert_eq!(
      api_build_file_excludes(&files),
      strings(&["frameworks/base/BUILD", "external/x/BUILD.bazel"])
    );
  }

  #[test]
  fn temporary_excludes_are_relative() {
    assert!(temporary_excludes().iter().all(|p| !p.starts_with('/')));
  }
}
