//! Source globs and their dependency files.
//!
//! A glob's result depends on the listing of its directory, not on any single
//! file, so it cannot be expressed as a plain file dependency. Each evaluated
//! glob gets a list file holding its matches; the list file is rewritten only
//! when the matches change and is what the depfile names. The glob manifest
//! records pattern, listed directories and list file so a scheduler can
//! re-evaluate globs cheaply before deciding to rerun us.

use std::path::{Path, PathBuf};

use ::glob::{MatchOptions, Pattern, PatternError};
use serde::Serialize;
use tracing::debug;

use super::PipelineError;
use crate::config::Config;
use crate::consts::GLOB_HASH_PREFIX_LEN;
use crate::util::files::write_if_changed;
use crate::util::hash::hash_prefix;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: true,
  require_literal_leading_dot: true,
};

/// One evaluated glob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobResult {
  /// Pattern relative to the top directory, e.g. `a/src/*.c`.
  pub pattern: String,
  /// Directories whose listing decided the matches, relative to the top
  /// directory. The top directory itself is `.`.
  pub dirs: Vec<PathBuf>,
  /// Matching paths relative to the top directory, sorted.
  pub matches: Vec<PathBuf>,
}

pub fn is_glob(pattern: &str) -> bool {
  pattern.contains(['*', '?', '['])
}

/// Expand `pattern` under `top`, returning sorted paths relative to `top`.
fn expand(top: &Path, pattern: &str) -> Result<Vec<PathBuf>, GlobEvalError> {
  let full = format!("{}/{}", Pattern::escape(&top.to_string_lossy()), pattern);
  let mut found = Vec::new();
  for entry in ::glob::glob_with(&full, MATCH_OPTIONS).map_err(GlobEvalError::Pattern)? {
    let path = entry.map_err(|e| GlobEvalError::Read {
      path: e.path().to_path_buf(),
      source: e.into_error(),
    })?;
    if let Ok(rel) = path.strip_prefix(top) {
      found.push(rel.to_path_buf());
    }
  }
  found.sort();
  Ok(found)
}

/// Directories read while matching `pattern`: for every wildcard component,
/// each directory matching the components before it.
fn listed_dirs(top: &Path, pattern: &str) -> Result<Vec<PathBuf>, GlobEvalError> {
  let components: Vec<&str> = pattern.split('/').collect();
  let mut dirs: Vec<PathBuf> = Vec::new();

  for (i, component) in components.iter().enumerate() {
    if !is_glob(component) {
      continue;
    }
    let prefix = components[..i].join("/");
    let candidates = if prefix.is_empty() {
      vec![PathBuf::from(".")]
    } else if is_glob(&prefix) {
      expand(top, &prefix)?.into_iter().filter(|d| top.join(d).is_dir()).collect()
    } else {
      vec![PathBuf::from(prefix)]
    };
    for dir in candidates {
      if !dirs.contains(&dir) {
        dirs.push(dir);
      }
    }
  }
  Ok(dirs)
}

#[derive(Debug)]
enum GlobEvalError {
  Pattern(PatternError),
  Read { path: PathBuf, source: std::io::Error },
}

/// Evaluate `pattern` (relative to the top directory) for `module`. A missing
/// directory yields no matches.
pub fn evaluate(top: &Path, module: &str, pattern: &str) -> Result<GlobResult, PipelineError> {
  let to_pipeline = |err: GlobEvalError| match err {
    GlobEvalError::Pattern(source) => PipelineError::InvalidGlob {
      module: module.to_string(),
      pattern: pattern.to_string(),
      source,
    },
    GlobEvalError::Read { path, source } => PipelineError::Glob { path, source },
  };
  Pattern::new(pattern).map_err(|e| to_pipeline(GlobEvalError::Pattern(e)))?;

  let matches = expand(top, pattern).map_err(to_pipeline)?;
  let dirs = listed_dirs(top, pattern).map_err(to_pipeline)?;

  Ok(GlobResult {
    pattern: pattern.to_string(),
    dirs,
    matches,
  })
}

#[derive(Debug, Serialize)]
struct GlobManifestEntry<'a> {
  pattern: &'a str,
  dirs: &'a [PathBuf],
  list_file: PathBuf,
}

/// Write one list file per glob plus the glob manifest.
///
/// Returns the list files followed by the listed directories; both belong in
/// the depfile of the run.
pub fn write_glob_files(config: &Config, globs: &[GlobResult]) -> Result<Vec<PathBuf>, PipelineError> {
  let list_dir = config.gen_out_dir().join(&config.options().glob_list_dir);
  let mut list_files = Vec::with_capacity(globs.len());
  let mut manifest = Vec::with_capacity(globs.len());
  let mut dirs: Vec<PathBuf> = Vec::new();

  for glob in globs {
    let list_file = list_dir.join(hash_prefix(glob.pattern.as_bytes(), GLOB_HASH_PREFIX_LEN));
    let mut contents = String::new();
    for m in &glob.matches {
      contents.push_str(&m.to_string_lossy());
      contents.push('\n');
    }

    let abs = config.abs(&list_file);
    let written = write_if_changed(&abs, contents.as_bytes()).map_err(|source| PipelineError::Write {
      path: abs.clone(),
      source,
    })?;
    debug!(pattern = %glob.pattern, matches = glob.matches.len(), written, "glob list file");

    manifest.push(GlobManifestEntry {
      pattern: &glob.pattern,
      dirs: &glob.dirs,
      list_file: list_file.clone(),
    });
    list_files.push(list_file);
    for dir in &glob.dirs {
      if !dirs.contains(dir) {
        dirs.push(dir.clone());
      }
    }
  }

  let manifest_path = config.abs(&config.gen_out_dir().join(&config.options().glob_file));
  let mut data = serde_json::to_vec_pretty(&manifest)?;
  data.push(b'\n');
  write_if_changed(&manifest_path, &data).map_err(|source| PipelineError::Write {
    path: manifest_path,
    source,
  })?;

  list_files.extend(dirs);
  Ok(list_files)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Options;
  use crate::env::EnvMap;
  use std::fs;
  use tempfile::TempDir;

  fn tree(files: &[&str]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for f in files {
      let path = temp.path().join(f);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, "").unwrap();
    }
    temp
  }

  #[test]
  fn detects_wildcards() {
    assert!(is_glob("src/*.c"));
    assert!(is_glob("a?c"));
    assert!(is_glob("src/[xy].c"));
    assert!(!is_glob("src/main.c"));
  }

  #[test]
  fn evaluate_lists_sorted_matches() {
    let temp = tree(&["a/src/b.c", "a/src/a.c", "a/src/x.h", "a/src/.hidden.c"]);

    let result = evaluate(temp.path(), "foo", "a/src/*.c").unwrap();

    assert_eq!(result.dirs, vec![PathBuf::from("a/src")]);
    assert_eq!(result.matches, vec![PathBuf::from("a/src/a.c"), PathBuf::from("a/src/b.c")]);
  }

  #[test]
  fn evaluate_supports_character_classes() {
    let temp = tree(&["src/x.c", "src/y.c", "src/z.c"]);

    let result = evaluate(temp.path(), "foo", "src/[xy].c").unwrap();

    assert_eq!(result.matches, vec![PathBuf::from("src/x.c"), PathBuf::from("src/y.c")]);
  }

  #[test]
  fn evaluate_records_every_listed_directory() {
    let temp = tree(&["lib/one/x.c", "lib/two/y.h"]);

    let result = evaluate(temp.path(), "foo", "lib/*/*.c").unwrap();

    assert_eq!(result.matches, vec![PathBuf::from("lib/one/x.c")]);
    assert_eq!(
      result.dirs,
      vec![PathBuf::from("lib"), PathBuf::from("lib/one"), PathBuf::from("lib/two")]
    );
  }

  #[test]
  fn evaluate_top_level_pattern_lists_top() {
    let temp = tree(&["x.c"]);
    let result = evaluate(temp.path(), "foo", "*.c").unwrap();
    assert_eq!(result.dirs, vec![PathBuf::from(".")]);
    assert_eq!(result.matches, vec![PathBuf::from("x.c")]);
  }

  #[test]
  fn evaluate_missing_directory_matches_nothing() {
    let temp = TempDir::new().unwrap();
    let result = evaluate(temp.path(), "foo", "nope/*.c").unwrap();
    assert!(result.matches.is_empty());
    assert_eq!(result.dirs, vec![PathBuf::from("nope")]);
  }

  #[test]
  fn evaluate_rejects_malformed_pattern() {
    let temp = TempDir::new().unwrap();
    let err = evaluate(temp.path(), "foo", "src/[x.c").unwrap_err();
    assert!(matches!(err, PipelineError::InvalidGlob { ref module, .. } if module == "foo"));
  }

  #[test]
  fn glob_files_are_stable() {
    let temp = TempDir::new().unwrap();
    let config = Config::with_env(
      Options {
        top_dir: temp.path().to_path_buf(),
        ..Default::default()
      },
      EnvMap::new(),
    )
    .unwrap();
    let globs = vec![GlobResult {
      pattern: "a/*.c".into(),
      dirs: vec!["a".into()],
      matches: vec!["a/x.c".into()],
    }];

    let first = write_glob_files(&config, &globs).unwrap();
    let second = write_glob_files(&config, &globs).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert!(first[0].starts_with("out/gen/globs"));
    assert_eq!(first[1], PathBuf::from("a"));
    assert_eq!(fs::read_to_string(config.abs(&first[0])).unwrap(), "a/x.c\n");
    assert!(config.abs(Path::new("out/gen/build-globs.json")).exists());
  }
}
