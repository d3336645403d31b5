//! Module declaration files.
//!
//! The module list file names one declaration file per line, relative to the
//! top directory. Each declaration file holds the modules of its directory:
//!
//! ```json
//! {
//!   "modules": [
//!     { "name": "libfoo", "kind": "cc_library", "srcs": ["src/*.c"], "deps": ["libbar"] },
//!     { "name": "gen_hdr", "kind": "genrule", "cmd": "cp $in $out", "srcs": ["h.in"], "outs": ["h.h"] }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::PipelineError;
use crate::util::files::join_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDecl {
  pub name: String,
  pub kind: String,
  #[serde(default)]
  pub srcs: Vec<String>,
  #[serde(default)]
  pub deps: Vec<String>,
  #[serde(default)]
  pub cmd: Option<String>,
  #[serde(default)]
  pub outs: Vec<String>,
  /// Part of the exported API surface.
  #[serde(default)]
  pub api: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclFile {
  #[serde(default)]
  pub modules: Vec<ModuleDecl>,
}

/// A parsed declaration file and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedDecl {
  /// Path as listed in the module list (relative to the top directory).
  pub path: PathBuf,
  /// Directory of the declaration file, relative to the top directory.
  pub dir: PathBuf,
  pub modules: Vec<ModuleDecl>,
}

/// Read the module list: one declaration file path per non-empty line.
pub fn read_module_list(top: &Path, list: &Path) -> Result<Vec<PathBuf>, PipelineError> {
  let data = fs::read_to_string(join_path(top, list)).map_err(|source| PipelineError::ModuleList {
    path: list.to_path_buf(),
    source,
  })?;
  Ok(
    data
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty() && !l.starts_with('#'))
      .map(PathBuf::from)
      .collect(),
  )
}

pub fn load_decl(top: &Path, path: &Path) -> Result<LoadedDecl, PipelineError> {
  let data = fs::read(join_path(top, path)).map_err(|source| PipelineError::ReadDecl {
    path: path.to_path_buf(),
    source,
  })?;
  let file: DeclFile = serde_json::from_slice(&data).map_err(|source| PipelineError::ParseDecl {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(LoadedDecl {
    path: path.to_path_buf(),
    dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
    modules: file.modules,
  })
}
