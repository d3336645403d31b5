//! Build mode selection.
//!
//! A run does exactly one thing: emit a ninja graph, convert declarations to
//! BUILD files, dump the module graph, and so on. [`select_mode`] picks that
//! activity from the mode-selecting options. It is pure and total; when several
//! options are set the first one in priority order wins and the rest are
//! ignored without complaint.

use std::fmt;

use serde::Serialize;

use crate::analysis::StopBefore;

/// The activity a single run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
  /// Full analysis, ninja output, no external scheduler involvement.
  Normal,
  /// Convert declarations to BUILD files and plant the merged workspace.
  Bp2Build,
  /// Repo-wide conversion for inspection.
  QueryView,
  /// Export the public API surface only.
  ApiBp2Build,
  /// Dump the analysis graph and actions as JSON.
  ModuleGraph,
  /// Dump module documentation.
  DocFile,
  /// Mixed build, large module allowlist.
  BazelDev,
  /// Mixed build, production allowlist.
  BazelProd,
  /// Mixed build, staging allowlist.
  BazelStaging,
}

impl BuildMode {
  /// Whether a subset of modules is delegated to the external work partitioner.
  pub fn is_mixed_build(self) -> bool {
    matches!(self, BuildMode::BazelDev | BuildMode::BazelProd | BuildMode::BazelStaging)
  }

  /// How far the analysis pipeline runs for this mode.
  pub fn stop_before(self) -> StopBefore {
    match self {
      BuildMode::ModuleGraph => StopBefore::WriteOutput,
      BuildMode::QueryView | BuildMode::DocFile | BuildMode::Bp2Build | BuildMode::ApiBp2Build => {
        StopBefore::BuildActions
      }
      BuildMode::Normal | BuildMode::BazelDev | BuildMode::BazelProd | BuildMode::BazelStaging => {
        StopBefore::Nothing
      }
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      BuildMode::Normal => "normal",
      BuildMode::Bp2Build => "bp2build",
      BuildMode::QueryView => "queryview",
      BuildMode::ApiBp2Build => "api-bp2build",
      BuildMode::ModuleGraph => "module-graph",
      BuildMode::DocFile => "doc-file",
      BuildMode::BazelDev => "bazel-dev",
      BuildMode::BazelProd => "bazel-prod",
      BuildMode::BazelStaging => "bazel-staging",
    }
  }
}

impl fmt::Display for BuildMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The mode-selecting options of a run. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeFlags {
  pub bp2build_marker: Option<String>,
  pub queryview_dir: Option<String>,
  pub api_bp2build_dir: Option<String>,
  pub module_graph_file: Option<String>,
  pub doc_file: Option<String>,
  pub bazel_mode_dev: bool,
  pub bazel_mode: bool,
  pub bazel_mode_staging: bool,
}

fn is_set(value: &Option<String>) -> bool {
  value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Pick the single mode for a run.
pub fn select_mode(flags: &ModeFlags) -> BuildMode {
  if is_set(&flags.bp2build_marker) {
    BuildMode::Bp2Build
  } else if is_set(&flags.queryview_dir) {
    BuildMode::QueryView
  } else if is_set(&flags.api_bp2build_dir) {
    BuildMode::ApiBp2Build
  } else if is_set(&flags.module_graph_file) {
    BuildMode::ModuleGraph
  } else if is_set(&flags.doc_file) {
    BuildMode::DocFile
  } else if flags.bazel_mode_dev {
    BuildMode::BazelDev
  } else if flags.bazel_mode {
    BuildMode::BazelProd
  } else if flags.bazel_mode_staging {
    BuildMode::BazelStaging
  } else {
    BuildMode::Normal
  }
}
