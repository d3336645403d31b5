//! The analysis pipeline seam.
//!
//! The orchestrator drives module analysis through [`AnalysisPipeline`] and
//! never looks inside it. [`DeclPipeline`] is the implementation shipped with
//! weft: it reads JSON module declarations, resolves dependencies and globs,
//! prepares build actions and writes a ninja file.

pub mod actions;
pub mod decl;
pub mod glob;
pub mod graph;
mod pipeline;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Config;
use crate::mixed::HookError;

pub use glob::GlobResult;
pub use graph::ModuleGraph;
pub use pipeline::DeclPipeline;

/// How far a pipeline run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBefore {
  /// Run every phase, including writing the ninja output.
  Nothing,
  /// Load and analyze modules, but do not prepare build actions.
  BuildActions,
  /// Prepare build actions, but do not write the ninja output.
  WriteOutput,
}

/// Which modules a run is analyzing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Purpose {
  #[default]
  Build,
  /// Conversion to BUILD files.
  Conversion,
  /// Public API export only; modules not marked `api` are dropped.
  ApiExport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
  pub stop_before: StopBefore,
  pub purpose: Purpose,
}

/// Callback run once, immediately before build actions are finalized.
pub type BeforeBuildActions<'a> = &'a mut dyn FnMut() -> Result<(), HookError>;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("failed to read module list '{path}': {source}")]
  ModuleList {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read module declarations '{path}': {source}")]
  ReadDecl {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed module declarations '{path}': {source}")]
  ParseDecl {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("module '{name}' declared in both '{first}' and '{second}'")]
  DuplicateModule {
    name: String,
    first: PathBuf,
    second: PathBuf,
  },

  #[error("module '{0}' has a cmd but declares no outs")]
  NoOutputs(String),

  #[error("module '{module}' depends on undefined module '{dep}'")]
  UnknownDependency { module: String, dep: String },

  #[error("dependency cycle involving module '{0}'")]
  Cycle(String),

  #[error("module '{module}': invalid glob '{pattern}': {source}")]
  InvalidGlob {
    module: String,
    pattern: String,
    #[source]
    source: ::glob::PatternError,
  },

  #[error("failed to glob '{path}': {source}")]
  Glob {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("before-build-actions hook failed: {0}")]
  Hook(#[from] HookError),

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize JSON output: {0}")]
  Json(#[from] serde_json::Error),

  #[error("failed to write output stream: {0}")]
  Io(#[from] io::Error),
}

/// The module analysis engine as seen by the orchestrator.
pub trait AnalysisPipeline {
  /// Run analysis up to `request.stop_before`.
  ///
  /// When `before_build_actions` is given it must be called exactly once,
  /// before build actions are finalized; runs that stop before build actions
  /// never call it. Returns every file read while loading modules.
  fn run(
    &mut self,
    request: RunRequest,
    config: &Config,
    before_build_actions: Option<BeforeBuildActions<'_>>,
  ) -> Result<Vec<PathBuf>, PipelineError>;

  /// Declaration files under `root` (relative to the top directory).
  fn list_module_paths(&self, config: &Config, root: &Path) -> Result<Vec<PathBuf>, PipelineError>;

  /// Emit the analyzed graph and the prepared build actions as JSON.
  fn write_json_graph_and_actions(&self, graph: &mut dyn Write, actions: &mut dyn Write) -> Result<(), PipelineError>;

  /// Write module documentation to `path`.
  fn write_docs(&self, path: &Path) -> Result<(), PipelineError>;

  /// Globs evaluated during the last run.
  fn globs(&self) -> &[GlobResult];

  /// The graph produced by the last run.
  fn graph(&self) -> &ModuleGraph;
}
