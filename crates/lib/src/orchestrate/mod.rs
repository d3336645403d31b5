//! The run orchestrator.
//!
//! A run performs the activity of its [`BuildMode`], then records what that
//! activity depended on:
//!
//! 1. Drive the analysis pipeline as far as the mode needs, with the
//!    mixed-build hook attached in mixed modes.
//! 2. Perform the mode's terminal action (write BUILD files and plant the
//!    workspace, dump the graph, write docs, or nothing when the pipeline
//!    already wrote the ninja file).
//! 3. Flush the accumulated dependencies into the depfile of the final output.
//! 4. Rewrite the used-environment snapshot if it changed, touching the final
//!    output so it is never older than the snapshot.

mod state;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::glob::write_glob_files;
use crate::analysis::{AnalysisPipeline, PipelineError, Purpose, RunRequest, StopBefore};
use crate::codegen::{BuildFileGenerator, CodegenError, CodegenMode};
use crate::config::Config;
use crate::consts::{MARKER_SUFFIX, env_vars};
use crate::depfile::{DepAccumulator, DepfileError};
use crate::env::{self, EnvError};
use crate::forest::excludes::{
  api_build_file_excludes, bazel_artifacts, ignored_build_files, read_bazel_list, temporary_excludes,
};
use crate::forest::{self, ForestError};
use crate::mixed::{HookError, MixedBuildHook};
use crate::mode::BuildMode;
use crate::util::files::{touch, with_suffix};

pub use state::{Phase, RunState};

/// Directory names under gen-out.
const BP2BUILD_DIR: &str = "bp2build";
const WORKSPACE_DIR: &str = "workspace";
const API_BP2BUILD_DIR: &str = "api_bp2build";

#[derive(Debug, Error)]
pub enum RunError {
  #[error("analysis error: {0}")]
  Pipeline(#[from] PipelineError),

  #[error("codegen error: {0}")]
  Codegen(#[from] CodegenError),

  #[error("symlink forest error: {0}")]
  Forest(#[from] ForestError),

  #[error("depfile error: {0}")]
  Depfile(#[from] DepfileError),

  #[error("environment error: {0}")]
  Env(#[from] EnvError),

  #[error("mixed-build hook error: {0}")]
  Hook(#[from] HookError),

  #[error("mixed build mode '{0}' requires a work partitioner")]
  NoPartitioner(BuildMode),

  #[error("analysis finished without running the mixed-build hook")]
  HookNotFired,

  #[error("failed to read Bazel file list '{path}': {source}")]
  BazelList {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid run transition from {from} to {to}")]
  InvalidTransition { from: Phase, to: Phase },
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
  pub mode: BuildMode,
  /// The output the depfile names, as given (relative to the top directory).
  pub final_output: PathBuf,
  pub depfile: PathBuf,
  /// Number of dependencies recorded in the depfile.
  pub dependencies: usize,
  /// Whether the used-environment snapshot was (re)written.
  pub env_rewritten: bool,
}

/// Perform one run in the mode selected by `config`.
///
/// `hook` is required in mixed-build modes and ignored otherwise.
pub fn run(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  codegen: &mut dyn BuildFileGenerator,
  hook: Option<&mut MixedBuildHook>,
) -> Result<RunOutcome, RunError> {
  let mut state = RunState::new();
  let mode = config.mode();
  state.advance(Phase::ModeSelected)?;
  info!(%mode, top = %config.top_dir().display(), "starting run");

  let mut deps = DepAccumulator::new();
  deps.push(config.product_variables_file());
  if let Some(used_env) = config.used_env_file() {
    deps.push(used_env);
  }

  let final_output = match mode {
    BuildMode::Bp2Build => run_bp2build(config, pipeline, codegen, &mut deps, &mut state)?,
    BuildMode::ApiBp2Build => run_api_bp2build(config, pipeline, codegen, &mut deps, &mut state)?,
    BuildMode::QueryView => run_queryview(config, pipeline, codegen, &mut deps, &mut state)?,
    BuildMode::ModuleGraph => run_module_graph(config, pipeline, &mut deps, &mut state)?,
    BuildMode::DocFile => run_doc_file(config, pipeline, &mut deps, &mut state)?,
    BuildMode::BazelDev | BuildMode::BazelProd | BuildMode::BazelStaging => {
      let hook = hook.ok_or(RunError::NoPartitioner(mode))?;
      run_mixed(config, pipeline, hook, &mut deps, &mut state)?
    }
    BuildMode::Normal => run_normal(config, pipeline, &mut deps, &mut state)?,
  };

  let dependencies = deps.len();
  let depfile = deps.flush(config.top_dir(), &final_output)?;
  state.advance(Phase::DependenciesFlushed)?;

  let env_rewritten = match config.used_env_file() {
    Some(used_env) => {
      let path = config.abs(used_env);
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RunError::Write {
          path: parent.to_path_buf(),
          source,
        })?;
      }
      env::flush_if_changed(&path, &config.env_deps(), &config.abs(&final_output))?.wrote()
    }
    None => false,
  };
  state.advance(Phase::EnvironmentChecked)?;

  state.advance(Phase::Done)?;
  info!(%mode, output = %final_output.display(), dependencies, env_rewritten, "run complete");
  Ok(RunOutcome {
    mode,
    final_output,
    depfile,
    dependencies,
    env_rewritten,
  })
}

fn analyze(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  purpose: Purpose,
  deps: &mut DepAccumulator,
  state: &mut RunState,
) -> Result<(), RunError> {
  state.advance(Phase::PipelineRunning)?;
  let request = RunRequest {
    stop_before: config.mode().stop_before(),
    purpose,
  };
  deps.append(pipeline.run(request, config, None)?);
  deps.append(write_glob_files(config, pipeline.globs())?);
  Ok(())
}

fn run_normal(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  deps: &mut DepAccumulator,
  state: &mut RunState,
) -> Result<PathBuf, RunError> {
  analyze(config, pipeline, Purpose::Build, deps, state)?;
  state.advance(Phase::TerminalActionRunning)?;
  Ok(config.output_file().to_path_buf())
}

fn run_mixed(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  hook: &mut MixedBuildHook,
  deps: &mut DepAccumulator,
  state: &mut RunState,
) -> Result<PathBuf, RunError> {
  state.advance(Phase::PipelineRunning)?;
  let request = RunRequest {
    stop_before: StopBefore::Nothing,
    purpose: Purpose::Build,
  };

  let mut partitioner_deps = DepAccumulator::new();
  let mut before_build_actions = || hook.fire(config, &mut partitioner_deps);
  let pipeline_deps = pipeline.run(request, config, Some(&mut before_build_actions))?;
  if !hook.fired() {
    return Err(RunError::HookNotFired);
  }

  deps.append(pipeline_deps);
  deps.append(partitioner_deps.paths().iter().cloned());
  deps.append(write_glob_files(config, pipeline.globs())?);

  state.advance(Phase::TerminalActionRunning)?;
  Ok(config.output_file().to_path_buf())
}

fn run_bp2build(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  codegen: &mut dyn BuildFileGenerator,
  deps: &mut DepAccumulator,
  state: &mut RunState,
) -> Result<PathBuf, RunError> {
  analyze(config, pipeline, Purpose::Conversion, deps, state)?;
  state.advance(Phase::TerminalActionRunning)?;

  let generated_root = config.abs(&config.gen_out_dir().join(BP2BUILD_DIR));
  let workspace = config.abs(&config.gen_out_dir().join(WORKSPACE_DIR));
  let metrics = codegen.generate(pipeline.graph(), CodegenMode::Bp2Build, &generated_root)?;
  deps.append(codegen.additional_dependency_paths());

  let verbose = config.is_env_true(env_vars::BP2BUILD_VERBOSE);
  let top = config.top_dir();
  let mut excludes = bazel_artifacts(top);
  if let Some(out) = relative_to_top(config, config.out_dir()) {
    excludes.push(out);
  }
  let bazel_files = bazel_related_files(config)?;
  excludes.extend(ignored_build_files(config.allowlist(), top, &bazel_files, verbose));
  excludes.extend(temporary_excludes());

  deps.append(forest::plant(top, &generated_root, &workspace, &excludes)?);

  let marker = PathBuf::from(config.options().flags.bp2build_marker.as_deref().unwrap_or_default());
  touch_output(config, &marker)?;

  if verbose {
    metrics.log();
  }
  match config.getenv_untracked(env_vars::LOG_DIR) {
    Some(dir) if !dir.is_empty() => {
      let path = metrics.write(Path::new(dir))?;
      debug!(path = %path.display(), "wrote conversion metrics");
    }
    _ => warn!("{} not set; skipping conversion metrics", env_vars::LOG_DIR),
  }

  Ok(marker)
}

fn run_api_bp2build(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  codegen: &mut dyn BuildFileGenerator,
  deps: &mut DepAccumulator,
  state: &mut RunState,
) -> Result<PathBuf, RunError> {
  deps.append(pipeline.list_module_paths(config, Path::new("."))?);
  analyze(config, pipeline, Purpose::ApiExport, deps, state)?;
  state.advance(Phase::TerminalActionRunning)?;

  let api_dir = PathBuf::from(config.options().flags.api_bp2build_dir.as_deref().unwrap_or_default());
  let generated_root = config.abs(&api_dir);
  codegen.generate(pipeline.graph(), CodegenMode::ApiBp2Build, &generated_root)?;
  deps.append(codegen.additional_dependency_paths());

  let top = config.top_dir();
  let mut excludes = bazel_artifacts(top);
  excludes.extend(api_build_file_excludes(&bazel_related_files(config)?));

  let workspace = config.gen_out_dir().join(API_BP2BUILD_DIR);
  deps.append(forest::plant(top, &generated_root, &config.abs(&workspace), &excludes)?);

  let marker = with_suffix(&workspace, MARKER_SUFFIX);
  touch_output(config, &marker)?;
  Ok(marker)
}

fn run_queryview(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  codegen: &mut dyn BuildFileGenerator,
  deps: &mut DepAccumulator,
  state: &mut RunState,
) -> Result<PathBuf, RunError> {
  analyze(config, pipeline, Purpose::Conversion, deps, state)?;
  state.advance(Phase::TerminalActionRunning)?;

  let queryview_dir = PathBuf::from(config.options().flags.queryview_dir.as_deref().unwrap_or_default());
  codegen.generate(pipeline.graph(), CodegenMode::QueryView, &config.abs(&queryview_dir))?;
  deps.append(codegen.additional_dependency_paths());

  let marker = with_suffix(&queryview_dir, MARKER_SUFFIX);
  touch_output(config, &marker)?;
  Ok(marker)
}

fn run_module_graph(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  deps: &mut DepAccumulator,
  state: &mut RunState,
) -> Result<PathBuf, RunError> {
  analyze(config, pipeline, Purpose::Build, deps, state)?;
  state.advance(Phase::TerminalActionRunning)?;

  let graph_file = PathBuf::from(config.options().flags.module_graph_file.as_deref().unwrap_or_default());
  let actions_file = config.options().module_actions_file.clone().unwrap_or_default();

  let mut graph = create_output(&config.abs(&graph_file))?;
  let mut actions = create_output(&config.abs(&actions_file))?;
  pipeline.write_json_graph_and_actions(&mut graph, &mut actions)?;
  for (writer, path) in [(&mut graph, &graph_file), (&mut actions, &actions_file)] {
    writer.flush().map_err(|source| RunError::Write {
      path: path.clone(),
      source,
    })?;
  }

  info!(graph = %graph_file.display(), actions = %actions_file.display(), "wrote module graph");
  Ok(graph_file)
}

fn run_doc_file(
  config: &Config,
  pipeline: &mut dyn AnalysisPipeline,
  deps: &mut DepAccumulator,
  state: &mut RunState,
) -> Result<PathBuf, RunError> {
  analyze(config, pipeline, Purpose::Build, deps, state)?;
  state.advance(Phase::TerminalActionRunning)?;

  let doc_file = PathBuf::from(config.options().flags.doc_file.as_deref().unwrap_or_default());
  pipeline.write_docs(&config.abs(&doc_file))?;
  info!(path = %doc_file.display(), "wrote module documentation");
  Ok(doc_file)
}

/// Bazel-related files listed by the finder. A missing list means none.
fn bazel_related_files(config: &Config) -> Result<Vec<String>, RunError> {
  match read_bazel_list(config.module_list_file(), config.top_dir()) {
    Ok(files) => Ok(files),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      debug!("no Bazel file list; assuming no checked-in BUILD files");
      Ok(Vec::new())
    }
    Err(source) => Err(RunError::BazelList {
      path: config.module_list_file().to_path_buf(),
      source,
    }),
  }
}

/// `path` relative to the top directory, if it lies inside it.
fn relative_to_top(config: &Config, path: &Path) -> Option<String> {
  let rel = if path.is_absolute() {
    let top = dunce::canonicalize(config.top_dir()).ok()?;
    let abs = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    abs.strip_prefix(&top).ok()?.to_path_buf()
  } else {
    path.to_path_buf()
  };
  let rel = rel.to_string_lossy().trim_end_matches('/').to_string();
  if rel.is_empty() || rel == "." || rel.starts_with("..") {
    return None;
  }
  Some(rel)
}

fn touch_output(config: &Config, path: &Path) -> Result<(), RunError> {
  let abs = config.abs(path);
  touch(&abs).map_err(|source| RunError::Write { path: abs, source })
}

fn create_output(path: &Path) -> Result<BufWriter<File>, RunError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|source| RunError::Write {
      path: parent.to_path_buf(),
      source,
    })?;
  }
  let file = File::create(path).map_err(|source| RunError::Write {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(BufWriter::new(file))
}
