//! Run configuration.
//!
//! [`Config`] is built once at startup from the command-line options and the
//! available environment, then passed by reference to every phase. Apart from
//! the environment recorder it is immutable.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_GLOB_FILE, DEFAULT_GLOB_LIST_DIR, DEFAULT_OUTPUT_FILE, PRODUCT_VARIABLES_FILE, env_vars};
use crate::env::{self, EnvError, EnvMap, EnvRecorder};
use crate::forest::excludes::{AllowlistError, KeepBuildFileAllowlist};
use crate::mode::{BuildMode, ModeFlags, select_mode};
use crate::util::files::join_path;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("--available-env not set")]
  MissingAvailableEnv,

  #[error("--module-actions-file is required with --module-graph-file")]
  MissingActionsFile,

  #[error(transparent)]
  Env(#[from] EnvError),

  #[error(transparent)]
  Allowlist(#[from] AllowlistError),
}

/// Raw options as given on the command line.
#[derive(Debug, Clone)]
pub struct Options {
  /// Root of the source tree. Relative paths below are resolved against it.
  pub top_dir: PathBuf,
  /// Scheduler build directory.
  pub out_dir: PathBuf,
  /// Directory for our own generated files.
  pub gen_out_dir: PathBuf,
  pub module_list_file: PathBuf,
  pub output_file: PathBuf,
  pub available_env_file: Option<PathBuf>,
  pub used_env_file: Option<PathBuf>,
  pub glob_file: PathBuf,
  pub glob_list_dir: PathBuf,
  pub module_actions_file: Option<PathBuf>,
  pub keep_build_files: Option<PathBuf>,
  /// Program and arguments of the external work partitioner.
  pub partitioner_cmd: Vec<String>,
  pub empty_ninja_file: bool,
  pub flags: ModeFlags,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      top_dir: PathBuf::from("."),
      out_dir: PathBuf::from("out"),
      gen_out_dir: PathBuf::from("out/gen"),
      module_list_file: PathBuf::from("modules.list"),
      output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
      available_env_file: None,
      used_env_file: None,
      glob_file: PathBuf::from(DEFAULT_GLOB_FILE),
      glob_list_dir: PathBuf::from(DEFAULT_GLOB_LIST_DIR),
      module_actions_file: None,
      keep_build_files: None,
      partitioner_cmd: Vec::new(),
      empty_ninja_file: false,
      flags: ModeFlags::default(),
    }
  }
}

/// The immutable configuration of one run.
#[derive(Debug)]
pub struct Config {
  options: Options,
  mode: BuildMode,
  env: EnvRecorder,
  allowlist: KeepBuildFileAllowlist,
  allow_missing_dependencies: bool,
}

impl Config {
  /// Load the available environment named by the options and build a config.
  pub fn load(options: Options) -> Result<Self, ConfigError> {
    let available_path = options
      .available_env_file
      .as_deref()
      .ok_or(ConfigError::MissingAvailableEnv)?;
    let available = env::load_available(&join_path(&options.top_dir, available_path))?;
    Self::with_env(options, available)
  }

  /// Build a config over an already loaded available environment.
  pub fn with_env(options: Options, available: EnvMap) -> Result<Self, ConfigError> {
    let mode = select_mode(&options.flags);
    if mode == BuildMode::ModuleGraph && options.module_actions_file.is_none() {
      return Err(ConfigError::MissingActionsFile);
    }

    let allowlist = match &options.keep_build_files {
      Some(path) => KeepBuildFileAllowlist::load(&join_path(&options.top_dir, path))?,
      None => KeepBuildFileAllowlist::default(),
    };

    let env = EnvRecorder::new(available);
    let allow_missing_dependencies = env.get(env_vars::ALLOW_MISSING_DEPENDENCIES) == "true";

    debug!(%mode, allow_missing_dependencies, "configuration ready");
    Ok(Self {
      options,
      mode,
      env,
      allowlist,
      allow_missing_dependencies,
    })
  }

  pub fn mode(&self) -> BuildMode {
    self.mode
  }

  pub fn options(&self) -> &Options {
    &self.options
  }

  pub fn top_dir(&self) -> &Path {
    &self.options.top_dir
  }

  pub fn out_dir(&self) -> &Path {
    &self.options.out_dir
  }

  /// Gen-out directory as given (possibly relative to the top dir).
  pub fn gen_out_dir(&self) -> &Path {
    &self.options.gen_out_dir
  }

  pub fn module_list_file(&self) -> &Path {
    &self.options.module_list_file
  }

  pub fn output_file(&self) -> &Path {
    &self.options.output_file
  }

  pub fn used_env_file(&self) -> Option<&Path> {
    self.options.used_env_file.as_deref()
  }

  pub fn allowlist(&self) -> &KeepBuildFileAllowlist {
    &self.allowlist
  }

  pub fn allow_missing_dependencies(&self) -> bool {
    self.allow_missing_dependencies
  }

  /// Product variables file; always a dependency of the run.
  pub fn product_variables_file(&self) -> PathBuf {
    self.options.gen_out_dir.join(PRODUCT_VARIABLES_FILE)
  }

  /// Resolve a path against the top directory.
  pub fn abs(&self, path: &Path) -> PathBuf {
    join_path(&self.options.top_dir, path)
  }

  /// Read a variable, recording it as a dependency of the output.
  pub fn getenv(&self, key: &str) -> String {
    self.env.get(key)
  }

  pub fn is_env_true(&self, key: &str) -> bool {
    matches!(self.getenv(key).as_str(), "1" | "y" | "yes" | "on" | "true")
  }

  pub fn is_env_false(&self, key: &str) -> bool {
    matches!(self.getenv(key).as_str(), "0" | "n" | "no" | "off" | "false")
  }

  /// Read a variable without recording it. For values that change on every
  /// invocation and must not invalidate the output.
  pub fn getenv_untracked(&self, key: &str) -> Option<&str> {
    self.env.get_untracked(key)
  }

  /// Every variable read through [`Config::getenv`] so far.
  pub fn env_deps(&self) -> EnvMap {
    self.env.used()
  }
}
