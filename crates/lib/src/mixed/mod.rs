//! Mixed-build coordination.
//!
//! In mixed builds part of the module set is delegated to an external build
//! system. It must be queried exactly once, after analysis and before build
//! actions are finalized, and the files it read become dependencies of our
//! output.

pub mod partitioner;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::consts::env_vars;
use crate::depfile::DepAccumulator;

pub use partitioner::{CommandPartitioner, PartitionError};

#[derive(Debug, Error)]
pub enum HookError {
  #[error("mixed-build hook invoked more than once")]
  AlreadyInvoked,

  #[error("work partitioner failed: {0}")]
  External(#[from] PartitionError),

  #[error("{} not set; cannot read the partitioner's dependencies", env_vars::BAZEL_DEPS_FILE)]
  MissingDepsFile,

  #[error("failed to read partitioner dependencies '{path}': {source}")]
  ReadDeps {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// The external system that takes over part of the build.
pub trait WorkPartitioner {
  fn invoke(&mut self, config: &Config) -> Result<(), PartitionError>;
}

/// One-shot hook around a [`WorkPartitioner`].
pub struct MixedBuildHook {
  partitioner: Box<dyn WorkPartitioner>,
  fired: bool,
}

impl MixedBuildHook {
  pub fn new(partitioner: Box<dyn WorkPartitioner>) -> Self {
    Self {
      partitioner,
      fired: false,
    }
  }

  pub fn fired(&self) -> bool {
    self.fired
  }

  /// Run the partitioner and append the dependencies it reports.
  pub fn fire(&mut self, config: &Config, deps: &mut DepAccumulator) -> Result<(), HookError> {
    if self.fired {
      return Err(HookError::AlreadyInvoked);
    }
    self.fired = true;

    info!(mode = %config.mode(), "running mixed-build hook");
    self.partitioner.invoke(config)?;

    let deps_file = config.getenv(env_vars::BAZEL_DEPS_FILE);
    if deps_file.is_empty() {
      return Err(HookError::MissingDepsFile);
    }
    let path = config.abs(Path::new(&deps_file));
    let data = fs::read_to_string(&path).map_err(|source| HookError::ReadDeps {
      path: path.clone(),
      source,
    })?;

    let before = deps.len();
    deps.append(data.lines().map(str::trim).filter(|l| !l.is_empty()));
    debug!(path = %path.display(), added = deps.len() - before, "read partitioner dependencies");
    Ok(())
  }
}
