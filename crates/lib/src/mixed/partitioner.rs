//! External work partitioner invoked as a child process.

use std::io;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use super::WorkPartitioner;
use crate::config::Config;

pub const BUILD_MODE_VAR: &str = "WEFT_BUILD_MODE";
pub const OUT_DIR_VAR: &str = "WEFT_OUT_DIR";

#[derive(Debug, Error)]
pub enum PartitionError {
  #[error("no partitioner command configured")]
  NoCommand,

  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("'{program}' exited with code {code:?}")]
  Failed { program: String, code: Option<i32> },
}

/// Runs a configured program in the top directory and waits for it.
///
/// The child sees the build mode in `WEFT_BUILD_MODE` and the absolute
/// gen-out directory in `WEFT_OUT_DIR`. There is no timeout.
#[derive(Debug, Clone)]
pub struct CommandPartitioner {
  argv: Vec<String>,
}

impl CommandPartitioner {
  pub fn new(argv: Vec<String>) -> Self {
    Self { argv }
  }
}

impl WorkPartitioner for CommandPartitioner {
  fn invoke(&mut self, config: &Config) -> Result<(), PartitionError> {
    let Some((program, args)) = self.argv.split_first() else {
      return Err(PartitionError::NoCommand);
    };
    info!(program = %program, "invoking work partitioner");

    let output = Command::new(program)
      .args(args)
      .current_dir(config.top_dir())
      .env(BUILD_MODE_VAR, config.mode().as_str())
      .env(OUT_DIR_VAR, config.abs(config.gen_out_dir()))
      .output()
      .map_err(|source| PartitionError::Spawn {
        program: program.clone(),
        source,
      })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
      debug!(stdout = %stdout.trim(), "partitioner stdout");
    }
    if !stderr.trim().is_empty() {
      debug!(stderr = %stderr.trim(), "partitioner stderr");
    }

    if !output.status.success() {
      return Err(PartitionError::Failed {
        program: program.clone(),
        code: output.status.code(),
      });
    }
    Ok(())
  }
}
