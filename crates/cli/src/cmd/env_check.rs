//! Env-check command implementation.
//!
//! Compares a previously written used-environment file against the current
//! environment. A stale file is removed so the next build regenerates.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use weft_lib::env;

use crate::output::{print_info, print_success, print_warning};

#[derive(Debug, Args)]
pub struct EnvCheckArgs {
  /// Used-environment file written by a previous build
  #[arg(long)]
  used_env: PathBuf,

  /// Environment to compare against (defaults to the process environment)
  #[arg(long)]
  available_env: Option<PathBuf>,
}

pub fn cmd_env_check(args: EnvCheckArgs) -> Result<()> {
  let current = match &args.available_env {
    Some(path) => env::load_available(path).with_context(|| format!("failed to load {}", path.display()))?,
    None => env::process_env(),
  };
  debug!(vars = current.len(), "loaded current environment");

  let stale = env::is_stale(&args.used_env, &current)
    .with_context(|| format!("failed to check {}", args.used_env.display()))?;

  if !stale {
    print_success(&format!("{} is up to date", args.used_env.display()));
    return Ok(());
  }

  if args.used_env.exists() {
    fs::remove_file(&args.used_env).with_context(|| format!("failed to remove {}", args.used_env.display()))?;
    print_warning(&format!("environment changed, removed {}", args.used_env.display()));
  } else {
    print_info(&format!("{} does not exist", args.used_env.display()));
  }
  Ok(())
}
