mod cmd;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, EnvCheckArgs, cmd_build, cmd_env_check};

/// weft - build-mode orchestration for meta-builds
#[derive(Parser)]
#[command(name = "weft")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose (debug) logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run one build-mode activity and record its dependencies
  Build(Box<BuildArgs>),

  /// Check a used-environment snapshot against the current environment
  EnvCheck(EnvCheckArgs),
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build(args) => cmd_build(*args),
    Commands::EnvCheck(args) => cmd_env_check(args),
  };

  if let Err(err) = result {
    output::print_fatal(&err);
    std::process::exit(1);
  }
}
