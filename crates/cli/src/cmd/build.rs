//! Build command implementation.
//!
//! Maps the command line onto [`Options`], loads the configuration and hands
//! off to the orchestrator with the shipped pipeline and code generator.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use weft_lib::analysis::DeclPipeline;
use weft_lib::codegen::BuildFileCodegen;
use weft_lib::config::{Config, Options};
use weft_lib::consts::{DEFAULT_GLOB_FILE, DEFAULT_GLOB_LIST_DIR, DEFAULT_OUTPUT_FILE};
use weft_lib::mixed::{CommandPartitioner, MixedBuildHook};
use weft_lib::mode::ModeFlags;
use weft_lib::orchestrate;

use crate::output::{format_duration, print_stat, print_success};

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Root of the source tree
  #[arg(long, default_value = ".")]
  top: PathBuf,

  /// Directory for weft's own generated files
  #[arg(long, default_value = "out/gen")]
  gen_out: PathBuf,

  /// Build output directory of the scheduler
  #[arg(long, default_value = "out")]
  out: PathBuf,

  /// File listing the module declaration files
  #[arg(short = 'l', long, default_value = "modules.list")]
  module_list: PathBuf,

  /// Ninja file to write
  #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
  output: PathBuf,

  /// Environment the parent process makes available
  #[arg(long)]
  available_env: Option<PathBuf>,

  /// Snapshot of the variables this run read
  #[arg(long)]
  used_env: Option<PathBuf>,

  /// Glob manifest, under the gen-out directory
  #[arg(long, default_value = DEFAULT_GLOB_FILE)]
  glob_file: PathBuf,

  /// Directory for glob list files, under the gen-out directory
  #[arg(long, default_value = DEFAULT_GLOB_LIST_DIR)]
  glob_list_dir: PathBuf,

  /// Write the module graph as JSON to this file instead of building
  #[arg(long)]
  module_graph_file: Option<String>,

  /// Write the build actions as JSON to this file (with --module-graph-file)
  #[arg(long)]
  module_actions_file: Option<PathBuf>,

  /// Write module documentation to this file instead of building
  #[arg(long)]
  docs: Option<String>,

  /// Generate an inspection workspace in this directory
  #[arg(long)]
  queryview_dir: Option<String>,

  /// Generate the API export workspace from this directory
  #[arg(long)]
  api_bp2build_dir: Option<String>,

  /// Convert to BUILD files and touch this marker when done
  #[arg(long)]
  bp2build_marker: Option<String>,

  /// Mixed build with the production allowlist
  #[arg(long)]
  bazel_mode: bool,

  /// Mixed build with the staging allowlist
  #[arg(long)]
  bazel_mode_staging: bool,

  /// Mixed build with the development allowlist
  #[arg(long)]
  bazel_mode_dev: bool,

  /// Write an empty ninja file
  #[arg(long)]
  empty_ninja_file: bool,

  /// JSON allowlist of directories whose checked-in BUILD files are kept
  #[arg(long)]
  keep_build_files: Option<PathBuf>,

  /// Work partitioner program and arguments for mixed builds; takes every
  /// following argument
  #[arg(long, value_name = "ARGV", num_args = 1.., allow_hyphen_values = true)]
  partitioner_cmd: Vec<String>,
}

impl BuildArgs {
  fn into_options(self) -> Options {
    Options {
      top_dir: self.top,
      out_dir: self.out,
      gen_out_dir: self.gen_out,
      module_list_file: self.module_list,
      output_file: self.output,
      available_env_file: self.available_env,
      used_env_file: self.used_env,
      glob_file: self.glob_file,
      glob_list_dir: self.glob_list_dir,
      module_actions_file: self.module_actions_file,
      keep_build_files: self.keep_build_files,
      partitioner_cmd: self.partitioner_cmd,
      empty_ninja_file: self.empty_ninja_file,
      flags: ModeFlags {
        bp2build_marker: self.bp2build_marker,
        queryview_dir: self.queryview_dir,
        api_bp2build_dir: self.api_bp2build_dir,
        module_graph_file: self.module_graph_file,
        doc_file: self.docs,
        bazel_mode_dev: self.bazel_mode_dev,
        bazel_mode: self.bazel_mode,
        bazel_mode_staging: self.bazel_mode_staging,
      },
    }
  }
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();
  let config = Config::load(args.into_options()).context("failed to load configuration")?;
  let mode = config.mode();

  let mut hook = mode.is_mixed_build().then(|| {
    let partitioner = CommandPartitioner::new(config.options().partitioner_cmd.clone());
    MixedBuildHook::new(Box::new(partitioner))
  });

  let outcome = orchestrate::run(
    &config,
    &mut DeclPipeline::new(),
    &mut BuildFileCodegen::new(),
    hook.as_mut(),
  )
  .with_context(|| format!("{} run failed", mode))?;

  print_success(&format!(
    "{} ({}) in {}",
    outcome.final_output.display(),
    mode,
    format_duration(start.elapsed())
  ));
  print_stat("Dependencies", &outcome.dependencies.to_string());
  print_stat("Depfile", &outcome.depfile.display().to_string());
  if outcome.env_rewritten {
    print_stat("Environment", "updated");
  }
  Ok(())
}
