//! Constants shared across weft.

/// Application name, used in log targets and generated file headers.
pub const APP_NAME: &str = "weft";

/// Suffix appended to an output path to name its depfile.
pub const DEPFILE_SUFFIX: &str = ".d";

/// Suffix appended to a workspace directory to name its completion marker.
pub const MARKER_SUFFIX: &str = ".marker";

/// Product variables file inside the gen-out directory. Always a dependency.
pub const PRODUCT_VARIABLES_FILE: &str = "product.variables";

/// Default ninja output file.
pub const DEFAULT_OUTPUT_FILE: &str = "build.ninja";

/// Default glob manifest file name.
pub const DEFAULT_GLOB_FILE: &str = "build-globs.json";

/// Default directory (under gen-out) holding glob list files.
pub const DEFAULT_GLOB_LIST_DIR: &str = "globs";

/// Name of the finder output listing existing Bazel-related files.
pub const BAZEL_LIST_FILE: &str = "bazel.list";

/// File name of codegen metrics written into `LOG_DIR`.
pub const BP2BUILD_METRICS_FILE: &str = "bp2build_metrics.json";

/// Length of the hex prefix used for glob list file names.
pub const GLOB_HASH_PREFIX_LEN: usize = 16;

/// Tracked environment variables with meaning to the orchestrator.
pub mod env_vars {
  pub const ALLOW_MISSING_DEPENDENCIES: &str = "ALLOW_MISSING_DEPENDENCIES";
  pub const BP2BUILD_VERBOSE: &str = "BP2BUILD_VERBOSE";
  pub const BAZEL_DEPS_FILE: &str = "BAZEL_DEPS_FILE";
  pub const LOG_DIR: &str = "LOG_DIR";
}
