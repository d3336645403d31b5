//! BUILD file generation from the analyzed module graph.

mod metrics;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::ModuleGraph;
use crate::analysis::graph::Module;
use crate::consts::APP_NAME;

pub use metrics::CodegenMetrics;

pub const BUILD_FILE_NAME: &str = "BUILD.bazel";

/// Module kinds with a direct BUILD equivalent.
const CONVERTIBLE_KINDS: &[&str] = &[
  "cc_binary",
  "cc_library",
  "cc_library_static",
  "cc_library_shared",
  "cc_test",
  "filegroup",
  "genrule",
  "java_library",
  "prebuilt_etc",
  "sh_binary",
];

#[derive(Debug, Error)]
pub enum CodegenError {
  #[error("failed to clear '{path}': {source}")]
  Clear {
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

  #[error("failed to serialize metrics: {0}")]
  Metrics(#[from] serde_json::Error),
}

/// What a generation pass emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenMode {
  /// Convertible modules only, as real targets.
  Bp2Build,
  /// Every module, as a generic target for inspection.
  QueryView,
  /// API contributions of exported modules.
  ApiBp2Build,
}

pub trait BuildFileGenerator {
  /// Write BUILD files for `graph` under `out_dir`, replacing its contents.
  fn generate(&mut self, graph: &ModuleGraph, mode: CodegenMode, out_dir: &Path) -> Result<CodegenMetrics, CodegenError>;

  /// Paths the generated files depend on beyond the analysis inputs.
  fn additional_dependency_paths(&self) -> Vec<PathBuf>;
}

/// Writes one `BUILD.bazel` per module directory.
#[derive(Debug, Default)]
pub struct BuildFileCodegen {
  processed_dirs: Vec<PathBuf>,
}

impl BuildFileCodegen {
  pub fn new() -> Self {
    Self::default()
  }
}

impl BuildFileGenerator for BuildFileCodegen {
  fn generate(&mut self, graph: &ModuleGraph, mode: CodegenMode, out_dir: &Path) -> Result<CodegenMetrics, CodegenError> {
    match fs::remove_dir_all(out_dir) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => {
        return Err(CodegenError::Clear {
          path: out_dir.to_path_buf(),
          source,
        });
      }
    }
    fs::create_dir_all(out_dir).map_err(|source| CodegenError::Write {
      path: out_dir.to_path_buf(),
      source,
    })?;

    let mut metrics = CodegenMetrics::default();
    let mut targets: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    self.processed_dirs.clear();

    for module in graph.modules() {
      if !self.processed_dirs.contains(&module.dir) {
        self.processed_dirs.push(module.dir.clone());
      }

      let kind = match mode {
        CodegenMode::Bp2Build => {
          if module.cmd.is_none() && !CONVERTIBLE_KINDS.contains(&module.kind.as_str()) {
            metrics.record_unconverted(&module.kind);
            continue;
          }
          module.kind.clone()
        }
        CodegenMode::QueryView => format!("generic_module_{}", module.kind),
        CodegenMode::ApiBp2Build => "api_contribution".to_string(),
      };

      targets
        .entry(module.dir.clone())
        .or_default()
        .push(render_target(&kind, module, graph));
      metrics.record_converted(&module.kind);
    }

    for (dir, rendered) in &targets {
      let path = out_dir.join(dir).join(BUILD_FILE_NAME);
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CodegenError::Write {
          path: parent.to_path_buf(),
          source,
        })?;
      }
      let mut contents = format!("# Generated by {}. Do not edit.\n", APP_NAME);
      for target in rendered {
        contents.push('\n');
        contents.push_str(target);
      }
      fs::write(&path, contents).map_err(|source| CodegenError::Write {
        path: path.clone(),
        source,
      })?;
      debug!(path = %path.display(), targets = rendered.len(), "wrote BUILD file");
    }

    self.processed_dirs.sort();
    info!(
      out_dir = %out_dir.display(),
      build_files = targets.len(),
      converted = metrics.converted,
      unconverted = metrics.unconverted,
      "generated BUILD files"
    );
    Ok(metrics)
  }

  fn additional_dependency_paths(&self) -> Vec<PathBuf> {
    self
      .processed_dirs
      .iter()
      .map(|d| if d.as_os_str().is_empty() { PathBuf::from(".") } else { d.clone() })
      .collect()
  }
}

fn render_target(kind: &str, module: &Module, graph: &ModuleGraph) -> String {
  let mut out = format!("{}(\n    name = {:?},\n", kind, module.name);

  if !module.srcs.is_empty() {
    out.push_str("    srcs = [\n");
    for src in &module.srcs {
      let label = match src.strip_prefix(&module.dir) {
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => format!("//{}", src.to_string_lossy()),
      };
      out.push_str(&format!("        {:?},\n", label));
    }
    out.push_str("    ],\n");
  }

  if !module.deps.is_empty() {
    out.push_str("    deps = [\n");
    for dep in &module.deps {
      let label = match graph.get(dep) {
        Some(d) if d.dir == module.dir => format!(":{}", dep),
        Some(d) => format!("//{}:{}", d.dir.to_string_lossy(), dep),
        None => format!(":{}", dep),
      };
      out.push_str(&format!("        {:?},\n", label));
    }
    out.push_str("    ],\n");
  }

  out.push_str(")\n");
  out
}
