use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::CodegenError;
use crate::consts::BP2BUILD_METRICS_FILE;

/// Conversion counts of one generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodegenMetrics {
  pub converted: usize,
  pub unconverted: usize,
  /// Converted modules per kind.
  pub converted_kinds: BTreeMap<String, usize>,
  /// Unconverted modules per kind.
  pub unconverted_kinds: BTreeMap<String, usize>,
}

impl CodegenMetrics {
  pub fn record_converted(&mut self, kind: &str) {
    self.converted += 1;
    *self.converted_kinds.entry(kind.to_string()).or_default() += 1;
  }

  pub fn record_unconverted(&mut self, kind: &str) {
    self.unconverted += 1;
    *self.unconverted_kinds.entry(kind.to_string()).or_default() += 1;
  }

  pub fn total(&self) -> usize {
    self.converted + self.unconverted
  }

  pub fn log(&self) {
    info!(
      converted = self.converted,
      unconverted = self.unconverted,
      total = self.total(),
      "conversion metrics"
    );
    for (kind, count) in &self.unconverted_kinds {
      info!(kind = %kind, count, "unconverted module kind");
    }
  }

  /// Write the metrics as JSON into `dir`. Returns the written file.
  pub fn write(&self, dir: &Path) -> Result<PathBuf, CodegenError> {
    let path = dir.join(BP2BUILD_METRICS_FILE);
    let mut data = serde_json::to_vec_pretty(self)?;
    data.push(b'\n');
    fs::create_dir_all(dir).map_err(|source| CodegenError::Write {
      path: dir.to_path_buf(),
      source,
    })?;
    fs::write(&path, data).map_err(|source| CodegenError::Write {
      path: path.clone(),
      source,
    })?;
    Ok(path)
  }
}
