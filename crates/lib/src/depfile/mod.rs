//! Make-style dependency records.
//!
//! Every phase of a run appends the paths it read to a [`DepAccumulator`].
//! When the terminal output has been produced the accumulator is flushed into
//! `<output>.d`, which the scheduler uses to decide when to rerun us. The
//! flush consumes the accumulator, so each run writes exactly one record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::DEPFILE_SUFFIX;
use crate::util::files::{join_path, with_suffix};

#[derive(Debug, Error)]
pub enum DepfileError {
  /// The record would name a target that was never produced.
  #[error("refusing to write depfile for missing output '{0}'")]
  MissingOutput(PathBuf),

  #[error("failed to write depfile '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Append-only list of paths whose modification invalidates one output.
#[derive(Debug, Default, Clone)]
pub struct DepAccumulator {
  paths: Vec<PathBuf>,
}

impl DepAccumulator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add paths in order. Duplicates are kept.
  pub fn append<I, P>(&mut self, paths: I)
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    self.paths.extend(paths.into_iter().map(Into::into));
  }

  pub fn push(&mut self, path: impl Into<PathBuf>) {
    self.paths.push(path.into());
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.paths
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  /// Write `<top>/<output>.d` naming `output` as the target.
  ///
  /// `output` is written into the record as given; relative outputs are
  /// resolved against `top` for the existence check and the depfile location.
  /// Returns the depfile path.
  pub fn flush(self, top: &Path, output: &Path) -> Result<PathBuf, DepfileError> {
    let resolved = join_path(top, output);
    if !resolved.exists() {
      return Err(DepfileError::MissingOutput(resolved));
    }

    let depfile = with_suffix(&resolved, DEPFILE_SUFFIX);
    let contents = render(output, &self.paths);

    fs::write(&depfile, contents).map_err(|source| DepfileError::Write {
      path: depfile.clone(),
      source,
    })?;

    debug!(depfile = %depfile.display(), deps = self.paths.len(), "wrote depfile");
    Ok(depfile)
  }
}

/// Render a single `target: dep dep ...` record, newline-terminated.
pub fn render(target: &Path, deps: &[PathBuf]) -> String {
  let mut out = escape(&target.to_string_lossy());
  out.push(':');
  for dep in deps {
    out.push(' ');
    out.push_str(&escape(&dep.to_string_lossy()));
  }
  out.push('\n');
  out
}

fn escape(path: &str) -> String {
  let mut escaped = String::with_capacity(path.len());
  for c in path.chars() {
    match c {
      ' ' => escaped.push_str("\\ "),
      '#' => escaped.push_str("\\#"),
      '$' => escaped.push_str("$$"),
      _ => escaped.push(c),
    }
  }
  escaped
}
