//! Environment snapshot tracking.
//!
//! The parent process dumps every variable it could pass us into the
//! *available* environment file; the orchestrator itself runs with that file as
//! its only view of the environment. Every lookup goes through
//! [`EnvRecorder`], so at the end of the run we know exactly which variables
//! influenced the output. That *used* set is persisted and compared on the next
//! invocation ([`is_stale`]) to force regeneration when one of them changes.
//!
//! # File format
//!
//! Both files are a pretty-printed JSON array sorted by key:
//!
//! ```text
//! [
//!   {
//!     "key": "ALLOW_MISSING_DEPENDENCIES",
//!     "value": "true"
//!   }
//! ]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::util::files::touch;

pub type EnvMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum EnvError {
  #[error("failed to read environment file '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed environment file '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize environment: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write environment file '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to touch output '{path}': {source}")]
  Touch {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Serialize, Deserialize)]
struct EnvEntry {
  key: String,
  value: String,
}

/// Serialize an environment map in its canonical, deterministic form.
pub fn env_file_contents(env: &EnvMap) -> Result<Vec<u8>, EnvError> {
  let entries: Vec<EnvEntry> = env
    .iter()
    .map(|(key, value)| EnvEntry {
      key: key.clone(),
      value: value.clone(),
    })
    .collect();
  let mut data = serde_json::to_vec_pretty(&entries).map_err(EnvError::Serialize)?;
  data.push(b'\n');
  Ok(data)
}

fn parse_env(path: &Path, data: &[u8]) -> Result<EnvMap, EnvError> {
  let entries: Vec<EnvEntry> = serde_json::from_slice(data).map_err(|source| EnvError::Parse {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
}

/// Load the available environment. A missing or malformed file is fatal.
pub fn load_available(path: &Path) -> Result<EnvMap, EnvError> {
  let data = fs::read(path).map_err(|source| EnvError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let env = parse_env(path, &data)?;
  debug!(path = %path.display(), vars = env.len(), "loaded available environment");
  Ok(env)
}

/// Snapshot of this process's own environment. Variables whose name or value
/// is not valid UTF-8 are skipped.
pub fn process_env() -> EnvMap {
  std::env::vars_os()
    .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
    .collect()
}

/// Records every variable looked up through it.
///
/// Lookups may come from analysis worker threads, hence the mutex.
#[derive(Debug)]
pub struct EnvRecorder {
  available: EnvMap,
  used: Mutex<EnvMap>,
}

impl EnvRecorder {
  pub fn new(available: EnvMap) -> Self {
    Self {
      available,
      used: Mutex::new(EnvMap::new()),
    }
  }

  /// Look up `key`, recording it. Unset variables read as (and record) `""`.
  pub fn get(&self, key: &str) -> String {
    let value = self.available.get(key).cloned().unwrap_or_default();
    let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
    used.insert(key.to_string(), value.clone());
    value
  }

  /// Look up `key` without recording it.
  pub fn get_untracked(&self, key: &str) -> Option<&str> {
    self.available.get(key).map(String::as_str)
  }

  /// Snapshot of every variable read so far.
  pub fn used(&self) -> EnvMap {
    self.used.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }
}

/// Outcome of [`flush_if_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFlush {
  /// The snapshot was written for the first time.
  Created,
  /// The snapshot differed and was rewritten.
  Updated,
  /// The snapshot was byte-identical; nothing was touched.
  Unchanged,
}

impl EnvFlush {
  pub fn wrote(self) -> bool {
    !matches!(self, EnvFlush::Unchanged)
  }
}

/// Persist `used` at `path` only if its serialized form changed.
///
/// When the file is (re)written, `final_output` is touched afterwards so that
/// it is never older than the snapshot.
pub fn flush_if_changed(path: &Path, used: &EnvMap, final_output: &Path) -> Result<EnvFlush, EnvError> {
  let data = env_file_contents(used)?;

  let outcome = match fs::read(path) {
    Ok(existing) if existing == data => {
      debug!(path = %path.display(), "used environment unchanged");
      return Ok(EnvFlush::Unchanged);
    }
    Ok(_) => EnvFlush::Updated,
    Err(e) if e.kind() == io::ErrorKind::NotFound => EnvFlush::Created,
    Err(source) => {
      return Err(EnvError::Read {
        path: path.to_path_buf(),
        source,
      });
    }
  };

  fs::write(path, &data).map_err(|source| EnvError::Write {
    path: path.to_path_buf(),
    source,
  })?;

  // The output must never be older than the snapshot.
  touch(final_output).map_err(|source| EnvError::Touch {
    path: final_output.to_path_buf(),
    source,
  })?;

  info!(path = %path.display(), vars = used.len(), ?outcome, "wrote used environment");
  Ok(outcome)
}

/// Whether any variable recorded in the used-environment file at `path` now
/// has a different value in `current`. A missing file is stale.
pub fn is_stale(path: &Path, current: &EnvMap) -> Result<bool, EnvError> {
  let data = match fs::read(path) {
    Ok(data) => data,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
    Err(source) => {
      return Err(EnvError::Read {
        path: path.to_path_buf(),
        source,
      });
    }
  };

  let recorded = parse_env(path, &data)?;
  for (key, old) in &recorded {
    let new = current.get(key).map(String::as_str).unwrap_or("");
    if new != old {
      info!(var = %key, old = %old, new = %new, "environment variable changed");
      return Ok(true);
    }
  }
  Ok(false)
}
