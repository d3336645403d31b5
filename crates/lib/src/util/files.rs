//! Small filesystem helpers shared by the orchestrator phases.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Resolve `path` against `top`. Absolute paths are returned unchanged.
pub fn join_path(top: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    top.join(path)
  }
}

/// Append `suffix` to the final component of `path` (`out/a` + `.d` -> `out/a.d`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
  let mut raw = path.as_os_str().to_os_string();
  raw.push(suffix);
  PathBuf::from(raw)
}

/// Create `path` if missing and set its modification time to now.
pub fn touch(path: &Path) -> io::Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent)?;
  }
  let file = OpenOptions::new().append(true).create(true).open(path)?;
  file.set_modified(SystemTime::now())
}

/// Write `contents` to `path` unless the file already holds exactly those bytes.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> io::Result<bool> {
  match fs::read(path) {
    Ok(existing) if existing == contents => return Ok(false),
    Ok(_) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent)?;
  }
  fs::write(path, contents)?;
  Ok(true)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tempfile::TempDir;

  #[test]
  fn join_path_keeps_absolute() {
    let top = Path::new("/top");
    assert_eq!(join_path(top, Path::new("out/x")), PathBuf::from("/top/out/x"));
    assert_eq!(join_path(top, Path::new("/abs/x")), PathBuf::from("/abs/x"));
  }

  #[test]
  fn with_suffix_appends_to_file_name() {
    assert_eq!(with_suffix(Path::new("out/graph.json"), ".d"), PathBuf::from("out/graph.json.d"));
  }

  #[test]
  fn touch_creates_and_bumps_mtime() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("marker");

    touch(&path).unwrap();
    assert!(path.exists());

    let old = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options().write(true).open(&path).unwrap().set_modified(old).unwrap();
    touch(&path).unwrap();

    let mtime = fs::metadata(&path).unwrap().modified().unwrap();
    assert!(mtime > old + Duration::from_secs(60));
  }

  #[test]
  fn write_if_changed_skips_identical_content() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("list");

    assert!(write_if_changed(&path, b"a\nb\n").unwrap());
    assert!(!write_if_changed(&path, b"a\nb\n").unwrap());
    assert!(write_if_changed(&path, b"a\n").unwrap());
    assert_eq!(fs::read(&path).unwrap(), b"a\n");
  }
}
