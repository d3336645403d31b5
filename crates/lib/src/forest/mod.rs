//! Symlink forest planting.
//!
//! The second build system wants a single workspace containing both the
//! checked-in sources and the BUILD files we generate. Rather than copying the
//! tree, [`plant`] builds a directory of symlinks:
//!
//! ```text
//! real/                 generated/          target/
//! ├── a/                ├── a/              ├── a/                (real dir, merged)
//! │   ├── b.txt         │   └── BUILD.bazel │   ├── b.txt       -> real/a/b.txt
//! │   └── BUILD         └── c/              │   ├── BUILD.bazel -> generated/a/BUILD.bazel
//! └── lib/                  └── BUILD.bazel │   └── BUILD       -> real/a/BUILD
//!     └── x.c                               ├── c/              -> generated/c
//!                                           └── lib/            -> real/lib
//! ```
//!
//! Generated entries shadow real ones at the same relative path, excluded
//! paths are left out, and a directory is only descended into when it has to
//! be merged or has excluded entries beneath it; otherwise it is linked as a
//! whole.
//!
//! The target root is wiped and rebuilt on every call, so planting is
//! idempotent and entries from a previous exclude set never linger.

pub mod excludes;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, trace};

#[derive(Debug, Error)]
pub enum ForestError {
  #[error("failed to resolve forest root '{path}': {source}")]
  Root {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read directory '{path}': {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove '{path}': {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create directory '{path}': {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create symlink '{link}' -> '{target}': {source}")]
  CreateSymlink {
    target: PathBuf,
    link: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Exclude entries arranged as a tree keyed by path component.
#[derive(Debug, Default)]
struct ExcludeNode {
  excluded: bool,
  children: BTreeMap<String, ExcludeNode>,
}

impl ExcludeNode {
  fn from_paths<S: AsRef<str>>(paths: &[S]) -> Self {
    let mut root = ExcludeNode::default();
    for path in paths {
      let mut node = &mut root;
      let mut any = false;
      for component in path.as_ref().split('/').filter(|c| !c.is_empty() && *c != ".") {
        node = node.children.entry(component.to_string()).or_default();
        any = true;
      }
      if any {
        node.excluded = true;
      }
    }
    root
  }

  fn has_children(&self) -> bool {
    !self.children.is_empty()
  }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
  is_dir: bool,
}

struct Planter<'a> {
  real_root: &'a Path,
  generated_root: &'a Path,
  target_root: &'a Path,
  visited: Vec<PathBuf>,
  links: usize,
}

/// Plant the forest of `real_root` overlaid with `generated_root` at
/// `target_root`, leaving out `excludes` (paths relative to the roots).
///
/// Returns every directory that was read, real and generated. Adding or
/// removing an entry in any of them changes the forest.
pub fn plant<S: AsRef<str>>(
  real_root: &Path,
  generated_root: &Path,
  target_root: &Path,
  excludes: &[S],
) -> Result<Vec<PathBuf>, ForestError> {
  let real_root = dunce::canonicalize(real_root).map_err(|source| ForestError::Root {
    path: real_root.to_path_buf(),
    source,
  })?;
  let generated_root = dunce::canonicalize(generated_root).unwrap_or_else(|_| generated_root.to_path_buf());

  clear(target_root)?;
  create_dir(target_root)?;

  let tree = ExcludeNode::from_paths(excludes);
  let mut planter = Planter {
    real_root: &real_root,
    generated_root: &generated_root,
    target_root,
    visited: Vec::new(),
    links: 0,
  };
  planter.plant_dir(Path::new(""), Some(&tree))?;

  info!(
    target = %target_root.display(),
    links = planter.links,
    dirs_read = planter.visited.len(),
    "planted symlink forest"
  );
  Ok(planter.visited)
}

impl Planter<'_> {
  fn plant_dir(&mut self, rel: &Path, excludes: Option<&ExcludeNode>) -> Result<(), ForestError> {
    let real_dir = under(self.real_root, rel);
    let generated_dir = under(self.generated_root, rel);

    let real = self.read_entries(&real_dir)?;
    let generated = self.read_entries(&generated_dir)?;

    let names: BTreeSet<&String> = real.keys().chain(generated.keys()).collect();
    for name in names {
      let child_excludes = excludes.and_then(|node| node.children.get(name));
      if child_excludes.is_some_and(|node| node.excluded) {
        trace!(path = %rel.join(name).display(), "excluded");
        continue;
      }

      let child_rel = rel.join(name);
      let target = self.target_root.join(&child_rel);

      match (real.get(name), generated.get(name)) {
        (Some(r), Some(g)) if r.is_dir && g.is_dir => {
          create_dir(&target)?;
          self.plant_dir(&child_rel, child_excludes)?;
        }
        (_, Some(g)) if g.is_dir && child_excludes.is_some_and(ExcludeNode::has_children) => {
          create_dir(&target)?;
          self.plant_dir(&child_rel, child_excludes)?;
        }
        (_, Some(_)) => self.link(&generated_dir.join(name), &target)?,
        (Some(r), None) if r.is_dir && child_excludes.is_some_and(ExcludeNode::has_children) => {
          create_dir(&target)?;
          self.plant_dir(&child_rel, child_excludes)?;
        }
        (Some(_), None) => self.link(&real_dir.join(name), &target)?,
        (None, None) => unreachable!("name comes from one of the listings"),
      }
    }

    Ok(())
  }

  /// List a directory. A missing directory lists as empty and is not recorded.
  fn read_entries(&mut self, dir: &Path) -> Result<BTreeMap<String, Entry>, ForestError> {
    let iter = match fs::read_dir(dir) {
      Ok(iter) => iter,
      Err(e) if e.kind() == io::ErrorKind::NotFound || e.kind() == io::ErrorKind::NotADirectory => {
        return Ok(BTreeMap::new());
      }
      Err(source) => {
        return Err(ForestError::ReadDir {
          path: dir.to_path_buf(),
          source,
        });
      }
    };
    self.visited.push(dir.to_path_buf());

    let mut entries = BTreeMap::new();
    for entry in iter {
      let entry = entry.map_err(|source| ForestError::ReadDir {
        path: dir.to_path_buf(),
        source,
      })?;
      // Follow symlinks; a dangling link is linked as a leaf.
      let is_dir = fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false);
      entries.insert(entry.file_name().to_string_lossy().into_owned(), Entry { is_dir });
    }
    Ok(entries)
  }

  fn link(&mut self, target: &Path, link: &Path) -> Result<(), ForestError> {
    create_symlink(target, link).map_err(|source| ForestError::CreateSymlink {
      target: target.to_path_buf(),
      link: link.to_path_buf(),
      source,
    })?;
    self.links += 1;
    Ok(())
  }
}

fn under(root: &Path, rel: &Path) -> PathBuf {
  if rel.as_os_str().is_empty() {
    root.to_path_buf()
  } else {
    root.join(rel)
  }
}

fn clear(path: &Path) -> Result<(), ForestError> {
  let result = match fs::symlink_metadata(path) {
    Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
    Ok(_) => fs::remove_file(path),
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(e) => Err(e),
  };
  debug!(path = %path.display(), "cleared previous forest");
  result.map_err(|source| ForestError::Remove {
    path: path.to_path_buf(),
    source,
  })
}

fn create_dir(path: &Path) -> Result<(), ForestError> {
  fs::create_dir_all(path).map_err(|source| ForestError::CreateDir {
    path: path.to_path_buf(),
    source,
  })
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  if target.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use tempfile::TempDir;
  use walkdir::WalkDir;

  struct Trees {
    temp: TempDir,
  }

  impl Trees {
    fn new() -> Self {
      let temp = TempDir::new().unwrap();
      fs::create_dir_all(temp.path().join("real")).unwrap();
      fs::create_dir_all(temp.path().join("gen")).unwrap();
      Self { temp }
    }

    fn real(&self) -> PathBuf {
      dunce::canonicalize(self.temp.path().join("real")).unwrap()
    }

    fn generated(&self) -> PathBuf {
      dunce::canonicalize(self.temp.path().join("gen")).unwrap()
    }

    fn target(&self) -> PathBuf {
      self.temp.path().join("workspace")
    }

    fn write(&self, root: &str, rel: &str, content: &str) {
      let path = self.temp.path().join(root).join(rel);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, content).unwrap();
    }

    fn plant(&self, excludes: &[&str]) -> Vec<PathBuf> {
      plant(&self.real(), &self.generated(), &self.target(), excludes).unwrap()
    }

    /// Relative path -> symlink target (None for real directories).
    fn snapshot(&self) -> BTreeMap<PathBuf, Option<PathBuf>> {
      let target = self.target();
      WalkDir::new(&target)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
          let rel = e.path().strip_prefix(&target).unwrap().to_path_buf();
          let link = if e.path_is_symlink() {
            Some(fs::read_link(e.path()).unwrap())
          } else {
            None
          };
          (rel, link)
        })
        .collect()
    }
  }

  #[test]
  fn generated_file_shadows_real_file() {
    let trees = Trees::new();
    trees.write("real", "a/b.txt", "real");
    trees.write("gen", "a/b.txt", "generated");

    trees.plant(&[]);

    let content = fs::read_to_string(trees.target().join("a/b.txt")).unwrap();
    assert_eq!(content, "generated");
  }

  #[test]
  fn unmerged_directories_are_linked_whole() {
    let trees = Trees::new();
    trees.write("real", "lib/x.c", "x");
    trees.write("real", "a/b.txt", "b");
    trees.write("gen", "a/BUILD.bazel", "build");
    trees.write("gen", "c/BUILD.bazel", "c");

    trees.plant(&[]);
    let snapshot = trees.snapshot();

    assert_eq!(
      snapshot.get(Path::new("lib")),
      Some(&Some(trees.real().join("lib")))
    );
    assert_eq!(snapshot.get(Path::new("c")), Some(&Some(trees.generated().join("c"))));
    assert_eq!(snapshot.get(Path::new("a")), Some(&None));
    assert_eq!(
      snapshot.get(Path::new("a/b.txt")),
      Some(&Some(trees.real().join("a/b.txt")))
    );
    assert_eq!(
      snapshot.get(Path::new("a/BUILD.bazel")),
      Some(&Some(trees.generated().join("a/BUILD.bazel")))
    );
    // The whole-linked directory is not walked into.
    assert!(!snapshot.contains_key(Path::new("lib/x.c")));
  }

  #[test]
  fn excluded_paths_are_omitted_and_parents_split() {
    let trees = Trees::new();
    trees.write("real", "external/tool/keep.txt", "k");
    trees.write("real", "external/tool/loop/x", "x");
    trees.write("real", "bazel-out/junk", "j");

    trees.plant(&["bazel-out", "external/tool/loop"]);
    let snapshot = trees.snapshot();

    assert!(!snapshot.contains_key(Path::new("bazel-out")));
    assert_eq!(snapshot.get(Path::new("external")), Some(&None));
    assert_eq!(snapshot.get(Path::new("external/tool")), Some(&None));
    assert!(snapshot.contains_key(Path::new("external/tool/keep.txt")));
    assert!(!snapshot.contains_key(Path::new("external/tool/loop")));
  }

  #[test]
  fn excludes_apply_inside_generated_only_directories() {
    let trees = Trees::new();
    trees.write("gen", "c/secret/x", "x");
    trees.write("gen", "c/BUILD.bazel", "build");

    trees.plant(&["c/secret"]);
    let snapshot = trees.snapshot();

    assert_eq!(snapshot.get(Path::new("c")), Some(&None));
    assert_eq!(
      snapshot.get(Path::new("c/BUILD.bazel")),
      Some(&Some(trees.generated().join("c/BUILD.bazel")))
    );
    assert!(!snapshot.contains_key(Path::new("c/secret")));
    assert!(!trees.target().join("c/secret/x").exists());
  }

  #[test]
  fn planting_twice_is_idempotent() {
    let trees = Trees::new();
    trees.write("real", "a/b.txt", "b");
    trees.write("real", "d/e.txt", "e");
    trees.write("gen", "a/BUILD.bazel", "build");

    let first_visited = trees.plant(&["d/e.txt"]);
    let first = trees.snapshot();
    let second_visited = trees.plant(&["d/e.txt"]);
    let second = trees.snapshot();

    assert_eq!(first, second);
    assert_eq!(first_visited, second_visited);
  }

  #[test]
  fn changed_excludes_remove_stale_entries() {
    let trees = Trees::new();
    trees.write("real", "keep/a.txt", "a");
    trees.write("real", "drop/b.txt", "b");

    trees.plant(&[]);
    assert!(trees.snapshot().contains_key(Path::new("drop")));

    trees.plant(&["drop"]);
    let snapshot = trees.snapshot();
    assert!(!snapshot.contains_key(Path::new("drop")));
    assert!(snapshot.contains_key(Path::new("keep")));
  }

  #[test]
  fn visited_lists_every_directory_read() {
    let trees = Trees::new();
    trees.write("real", "a/b.txt", "b");
    trees.write("real", "lib/x.c", "x");
    trees.write("gen", "a/BUILD.bazel", "build");

    let visited = trees.plant(&[]);

    assert!(visited.contains(&trees.real()));
    assert!(visited.contains(&trees.generated()));
    assert!(visited.contains(&trees.real().join("a")));
    assert!(visited.contains(&trees.generated().join("a")));
    // Linked as a whole, never read.
    assert!(!visited.contains(&trees.real().join("lib")));
  }

  #[test]
  fn missing_generated_root_links_everything_from_real() {
    let trees = Trees::new();
    trees.write("real", "a/b.txt", "b");
    let missing = trees.temp.path().join("no-such-gen");

    plant(&trees.real(), &missing, &trees.target(), &[] as &[&str]).unwrap();

    assert_eq!(
      trees.snapshot().get(Path::new("a")),
      Some(&Some(trees.real().join("a")))
    );
  }

  #[test]
  fn generated_file_wins_over_real_directory() {
    let trees = Trees::new();
    trees.write("real", "pkg/inner.txt", "i");
    trees.write("gen", "pkg", "generated file");

    trees.plant(&[]);

    assert_eq!(
      fs::read_to_string(trees.target().join("pkg")).unwrap(),
      "generated file"
    );
  }

  #[test]
  fn exclude_tree_ignores_dot_and_empty_components() {
    let tree = ExcludeNode::from_paths(&[".", "", "a//b", "./c"]);
    assert!(!tree.excluded);
    assert!(tree.children["a"].children["b"].excluded);
    assert!(!tree.children["a"].excluded);
    assert!(tree.children["c"].excluded);
  }
}
