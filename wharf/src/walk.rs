//! Directory tree walker producing a container listing
//!
//! <https://github.com/itchio/butler/blob/master/cmd/push/walk.go>
//! <https://github.com/itchio/butler/blob/master/wharf_ops.go>

use crate::container::mask_mode;
use crate::error::WharfError;
use crate::protos::tlc;

use std::fs;
use std::path::{Path, PathBuf};

/// Directory name prefixes skipped by [`default_filter`]
///
/// <https://github.com/itchio/butler/blob/master/wharf_ops.go>
const IGNORED_DIR_PREFIXES: &[&str] = &[".git", ".cvs", ".svn"];

/// The default path filter: skips version-control metadata directories
#[must_use]
pub fn default_filter(path: &Path) -> bool {
  !path.components().any(|c| {
    let name = c.as_os_str().to_string_lossy();
    IGNORED_DIR_PREFIXES
      .iter()
      .any(|prefix| name.starts_with(prefix))
  })
}

/// Options controlling how a directory tree is walked into a container
pub struct WalkOpts {
  /// Returns `false` for paths (relative to the walk root) that should be excluded
  pub filter: Box<dyn Fn(&Path) -> bool>,

  /// Whether symlinks should be followed and recorded as the files/dirs they
  /// point to, rather than as symlink entries
  pub dereference: bool,
}

impl Default for WalkOpts {
  fn default() -> Self {
    Self {
      filter: Box::new(default_filter),
      dereference: false,
    }
  }
}

struct WalkAccumulator {
  files: Vec<tlc::File>,
  dirs: Vec<tlc::Dir>,
  symlinks: Vec<tlc::Symlink>,
  total_size: i64,
}

/// Recursively walk `root`, producing a container with canonically sorted entries
///
/// Paths recorded in the container are relative to `root` and use `/` separators.
///
/// # Errors
///
/// If `root` cannot be read, or a nested entry cannot be stat'd
pub fn walk(root: &Path, opts: &WalkOpts) -> Result<tlc::Container, WharfError> {
  let mut acc = WalkAccumulator {
    files: Vec::new(),
    dirs: Vec::new(),
    symlinks: Vec::new(),
    total_size: 0,
  };

  walk_dir(root, Path::new(""), opts, &mut acc)?;

  acc.files.sort_by(|a, b| a.path.cmp(&b.path));
  acc.dirs.sort_by(|a, b| a.path.cmp(&b.path));
  acc.symlinks.sort_by(|a, b| a.path.cmp(&b.path));

  Ok(tlc::Container {
    size: acc.total_size,
    files: acc.files,
    dirs: acc.dirs,
    symlinks: acc.symlinks,
  })
}

fn relative_path_str(rel: &Path) -> String {
  rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join("/")
}

fn walk_dir(
  abs_dir: &Path,
  rel_dir: &Path,
  opts: &WalkOpts,
  acc: &mut WalkAccumulator,
) -> Result<(), WharfError> {
  let entries = fs::read_dir(abs_dir)
    .map_err(|e| WharfError::io(format!("reading directory {}", abs_dir.display()), e))?;

  for entry in entries {
    let entry =
      entry.map_err(|e| WharfError::io(format!("reading directory {}", abs_dir.display()), e))?;

    let abs_path = entry.path();
    let rel_path = rel_dir.join(entry.file_name());

    if !(opts.filter)(&rel_path) {
      continue;
    }

    let metadata = if opts.dereference {
      fs::metadata(&abs_path)
    } else {
      fs::symlink_metadata(&abs_path)
    }
    .map_err(|e| WharfError::io(format!("reading metadata for {}", abs_path.display()), e))?;

    let path_str = relative_path_str(&rel_path);

    if metadata.is_dir() {
      acc.dirs.push(tlc::Dir {
        path: path_str,
        mode: mask_mode(unix_mode(&metadata)),
      });

      walk_dir(&abs_path, &rel_path, opts, acc)?;
    } else if metadata.is_symlink() {
      let dest = fs::read_link(&abs_path)
        .map_err(|e| WharfError::io(format!("reading symlink {}", abs_path.display()), e))?;

      acc.symlinks.push(tlc::Symlink {
        path: path_str,
        mode: mask_mode(unix_mode(&metadata)),
        dest: dest.to_string_lossy().into_owned(),
      });
    } else {
      let size = metadata.len() as i64;
      acc.total_size += size;

      acc.files.push(tlc::File {
        path: path_str,
        mode: mask_mode(unix_mode(&metadata)),
        size,
      });
    }
  }

  Ok(())
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode()
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &fs::Metadata) -> u32 {
  0o644
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn walk_skips_ignored_directories_and_sorts_entries() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".git")).unwrap();
    fs::write(dir.path().join(".git/HEAD"), b"ref: refs/heads/main").unwrap();
    fs::create_dir_all(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();
    fs::write(dir.path().join("a.txt"), b"aa").unwrap();

    let container = walk(dir.path(), &WalkOpts::default()).unwrap();

    assert_eq!(container.files.len(), 2);
    assert_eq!(container.files[0].path, "a.txt");
    assert_eq!(container.files[1].path, "sub/b.txt");
    assert_eq!(container.size, 3);
    assert!(container.dirs.iter().any(|d| d.path == "sub"));
    assert!(!container.dirs.iter().any(|d| d.path.contains(".git")));
  }

  #[test]
  fn default_filter_rejects_version_control_metadata() {
    assert!(!default_filter(Path::new(".git")));
    assert!(!default_filter(Path::new("sub/.svn")));
    assert!(default_filter(Path::new("sub/file.txt")));
  }
}
