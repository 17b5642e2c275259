//! Sources of per-file readers over a container's files
//!
//! <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/vendor/github.com/itchio/wharf/pools/blockpool/disksource.go>

use crate::container::ContainerItem;
use crate::error::WharfError;
use crate::protos::tlc;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

/// A source of independent readers over the files of a container
///
/// A pool produces a *new* reader on every [`Pool::get_reader`] call rather than
/// requiring the pool itself to be cloned per consumer — this lets a diff
/// driver fan a single file out to its differ and signer without either one
/// fighting the other over a shared cursor.
pub trait Pool {
  /// Open an independent reader over the content of the file at `file_index`
  ///
  /// # Errors
  ///
  /// If the file index is invalid or the underlying source cannot be opened
  fn get_reader(&self, file_index: usize) -> Result<Box<dyn Read + Send>, WharfError>;

  /// Release any resources held by the pool
  ///
  /// # Errors
  ///
  /// If releasing the underlying resources fails
  fn close(&mut self) -> Result<(), WharfError> {
    Ok(())
  }
}

/// A [`Pool`] that reads container files straight from a build directory on disk
#[derive(Debug, Clone)]
pub struct FolderPool {
  container: Arc<tlc::Container>,
  base_path: PathBuf,
}

impl FolderPool {
  #[must_use]
  pub fn new(container: Arc<tlc::Container>, base_path: PathBuf) -> Self {
    Self {
      container,
      base_path,
    }
  }
}

impl Pool for FolderPool {
  fn get_reader(&self, file_index: usize) -> Result<Box<dyn Read + Send>, WharfError> {
    let file = self
      .container
      .get_file(file_index)
      .map_err(WharfError::Consistency)?;

    let file_path = file
      .get_path(self.base_path.clone())
      .map_err(WharfError::Consistency)?;

    std::fs::File::open(&file_path)
      .map(|f| Box::new(f) as Box<dyn Read + Send>)
      .map_err(|e| WharfError::io(format!("opening pool file {}", file_path.display()), e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::container::mask_mode;

  #[test]
  fn folder_pool_reads_back_file_content() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

    let container = Arc::new(tlc::Container {
      size: 5,
      files: vec![tlc::File {
        path: "a.txt".to_string(),
        mode: mask_mode(0o644),
        size: 5,
      }],
      dirs: vec![],
      symlinks: vec![],
    });

    let pool = FolderPool::new(container, dir.path().to_owned());
    let mut reader = pool.get_reader(0).unwrap();

    let mut contents = Vec::new();
    reader.read_to_end(&mut contents).unwrap();
    assert_eq!(contents, b"hello");
  }
}
