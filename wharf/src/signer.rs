//! Per-block signature computation
//!
//! <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/pwr/signature.go>

use crate::common::BLOCK_SIZE;
use crate::container::ContainerItem;
use crate::error::WharfError;
use crate::protos::{pwr, tlc};
use crate::rolling::weak_hash;

use md5::{Digest, Md5};
use std::io::Read;
use std::path::Path;

fn hash_block(hasher: &mut Md5, buf: &[u8]) -> pwr::BlockHash {
  hasher.update(buf);

  pwr::BlockHash {
    weak_hash: weak_hash(buf),
    strong_hash: hasher.finalize_reset().to_vec(),
  }
}

/// Compute the block signature of every file in `container`, reading file
/// contents from `base_path`
///
/// # Errors
///
/// If a file cannot be opened or read
pub fn compute_signature(
  container: &tlc::Container,
  base_path: &Path,
  mut progress: impl FnMut(u64),
) -> Result<Vec<pwr::BlockHash>, WharfError> {
  let mut hashes = Vec::with_capacity(container.file_blocks() as usize);

  compute_signature_to_writer(container, base_path, &mut progress, |hash| {
    hashes.push(hash);
    Ok(())
  })?;

  Ok(hashes)
}

/// Compute the block signature of every file in `container`, invoking `on_hash`
/// as each block is hashed instead of collecting them into a `Vec`
///
/// Used directly by the `sign` CLI command and by the diff driver's signer half.
///
/// # Errors
///
/// If a file cannot be opened or read, or if `on_hash` returns an error
pub fn compute_signature_to_writer(
  container: &tlc::Container,
  base_path: &Path,
  mut progress: impl FnMut(u64),
  mut on_hash: impl FnMut(pwr::BlockHash) -> Result<(), WharfError>,
) -> Result<(), WharfError> {
  let mut buffer = vec![0u8; BLOCK_SIZE as usize];
  let mut hasher = Md5::new();

  for file in &container.files {
    let file_path = file
      .get_path(base_path.to_owned())
      .map_err(WharfError::Consistency)?;

    let mut reader = std::fs::File::open(&file_path)
      .map(std::io::BufReader::new)
      .map_err(|e| WharfError::io(format!("opening {}", file_path.display()), e))?;

    let file_size = file.size as u64;
    let mut block_index: u64 = 0;

    loop {
      let block_start = block_index * BLOCK_SIZE;
      let block_end = (block_start + BLOCK_SIZE).min(file_size);
      let block_len = (block_end - block_start) as usize;

      // An empty file still yields exactly one (empty) hash block
      if block_len == 0 && block_index > 0 {
        break;
      }

      let buf = &mut buffer[..block_len];
      reader
        .read_exact(buf)
        .map_err(|e| WharfError::io(format!("signing {}", file_path.display()), e))?;

      on_hash(hash_block(&mut hasher, buf))?;
      progress(block_len as u64);

      if block_end >= file_size {
        break;
      }

      block_index += 1;
    }
  }

  Ok(())
}

/// Hash a single stream of known size into block hashes
///
/// Shares the block-splitting logic of [`compute_signature_to_writer`] but reads
/// from an arbitrary [`Read`] rather than opening a file by path — used by the
/// diff driver's signing half, which tees a pool reader's bytes in over a channel.
///
/// # Errors
///
/// If the reader fails, or `on_hash` returns an error
pub(crate) fn hash_blocks_from_reader(
  mut reader: impl Read,
  size: u64,
  mut on_hash: impl FnMut(pwr::BlockHash) -> Result<(), String>,
) -> Result<(), String> {
  let mut buffer = vec![0u8; BLOCK_SIZE as usize];
  let mut hasher = Md5::new();
  let mut block_index: u64 = 0;

  loop {
    let block_start = block_index * BLOCK_SIZE;
    let block_end = (block_start + BLOCK_SIZE).min(size);
    let block_len = (block_end - block_start) as usize;

    if block_len == 0 && block_index > 0 {
      break;
    }

    let buf = &mut buffer[..block_len];
    reader
      .read_exact(buf)
      .map_err(|e| format!("Couldn't read block from diff source!\n{e}"))?;

    on_hash(hash_block(&mut hasher, buf))?;

    if block_end >= size {
      break;
    }

    block_index += 1;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::container::mask_mode;

  #[test]
  fn empty_file_yields_one_block() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("empty.bin"), []).unwrap();

    let container = tlc::Container {
      size: 0,
      files: vec![tlc::File {
        path: "empty.bin".to_string(),
        mode: mask_mode(0o644),
        size: 0,
      }],
      dirs: vec![],
      symlinks: vec![],
    };

    let hashes = compute_signature(&container, dir.path(), |_| {}).unwrap();
    assert_eq!(hashes.len(), 1);
  }

  #[test]
  fn multi_block_file_yields_expected_block_count() {
    let dir = tempfile::tempdir().unwrap();
    let data = vec![7u8; (BLOCK_SIZE * 2 + 10) as usize];
    std::fs::write(dir.path().join("data.bin"), &data).unwrap();

    let container = tlc::Container {
      size: data.len() as i64,
      files: vec![tlc::File {
        path: "data.bin".to_string(),
        mode: mask_mode(0o644),
        size: data.len() as i64,
      }],
      dirs: vec![],
      symlinks: vec![],
    };

    let hashes = compute_signature(&container, dir.path(), |_| {}).unwrap();
    assert_eq!(hashes.len(), 3);
  }
}
