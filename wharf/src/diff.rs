//! Concurrent diff driver tying the walker, pool, block library, differ and
//! signer together into a single patch + signature pass
//!
//! <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/pwr/diff.go>

use crate::differ::{self, DiffOp};
use crate::error::{IntoWharfError, WharfError};
use crate::library::BlockLibrary;
use crate::patch;
use crate::pool::Pool;
use crate::protos::{encode_protobuf, pwr, tlc};
use crate::signature;
use crate::signer;

use std::io::{Read, Write};
use std::sync::mpsc;

/// Adapts a channel of byte chunks into a [`Read`] stream
///
/// Stands in for the pipe a tee would use in languages with first-class
/// bidirectional pipes: one end is fed chunk by chunk from the driver's tee
/// loop, the other is read from by a differ or signer thread exactly as if it
/// were reading the file itself.
struct ChannelReader {
  rx: mpsc::Receiver<Vec<u8>>,
  pending: Vec<u8>,
  pos: usize,
}

impl ChannelReader {
  fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
    Self {
      rx,
      pending: Vec::new(),
      pos: 0,
    }
  }
}

impl Read for ChannelReader {
  fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
      if self.pos < self.pending.len() {
        let n = (self.pending.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        return Ok(n);
      }

      match self.rx.recv() {
        Ok(chunk) => {
          self.pending = chunk;
          self.pos = 0;
        }
        // Sender dropped: the tee loop has finished, signal EOF
        Err(_) => return Ok(0),
      }
    }
  }
}

/// Drives a full diff between an old build and a new build, producing both a
/// patch and the new build's signature in a single pass over the new files
pub struct DiffContext<P: Pool + Send + Sync> {
  pub compression: pwr::CompressionSettings,
  pub old_container: tlc::Container,
  pub old_signature: Vec<pwr::BlockHash>,
  pub new_container: tlc::Container,
  pub new_pool: P,

  /// Optional hook consulted before a literal `Data` op is emitted, to look up
  /// whether identical bytes are already available under a content address
  /// elsewhere. Reserved for a future wire message capable of referencing such
  /// a lookup; the current sync op set has no op to carry its result, so it is
  /// never invoked by [`Self::write_patch`] yet.
  pub data_lookup: Option<Box<dyn Fn(&[u8]) -> Result<Option<String>, WharfError> + Send + Sync>>,

  pub reused_bytes: u64,
  pub fresh_bytes: u64,
  pub saved_bytes: u64,
}

impl<P: Pool + Send + Sync> DiffContext<P> {
  #[must_use]
  pub fn new(
    compression: pwr::CompressionSettings,
    old_container: tlc::Container,
    old_signature: Vec<pwr::BlockHash>,
    new_container: tlc::Container,
    new_pool: P,
  ) -> Self {
    Self {
      compression,
      old_container,
      old_signature,
      new_container,
      new_pool,
      data_lookup: None,
      reused_bytes: 0,
      fresh_bytes: 0,
      saved_bytes: 0,
    }
  }

  /// Diff every file in the new container against the old build's signature,
  /// writing a patch and the new build's signature as the pass proceeds
  ///
  /// Each file is read once from `new_pool` and teed, in its own scope, to an
  /// independent differ thread and signer thread so the two can run
  /// concurrently instead of scanning the file twice.
  ///
  /// `progress` is called with the fraction (0.0 to 1.0) of new-container
  /// bytes processed so far.
  ///
  /// # Errors
  ///
  /// If a file cannot be read from `new_pool`, the differ or signer thread
  /// panics, or either writer fails
  pub fn write_patch(
    &mut self,
    patch_writer: &mut impl Write,
    signature_writer: &mut impl Write,
    mut progress: impl FnMut(f64),
  ) -> Result<(), WharfError> {
    let library = BlockLibrary::new(&self.old_container, &self.old_signature);

    let old_index_by_path: std::collections::HashMap<&str, i64> = self
      .old_container
      .files
      .iter()
      .enumerate()
      .map(|(index, file)| (file.path.as_str(), index as i64))
      .collect();

    let mut patch_body = patch::write::write_header(
      patch_writer,
      &self.compression,
      &self.old_container,
      &self.new_container,
    )
    .format_err()?;

    let mut signature_body =
      signature::write::write_header(signature_writer, &self.compression, &self.new_container)
        .format_err()?;

    let total_bytes = self.new_container.file_bytes().max(1) as f64;
    let mut processed_bytes: u64 = 0;

    for file_index in 0..self.new_container.files.len() {
      let file = self.new_container.files[file_index].clone();
      let preferred_file_index = old_index_by_path
        .get(file.path.as_str())
        .copied()
        .unwrap_or(-1);
      let (ops, hashes) =
        self.diff_one_file(file_index, &file, preferred_file_index, &library)?;

      encode_protobuf(
        &pwr::SyncHeader {
          file_index: file_index as i64,
        },
        &mut patch_body,
      )
      .format_err()?;

      for op in ops {
        self.account_op(&op);
        encode_protobuf(&diff_op_to_sync_op(op), &mut patch_body).format_err()?;
      }

      encode_protobuf(
        &pwr::SyncOp {
          r#type: pwr::sync_op::Type::HeyYouDidIt as i32,
          ..Default::default()
        },
        &mut patch_body,
      )
      .format_err()?;

      for hash in hashes {
        encode_protobuf(&hash, &mut signature_body).format_err()?;
      }

      processed_bytes += file.size as u64;
      progress(processed_bytes as f64 / total_bytes);
    }

    patch_body.finish().format_err()?;
    signature_body.finish().format_err()?;

    Ok(())
  }

  /// Alias of [`Self::write_patch`]; the wharf tooling has historically
  /// called this operation both "writing a patch" and "writing a recipe"
  pub fn write_recipe(
    &mut self,
    patch_writer: &mut impl Write,
    signature_writer: &mut impl Write,
    progress: impl FnMut(f64),
  ) -> Result<(), WharfError> {
    self.write_patch(patch_writer, signature_writer, progress)
  }

  fn account_op(&mut self, op: &DiffOp) {
    match op {
      DiffOp::BlockRange {
        file_index,
        block_index,
        block_span,
      } => {
        let file_size = self.old_container.files[*file_index as usize].size;
        let mut tail_size = crate::common::BLOCK_SIZE as i64;
        if block_index + block_span >= num_blocks(file_size) {
          tail_size = last_block_size(file_size);
        }
        let bytes = crate::common::BLOCK_SIZE as i64 * (block_span - 1) + tail_size;
        self.reused_bytes += bytes as u64;
      }
      DiffOp::Data(data) => {
        self.fresh_bytes += data.len() as u64;
      }
    }
  }

  fn diff_one_file(
    &self,
    file_index: usize,
    file: &tlc::File,
    preferred_file_index: i64,
    library: &BlockLibrary,
  ) -> Result<(Vec<DiffOp>, Vec<pwr::BlockHash>), WharfError> {
    let (diff_tx, diff_rx) = mpsc::sync_channel::<Vec<u8>>(4);
    let (sign_tx, sign_rx) = mpsc::sync_channel::<Vec<u8>>(4);
    let file_size = file.size as u64;

    std::thread::scope(|scope| -> Result<(Vec<DiffOp>, Vec<pwr::BlockHash>), WharfError> {
      let diff_handle = scope.spawn(move || -> Result<Vec<DiffOp>, String> {
        let reader = ChannelReader::new(diff_rx);
        let mut ops = Vec::new();
        differ::diff_stream(reader, library, preferred_file_index, |op| {
          ops.push(op);
          Ok(())
        })?;
        Ok(ops)
      });

      let sign_handle = scope.spawn(move || -> Result<Vec<pwr::BlockHash>, String> {
        let reader = ChannelReader::new(sign_rx);
        let mut hashes = Vec::new();
        signer::hash_blocks_from_reader(reader, file_size, |hash| {
          hashes.push(hash);
          Ok(())
        })?;
        Ok(hashes)
      });

      let tee_result = (|| -> Result<(), WharfError> {
        let mut pool_reader = self.new_pool.get_reader(file_index)?;
        let mut buf = [0u8; 65536];

        loop {
          let n = pool_reader
            .read(&mut buf)
            .map_err(|e| WharfError::io(format!("reading new file {}", file.path), e))?;

          if n == 0 {
            break;
          }

          if diff_tx.send(buf[..n].to_vec()).is_err() || sign_tx.send(buf[..n].to_vec()).is_err()
          {
            return Err(WharfError::Cancelled);
          }
        }

        Ok(())
      })();

      drop(diff_tx);
      drop(sign_tx);

      let ops = diff_handle
        .join()
        .map_err(|_| WharfError::Consistency("differ thread panicked".to_string()))?
        .format_err()?;

      let hashes = sign_handle
        .join()
        .map_err(|_| WharfError::Consistency("signer thread panicked".to_string()))?
        .format_err()?;

      tee_result?;

      Ok((ops, hashes))
    })
  }
}

fn num_blocks(file_size: i64) -> i64 {
  1 + (file_size - 1) / crate::common::BLOCK_SIZE as i64
}

fn last_block_size(file_size: i64) -> i64 {
  1 + (file_size - 1) % crate::common::BLOCK_SIZE as i64
}

fn diff_op_to_sync_op(op: DiffOp) -> pwr::SyncOp {
  match op {
    DiffOp::BlockRange {
      file_index,
      block_index,
      block_span,
    } => pwr::SyncOp {
      r#type: pwr::sync_op::Type::BlockRange as i32,
      file_index,
      block_index,
      block_span,
      data: Vec::new(),
    },
    DiffOp::Data(data) => pwr::SyncOp {
      r#type: pwr::sync_op::Type::Data as i32,
      file_index: 0,
      block_index: 0,
      block_span: 0,
      data,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::container::mask_mode;
  use crate::pool::FolderPool;
  use crate::protos::pwr::CompressionSettings;
  use std::sync::Arc;

  #[test]
  fn diffing_identical_builds_yields_only_block_range_ops() {
    let old_dir = tempfile::tempdir().unwrap();
    let new_dir = tempfile::tempdir().unwrap();
    let content = vec![3u8; 200_000];
    std::fs::write(old_dir.path().join("a.bin"), &content).unwrap();
    std::fs::write(new_dir.path().join("a.bin"), &content).unwrap();

    let container = tlc::Container {
      size: content.len() as i64,
      files: vec![tlc::File {
        path: "a.bin".to_string(),
        mode: mask_mode(0o644),
        size: content.len() as i64,
      }],
      dirs: vec![],
      symlinks: vec![],
    };

    let old_signature =
      signer::compute_signature(&container, old_dir.path(), |_| {}).unwrap();

    let new_pool = FolderPool::new(Arc::new(container.clone()), new_dir.path().to_owned());
    let mut ctx = DiffContext::new(
      CompressionSettings::none(),
      container.clone(),
      old_signature,
      container,
      new_pool,
    );

    let mut patch_bytes = Vec::new();
    let mut signature_bytes = Vec::new();
    ctx
      .write_patch(&mut patch_bytes, &mut signature_bytes, |_| {})
      .unwrap();

    assert!(ctx.reused_bytes > 0);
    assert_eq!(ctx.fresh_bytes, 0);
    assert!(!patch_bytes.is_empty());
    assert!(!signature_bytes.is_empty());
  }
}
