//! Rolling-window block matcher: the core of the binary diff algorithm
//!
//! <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/pwr/diff.go>
//! <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/wsync/index.go>

use crate::common::BLOCK_SIZE;
use crate::library::BlockLibrary;
use crate::rolling::RollingHash;

use md5::{Digest, Md5};
use std::collections::VecDeque;
use std::io::Read;

/// One operation in the sequence that reconstructs a new file from an old one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
  /// Copy `block_span` consecutive blocks starting at `block_index` from
  /// `file_index` in the old container
  BlockRange {
    file_index: i64,
    block_index: i64,
    block_span: i64,
  },

  /// Literal bytes with no match in the old container
  Data(Vec<u8>),
}

/// Scan `reader`'s content against `library`, emitting a minimal sequence of
/// [`DiffOp`]s via `write_op`
///
/// `preferred_file_index` identifies the position of this file in the new
/// container; when the library holds more than one candidate for a matched
/// block, a candidate at the same index in the old container is preferred,
/// matching the "files rarely move" assumption the original algorithm makes.
///
/// # Errors
///
/// If `reader` fails, or `write_op` returns an error
pub fn diff_stream(
  mut reader: impl Read,
  library: &BlockLibrary,
  preferred_file_index: i64,
  mut write_op: impl FnMut(DiffOp) -> Result<(), String>,
) -> Result<(), String> {
  let block_size = BLOCK_SIZE as usize;
  let mut window: VecDeque<u8> = VecDeque::with_capacity(block_size);
  let mut pending_data: Vec<u8> = Vec::new();
  let mut pending_range: Option<(i64, i64, i64)> = None;
  let mut hasher = Md5::new();

  fill_window(&mut reader, &mut window, block_size)?;

  if window.is_empty() {
    return Ok(());
  }

  let mut rolling = {
    let (a, b) = window.as_slices();
    let mut combined = Vec::with_capacity(window.len());
    combined.extend_from_slice(a);
    combined.extend_from_slice(b);
    RollingHash::new(&combined)
  };

  loop {
    // A window shorter than a full block only ever occurs once the reader is
    // exhausted (the true tail of the file); the library keys a file's final
    // block by its actual byte length, so the short window is still a valid
    // lookup key, just not one the incremental rolling hash stays valid for
    // once the window has started shrinking.
    let full_block = window.len() == block_size;

    let matched = if window.is_empty() {
      None
    } else {
      let weak = if full_block {
        rolling.value()
      } else {
        let (a, b) = window.as_slices();
        let mut combined = Vec::with_capacity(window.len());
        combined.extend_from_slice(a);
        combined.extend_from_slice(b);
        crate::rolling::weak_hash(&combined)
      };

      if library.may_contain(weak) {
        let (a, b) = window.as_slices();
        hasher.update(a);
        hasher.update(b);
        let strong = hasher.finalize_reset();
        library.find(weak, &strong, preferred_file_index)
      } else {
        None
      }
    };

    if let Some(candidate) = matched {
      flush_pending_data(&mut pending_data, &mut write_op)?;

      match &mut pending_range {
        Some((file_index, start_block, span))
          if *file_index == candidate.file_index
            && *start_block + *span == candidate.block_index =>
        {
          *span += 1;
        }
        _ => {
          flush_pending_range(&mut pending_range, &mut write_op)?;
          pending_range = Some((candidate.file_index, candidate.block_index, 1));
        }
      }

      window.clear();
      fill_window(&mut reader, &mut window, block_size)?;

      if window.is_empty() {
        break;
      }

      rolling = {
        let (a, b) = window.as_slices();
        let mut combined = Vec::with_capacity(window.len());
        combined.extend_from_slice(a);
        combined.extend_from_slice(b);
        RollingHash::new(&combined)
      };

      continue;
    }

    flush_pending_range(&mut pending_range, &mut write_op)?;

    let Some(leaving) = window.pop_front() else {
      break;
    };
    pending_data.push(leaving);

    let mut next_byte = [0u8; 1];
    match reader.read(&mut next_byte) {
      Ok(0) => {
        if window.is_empty() {
          break;
        }
        // Window shrank below a full block; keep draining it as literal data.
      }
      Ok(_) => {
        window.push_back(next_byte[0]);
        rolling.roll(leaving, next_byte[0]);
      }
      Err(e) => return Err(format!("Couldn't read from diff source!\n{e}")),
    }
  }

  // Anything left in the window at EOF is literal data
  pending_data.extend(window.iter().copied());
  flush_pending_range(&mut pending_range, &mut write_op)?;
  flush_pending_data(&mut pending_data, &mut write_op)?;

  Ok(())
}

fn fill_window(
  reader: &mut impl Read,
  window: &mut VecDeque<u8>,
  block_size: usize,
) -> Result<(), String> {
  let mut buf = vec![0u8; block_size];
  let mut filled = 0;

  while filled < block_size {
    match reader.read(&mut buf[filled..]) {
      Ok(0) => break,
      Ok(n) => filled += n,
      Err(e) => return Err(format!("Couldn't read from diff source!\n{e}")),
    }
  }

  window.extend(&buf[..filled]);
  Ok(())
}

/// Literal `DATA` payloads are chunked to this many bytes, the same unit the
/// rest of the wire format already buffers in, rather than emitted as one
/// unbounded op spanning an entire unmatched file.
const MAX_DATA_OP_SIZE: usize = BLOCK_SIZE as usize;

fn flush_pending_data(
  pending_data: &mut Vec<u8>,
  write_op: &mut impl FnMut(DiffOp) -> Result<(), String>,
) -> Result<(), String> {
  for chunk in pending_data.chunks(MAX_DATA_OP_SIZE) {
    write_op(DiffOp::Data(chunk.to_vec()))?;
  }
  pending_data.clear();
  Ok(())
}

fn flush_pending_range(
  pending_range: &mut Option<(i64, i64, i64)>,
  write_op: &mut impl FnMut(DiffOp) -> Result<(), String>,
) -> Result<(), String> {
  if let Some((file_index, block_index, block_span)) = pending_range.take() {
    write_op(DiffOp::BlockRange {
      file_index,
      block_index,
      block_span,
    })?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::container::mask_mode;
  use crate::protos::tlc;
  use crate::signer::compute_signature;

  fn signature_of(data: &[u8]) -> (tlc::Container, Vec<crate::protos::pwr::BlockHash>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.bin"), data).unwrap();

    let container = tlc::Container {
      size: data.len() as i64,
      files: vec![tlc::File {
        path: "a.bin".to_string(),
        mode: mask_mode(0o644),
        size: data.len() as i64,
      }],
      dirs: vec![],
      symlinks: vec![],
    };

    let hashes = compute_signature(&container, dir.path(), |_| {}).unwrap();
    (container, hashes)
  }

  #[test]
  fn identical_content_yields_a_single_block_range() {
    let data = vec![42u8; (BLOCK_SIZE * 2) as usize];
    let (container, hashes) = signature_of(&data);
    let library = BlockLibrary::new(&container, &hashes);

    let mut ops = Vec::new();
    diff_stream(data.as_slice(), &library, 0, |op| {
      ops.push(op);
      Ok(())
    })
    .unwrap();

    assert_eq!(
      ops,
      vec![DiffOp::BlockRange {
        file_index: 0,
        block_index: 0,
        block_span: 2,
      }]
    );
  }

  #[test]
  fn unrelated_content_yields_only_data_ops() {
    let (container, hashes) = signature_of(&[1, 2, 3, 4, 5]);
    let library = BlockLibrary::new(&container, &hashes);

    let new_data = vec![9u8; 32];
    let mut ops = Vec::new();
    diff_stream(new_data.as_slice(), &library, 0, |op| {
      ops.push(op);
      Ok(())
    })
    .unwrap();

    assert!(
      ops.iter()
        .all(|op| matches!(op, DiffOp::Data(_)))
    );
    assert!(!ops.is_empty());
  }
}
