use super::{BlockHasherStatus, FileBlockHasher};

use std::io::{self, Read, Write};

/// Wraps a writer so that every byte written through it is also fed into a
/// [`FileBlockHasher`], checking each completed block against the expected
/// hash as the data is written rather than only after the fact.
pub struct HashWriter<'hasher, 'hasher_reader, 'w, R, W> {
  writer: &'w mut W,
  hasher: FileBlockHasher<'hasher, 'hasher_reader, R>,
}

impl<'hasher, 'hasher_reader, 'w, R, W> HashWriter<'hasher, 'hasher_reader, 'w, R, W> {
  pub(crate) fn new(writer: &'w mut W, hasher: FileBlockHasher<'hasher, 'hasher_reader, R>) -> Self {
    Self { writer, hasher }
  }
}

impl<R: Read, W> HashWriter<'_, '_, '_, R, W> {
  /// Finalize the current (possibly short) trailing block of this file
  pub fn finalize_block(&mut self) -> Result<(), String> {
    match self.hasher.finalize_block().map_err(|e| e.to_string())? {
      BlockHasherStatus::Ok => Ok(()),
      BlockHasherStatus::HashMismatch { expected, found } => Err(format!(
        "Hash mismatch while finalizing block!\n  expected: {expected:x?}\n  found: {found:x?}"
      )),
    }
  }
}

impl<R: Read, W: Write> Write for HashWriter<'_, '_, '_, R, W> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let written = self.writer.write(buf)?;

    match self.hasher.update(&buf[..written]) {
      Ok(BlockHasherStatus::Ok) => Ok(written),
      Ok(BlockHasherStatus::HashMismatch { expected, found }) => Err(io::Error::other(format!(
        "Hash mismatch while writing!\n  expected: {expected:x?}\n  found: {found:x?}"
      ))),
      Err(e) => Err(io::Error::other(e.to_string())),
    }
  }

  fn flush(&mut self) -> io::Result<()> {
    self.writer.flush()
  }

  fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
    self.writer.write_all(buf)?;

    match self.hasher.update(buf) {
      Ok(BlockHasherStatus::Ok) => Ok(()),
      Ok(BlockHasherStatus::HashMismatch { expected, found }) => Err(io::Error::other(format!(
        "Hash mismatch while writing!\n  expected: {expected:x?}\n  found: {found:x?}"
      ))),
      Err(e) => Err(io::Error::other(e.to_string())),
    }
  }
}
