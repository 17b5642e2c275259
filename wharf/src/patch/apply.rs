mod rsync;

use super::{Patch, SyncHeader};
use crate::hasher::BlockHasher;
use crate::protos::*;
use crate::signature::BlockHashIter;

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

const MAX_OPEN_FILES_PATCH: std::num::NonZeroUsize = std::num::NonZeroUsize::new(16).unwrap();

/// Whether the file to be patched was actually rewritten, or recognized as an
/// exact copy of an existing old file and left untouched on disk
enum PatchFileStatus {
  Patched,
  Skipped,
}

impl<R: Read> SyncHeader<'_, R> {
  /// Apply all the patch operations in the given header and
  /// write them into `writer`
  fn patch_file(
    &mut self,
    writer: &mut impl Write,
    new_file_size: u64,
    old_files_cache: &mut lru::LruCache<usize, fs::File>,
    container_old: &tlc::Container,
    old_build_folder: &Path,
    progress_callback: &mut impl FnMut(u64),
  ) -> Result<PatchFileStatus, String> {
    // The first operation can be used to detect a literal copy of an old file
    let first = match self.op_iter.next() {
      Some(op) => op?,
      // Even an empty file is represented by an empty Data message, so the
      // iterator must always yield at least one operation before HeyYouDidIt
      None => {
        return Err("Expected the first SyncOp for this file, but received None?".to_string());
      }
    };

    if first.is_literal_copy(new_file_size, container_old)? {
      // Consume the delimiter so the iterator is left in the right place for the next file
      match self.op_iter.next() {
        None => (),
        _ => {
          return Err(
            "After detecting a literal copy in this SyncOp, another one was returned?".to_string(),
          );
        }
      }

      progress_callback(new_file_size);
      return Ok(PatchFileStatus::Skipped);
    }

    // Apply all the operations, not forgetting the first one obtained independently
    for op in std::iter::once(Ok(first)).chain(self.op_iter.by_ref()) {
      let op = op?;
      op.apply(
        writer,
        old_files_cache,
        container_old,
        old_build_folder,
        progress_callback,
      )?;
    }

    Ok(PatchFileStatus::Patched)
  }
}

impl Patch<'_> {
  /// Apply the patch operations to produce the new build.
  ///
  /// This creates all files, directories, and symlinks in `new_build_folder`,
  /// then applies each sync operation using data from `old_build_folder`.
  /// Written data is hashed on the fly and verified against `hash_iter` (if
  /// provided). `progress_callback` is invoked with the number of processed
  /// bytes as the patch is applied.
  ///
  /// # Arguments
  ///
  /// * `old_build_folder` - The path to the old build folder
  ///
  /// * `new_build_folder` - The path to the new build folder
  ///
  /// * `hash_iter` - Iterator over expected block hashes used to verify the
  ///   integrity of the written files (optional)
  ///
  /// * `progress_callback` - A callback that is called with the number of
  ///   bytes processed since the last one
  ///
  /// # Errors
  ///
  /// If there is an I/O failure while reading files or metadata, or if hash
  /// verification of the generated files fails
  pub fn apply(
    &mut self,
    old_build_folder: &Path,
    new_build_folder: &Path,
    hash_iter: Option<&mut BlockHashIter<impl Read>>,
    mut progress_callback: impl FnMut(u64),
  ) -> Result<(), String> {
    // Create the new container folders, files and symlinks,
    // applying all the correct permissions
    self.container_new.create(new_build_folder)?;

    // Create a cache of open file descriptors for the old files
    // The key is the file_index of the old file provided by the patch
    // The value is the open file descriptor
    let mut old_files_cache: lru::LruCache<usize, fs::File> =
      lru::LruCache::new(MAX_OPEN_FILES_PATCH);

    // If a hash_iter was provided, create a reusable hasher
    // instance to verify that the new game files are intact
    let mut hasher = hash_iter.map(BlockHasher::new);

    // Patch all files in the iterator one by one
    while let Some(header) = self.sync_op_iter.next_header() {
      let mut header =
        header.map_err(|e| format!("Couldn't get next patch sync operation!\n{e}"))?;

      // Open the new file
      let new_container_file = self.container_new.get_file(header.file_index as usize)?;
      let mut new_file = new_container_file.open_write(new_build_folder.to_owned())?;

      match &mut hasher {
        Some(h) => {
          let mut hash_writer = h.wrap_writer(&mut new_file, new_container_file.block_count())?;

          header.patch_file(
            &mut hash_writer,
            new_container_file.size as u64,
            &mut old_files_cache,
            &self.container_old,
            old_build_folder,
            &mut progress_callback,
          )?;

          // If the file doesn't finish with a full block, hash it anyway
          hash_writer.finalize_block()?;
        }

        // Patch into the file directly without checking
        None => {
          header.patch_file(
            &mut new_file,
            new_container_file.size as u64,
            &mut old_files_cache,
            &self.container_old,
            old_build_folder,
            &mut progress_callback,
          )?;
        }
      }
    }

    Ok(())
  }
}
