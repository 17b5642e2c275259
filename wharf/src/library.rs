//! Lookup table mapping weak hashes to candidate blocks in a signature
//!
//! <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/pwr/diffcontext.go>

use crate::protos::{pwr, tlc};

use std::collections::HashMap;

/// A block in the old container that might match a window of new data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
  pub file_index: i64,
  pub block_index: i64,
}

/// Maps weak hashes to the blocks of an old container's signature that produced them
///
/// Built once per diff from the old build's full signature, then probed one
/// rolling-hash window at a time by the differ.
#[derive(Debug, Default)]
pub struct BlockLibrary {
  by_weak_hash: HashMap<u32, Vec<(Candidate, Vec<u8>)>>,
}

impl BlockLibrary {
  /// Build a library from a container's ordered files and their flat block hash list
  ///
  /// `hashes` must be in the same order `container`'s files and blocks were
  /// signed in, i.e. the output of [`crate::signer::compute_signature`].
  #[must_use]
  pub fn new(container: &tlc::Container, hashes: &[pwr::BlockHash]) -> Self {
    let mut by_weak_hash: HashMap<u32, Vec<(Candidate, Vec<u8>)>> = HashMap::new();
    let mut hash_iter = hashes.iter();

    for (file_index, file) in container.files.iter().enumerate() {
      for block_index in 0..file.block_count() {
        let Some(hash) = hash_iter.next() else {
          break;
        };

        by_weak_hash.entry(hash.weak_hash).or_default().push((
          Candidate {
            file_index: file_index as i64,
            block_index: block_index as i64,
          },
          hash.strong_hash.clone(),
        ));
      }
    }

    Self { by_weak_hash }
  }

  /// Find a block matching both the weak and strong hash of a window
  ///
  /// When more than one block shares both hashes, a candidate from
  /// `preferred_file_index` is returned if one exists, matching the
  /// "prefer data from the same file" behavior of the original differ.
  #[must_use]
  pub fn find(
    &self,
    weak_hash: u32,
    strong_hash: &[u8],
    preferred_file_index: i64,
  ) -> Option<Candidate> {
    let candidates = self.by_weak_hash.get(&weak_hash)?;
    let matching = candidates
      .iter()
      .filter(|(_, strong)| strong.as_slice() == strong_hash);

    let mut fallback = None;
    for (candidate, _) in matching {
      if candidate.file_index == preferred_file_index {
        return Some(*candidate);
      }
      fallback.get_or_insert(*candidate);
    }

    fallback
  }

  /// Whether any block in the library has the given weak hash
  #[must_use]
  pub fn may_contain(&self, weak_hash: u32) -> bool {
    self.by_weak_hash.contains_key(&weak_hash)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::container::mask_mode;

  fn container_with_one_file(size: i64) -> tlc::Container {
    tlc::Container {
      size,
      files: vec![tlc::File {
        path: "a.bin".to_string(),
        mode: mask_mode(0o644),
        size,
      }],
      dirs: vec![],
      symlinks: vec![],
    }
  }

  #[test]
  fn find_returns_none_for_unknown_weak_hash() {
    let container = container_with_one_file(10);
    let hashes = vec![pwr::BlockHash {
      weak_hash: 1,
      strong_hash: vec![0xaa],
    }];
    let library = BlockLibrary::new(&container, &hashes);

    assert!(library.find(2, &[0xaa], 0).is_none());
  }

  #[test]
  fn find_prefers_same_file_candidate() {
    let container = tlc::Container {
      size: 20,
      files: vec![
        tlc::File {
          path: "a.bin".to_string(),
          mode: mask_mode(0o644),
          size: 10,
        },
        tlc::File {
          path: "b.bin".to_string(),
          mode: mask_mode(0o644),
          size: 10,
        },
      ],
      dirs: vec![],
      symlinks: vec![],
    };

    let hashes = vec![
      pwr::BlockHash {
        weak_hash: 5,
        strong_hash: vec![0xaa],
      },
      pwr::BlockHash {
        weak_hash: 5,
        strong_hash: vec![0xaa],
      },
    ];

    let library = BlockLibrary::new(&container, &hashes);
    let found = library.find(5, &[0xaa], 1).unwrap();
    assert_eq!(found.file_index, 1);
  }
}
