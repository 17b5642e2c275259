//! Weak rolling checksum used to locate candidate blocks while diffing
//!
//! <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/wsync/rollsum.go>

/// Compute the weak hash of a fixed byte window from scratch
#[must_use]
pub fn weak_hash(data: &[u8]) -> u32 {
  let mut s1: u32 = 0;
  let mut s2: u32 = 0;

  for &b in data {
    s1 = s1.wrapping_add(u32::from(b));
    s2 = s2.wrapping_add(s1);
  }

  (s2 << 16) | (s1 & 0xffff)
}

/// Incrementally maintained weak hash over a sliding window of fixed length
///
/// `roll` updates the two running sums in O(1) as the window advances one byte
/// at a time, rather than recomputing [`weak_hash`] from scratch on every step.
pub struct RollingHash {
  s1: u32,
  s2: u32,
  window_len: u32,
}

impl RollingHash {
  #[must_use]
  pub fn new(initial_window: &[u8]) -> Self {
    let mut s1: u32 = 0;
    let mut s2: u32 = 0;

    for &b in initial_window {
      s1 = s1.wrapping_add(u32::from(b));
      s2 = s2.wrapping_add(s1);
    }

    Self {
      s1,
      s2,
      window_len: initial_window.len() as u32,
    }
  }

  #[must_use]
  pub fn value(&self) -> u32 {
    (self.s2 << 16) | (self.s1 & 0xffff)
  }

  /// Slide the window forward by one byte: `old` leaves, `new` enters
  pub fn roll(&mut self, old: u8, new: u8) {
    let old = u32::from(old);
    let new = u32::from(new);

    self.s1 = self.s1.wrapping_sub(old).wrapping_add(new);
    self.s2 = self
      .s2
      .wrapping_sub(self.window_len.wrapping_mul(old))
      .wrapping_add(self.s1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rolling_matches_from_scratch_computation() {
    let data = b"the quick brown fox jumps over the lazy dog";
    let window_len = 8;

    let mut rolling = RollingHash::new(&data[..window_len]);
    assert_eq!(rolling.value(), weak_hash(&data[..window_len]));

    for i in 1..=(data.len() - window_len) {
      rolling.roll(data[i - 1], data[i + window_len - 1]);
      let expected = weak_hash(&data[i..i + window_len]);
      assert_eq!(rolling.value(), expected, "mismatch at offset {i}");
    }
  }

  #[test]
  fn empty_window_hashes_to_zero() {
    assert_eq!(weak_hash(&[]), 0);
  }
}
