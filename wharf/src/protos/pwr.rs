//! Patch/signature/manifest/wounds wire messages.
//!
//! <https://github.com/itchio/wharf/blob/5e5efc838cdbaee7915246d5102af78a3a31e74d/pwr/pwr.proto>

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, prost::Enumeration)]
#[repr(i32)]
pub enum CompressionAlgorithm {
  #[default]
  None = 0,
  Brotli = 1,
  Gzip = 2,
  Zstd = 3,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct CompressionSettings {
  #[prost(enumeration = "CompressionAlgorithm", tag = "1")]
  pub algorithm: i32,
  #[prost(int32, tag = "2")]
  pub quality: i32,
}

impl CompressionSettings {
  #[must_use]
  pub fn algorithm(&self) -> CompressionAlgorithm {
    CompressionAlgorithm::try_from(self.algorithm).unwrap_or_default()
  }

  #[must_use]
  pub const fn none() -> Self {
    CompressionSettings {
      algorithm: CompressionAlgorithm::None as i32,
      quality: 0,
    }
  }
}

impl std::fmt::Display for CompressionSettings {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:?}-q{}", self.algorithm(), self.quality)
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct PatchHeader {
  #[prost(message, optional, tag = "1")]
  pub compression: Option<CompressionSettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct SignatureHeader {
  #[prost(message, optional, tag = "1")]
  pub compression: Option<CompressionSettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct ManifestHeader {
  #[prost(message, optional, tag = "1")]
  pub compression: Option<CompressionSettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct WoundsHeader {}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct Wound {
  #[prost(int64, tag = "1")]
  pub file_index: i64,
  #[prost(int64, tag = "2")]
  pub start: i64,
  #[prost(int64, tag = "3")]
  pub end: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct SyncHeader {
  #[prost(int64, tag = "1")]
  pub file_index: i64,
}

pub mod sync_op {
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, prost::Enumeration)]
  #[repr(i32)]
  pub enum Type {
    #[default]
    BlockRange = 0,
    Data = 1,
    HeyYouDidIt = 2,
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct SyncOp {
  #[prost(enumeration = "sync_op::Type", tag = "1")]
  pub r#type: i32,
  #[prost(int64, tag = "2")]
  pub file_index: i64,
  #[prost(int64, tag = "3")]
  pub block_index: i64,
  #[prost(int64, tag = "4")]
  pub block_span: i64,
  #[prost(bytes = "vec", tag = "5")]
  pub data: Vec<u8>,
}

impl SyncOp {
  #[must_use]
  pub fn r#type(&self) -> sync_op::Type {
    sync_op::Type::try_from(self.r#type).unwrap_or_default()
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct BlockHash {
  #[prost(uint32, tag = "1")]
  pub weak_hash: u32,
  #[prost(bytes = "vec", tag = "2")]
  pub strong_hash: Vec<u8>,
}
