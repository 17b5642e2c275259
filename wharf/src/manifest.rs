//! Manifest files: a container snapshot carried without any block hashes
//!
//! A manifest shares the patch/signature framing (magic, header, compressed
//! container) but is used where only the expected file listing matters, not
//! its content hashes — e.g. recording what a build folder should contain
//! before a verify pass has a signature to compare against.

use crate::common::{
  MAGIC_MANIFEST, check_magic_bytes, compress_stream, decompress_stream, write_magic_bytes,
};
use crate::protos::{decode_protobuf, encode_protobuf, pwr, tlc};

use std::io::{BufRead, Write};

pub struct Manifest {
  pub header: pwr::ManifestHeader,
  pub container: tlc::Container,
}

impl Manifest {
  /// Decode a manifest assuming the magic bytes have already been consumed
  ///
  /// # Errors
  ///
  /// If the reader fails, or the data is malformed
  pub fn read_without_magic(reader: &mut impl BufRead) -> Result<Self, String> {
    let header = decode_protobuf::<pwr::ManifestHeader>(reader)?;

    let algorithm = header
      .compression
      .as_ref()
      .ok_or("Missing compression field in Manifest Header!")?
      .algorithm();

    let mut decompressed = decompress_stream(reader, algorithm)?;
    let container = decode_protobuf::<tlc::Container>(&mut decompressed)?;

    Ok(Manifest { header, container })
  }

  /// Decode a manifest
  ///
  /// # Errors
  ///
  /// If the magic bytes don't match, the reader fails, or the data is malformed
  pub fn read(reader: &mut impl BufRead) -> Result<Self, String> {
    check_magic_bytes(reader, MAGIC_MANIFEST)?;
    Self::read_without_magic(reader)
  }

  /// Encode a manifest for `container` using the given compression settings
  ///
  /// # Errors
  ///
  /// If the writer fails, or the requested compression algorithm was not compiled in
  pub fn write(
    writer: &mut impl Write,
    compression: &pwr::CompressionSettings,
    container: &tlc::Container,
  ) -> Result<(), String> {
    write_magic_bytes(writer, MAGIC_MANIFEST)?;

    encode_protobuf(
      &pwr::ManifestHeader {
        compression: Some(compression.clone()),
      },
      writer,
    )?;

    let mut compressed = compress_stream(writer, compression)?;
    encode_protobuf(container, &mut compressed)?;
    compressed.finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::container::mask_mode;
  use std::io::Cursor;

  #[test]
  fn manifest_round_trips_through_write_and_read() {
    let container = tlc::Container {
      size: 5,
      files: vec![tlc::File {
        path: "a.txt".to_string(),
        mode: mask_mode(0o644),
        size: 5,
      }],
      dirs: vec![],
      symlinks: vec![],
    };

    let mut buf = Vec::new();
    Manifest::write(&mut buf, &pwr::CompressionSettings::none(), &container).unwrap();

    let mut cursor = Cursor::new(buf);
    let manifest = Manifest::read(&mut cursor).unwrap();
    assert_eq!(manifest.container, container);
  }
}
