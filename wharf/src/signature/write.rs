use crate::common::{CompressedWriter, MAGIC_SIGNATURE, compress_stream, write_magic_bytes};
use crate::protos::{encode_protobuf, pwr, tlc};

use std::io::Write;

/// Write the signature magic, header and container, returning a compressed
/// writer ready to receive the block hash stream
///
/// # Errors
///
/// If the writer could not be written to, or the requested compression
/// algorithm was not compiled in
pub(crate) fn write_header<'w>(
  writer: &'w mut impl Write,
  compression: &pwr::CompressionSettings,
  container: &tlc::Container,
) -> Result<CompressedWriter<'w>, String> {
  write_magic_bytes(writer, MAGIC_SIGNATURE)?;

  encode_protobuf(
    &pwr::SignatureHeader {
      compression: Some(compression.clone()),
    },
    writer,
  )?;

  let mut compressed = compress_stream(writer, compression)?;
  encode_protobuf(container, &mut compressed)?;

  Ok(compressed)
}

/// Write a complete signature file in one call: header, container and every block hash
///
/// Used by the `sign` command and by the diff driver once it has finished
/// signing the new build.
///
/// # Errors
///
/// If the writer could not be written to
pub fn write_signature(
  writer: &mut impl Write,
  compression: &pwr::CompressionSettings,
  container: &tlc::Container,
  hashes: impl IntoIterator<Item = pwr::BlockHash>,
) -> Result<(), String> {
  let mut body = write_header(writer, compression, container)?;

  for hash in hashes {
    encode_protobuf(&hash, &mut body)?;
  }

  body.finish()
}
