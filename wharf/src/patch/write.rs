use crate::common::{CompressedWriter, MAGIC_PATCH, compress_stream, write_magic_bytes};
use crate::protos::{encode_protobuf, pwr, tlc};

use std::io::Write;

/// Write the patch magic, header and both containers, returning a compressed
/// writer ready to receive the per-file sync entries
///
/// # Errors
///
/// If the writer could not be written to, or the requested compression
/// algorithm was not compiled in
pub(crate) fn write_header<'w>(
  writer: &'w mut impl Write,
  compression: &pwr::CompressionSettings,
  container_old: &tlc::Container,
  container_new: &tlc::Container,
) -> Result<CompressedWriter<'w>, String> {
  write_magic_bytes(writer, MAGIC_PATCH)?;

  encode_protobuf(
    &pwr::PatchHeader {
      compression: Some(compression.clone()),
    },
    writer,
  )?;

  let mut compressed = compress_stream(writer, compression)?;

  encode_protobuf(container_old, &mut compressed)?;
  encode_protobuf(container_new, &mut compressed)?;

  Ok(compressed)
}
