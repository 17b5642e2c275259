//! Wounds: a flat, uncompressed stream of byte ranges that failed verification
//!
//! Unlike patches and signatures, wounds are written as a raw sequence of
//! length-delimited messages with no compression layer — a wounds file is
//! meant to be written incrementally as a verify pass discovers damage, not
//! buffered and compressed as a whole.

use crate::common::{MAGIC_WOUNDS, check_magic_bytes, write_magic_bytes};
use crate::protos::{decode_protobuf, encode_protobuf, pwr};

use std::io::{BufRead, Write};

pub(crate) fn read_header_without_magic(
  reader: &mut impl BufRead,
) -> Result<pwr::WoundsHeader, String> {
  decode_protobuf::<pwr::WoundsHeader>(reader)
}

/// Decode a wounds file's header
///
/// # Errors
///
/// If the magic bytes don't match or the reader fails
pub fn read_header(reader: &mut impl BufRead) -> Result<pwr::WoundsHeader, String> {
  check_magic_bytes(reader, MAGIC_WOUNDS)?;
  read_header_without_magic(reader)
}

/// Read the next wound from the stream, or `None` at a clean end of stream
///
/// # Errors
///
/// If a wound message starts but cannot be fully decoded
pub fn next_wound(reader: &mut impl BufRead) -> Option<Result<pwr::Wound, String>> {
  match reader.fill_buf() {
    Ok(buf) if buf.is_empty() => None,
    Ok(_) => Some(decode_protobuf::<pwr::Wound>(reader)),
    Err(e) => Some(Err(format!("Couldn't read from wounds stream!\n{e}"))),
  }
}

/// Write a wounds file's header
///
/// # Errors
///
/// If the writer fails
pub fn write_header(writer: &mut impl Write) -> Result<(), String> {
  write_magic_bytes(writer, MAGIC_WOUNDS)?;
  encode_protobuf(&pwr::WoundsHeader::default(), writer)
}

/// Append a single wound to the stream
///
/// # Errors
///
/// If the writer fails
pub fn write_wound(writer: &mut impl Write, wound: &pwr::Wound) -> Result<(), String> {
  encode_protobuf(wound, writer)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn wounds_round_trip_through_write_and_read() {
    let mut buf = Vec::new();
    write_header(&mut buf).unwrap();
    write_wound(
      &mut buf,
      &pwr::Wound {
        file_index: 2,
        start: 10,
        end: 20,
      },
    )
    .unwrap();

    let mut cursor = Cursor::new(buf);
    read_header(&mut cursor).unwrap();

    let wound = next_wound(&mut cursor).unwrap().unwrap();
    assert_eq!(wound.file_index, 2);
    assert_eq!(wound.start, 10);
    assert_eq!(wound.end, 20);

    assert!(next_wound(&mut cursor).is_none());
  }
}
