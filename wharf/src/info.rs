use crate::common::{MAGIC_MANIFEST, MAGIC_PATCH, MAGIC_SIGNATURE, MAGIC_WOUNDS, read_magic_bytes};
use crate::manifest::Manifest;
use crate::protos::pwr;
use crate::wounds;
use crate::{Patch, Signature};

use std::io::BufRead;

pub enum WharfBinary<'a> {
  Signature(Signature<'a>),
  Patch(Patch<'a>),
  Manifest(Manifest),
  /// Identifies the reader as a wounds stream; the header has been consumed,
  /// and further wounds can be read with [`crate::wounds::next_wound`]
  Wounds(pwr::WoundsHeader),
}

/// Itentify a wharf binary based on the magic bytes and decode it
///
/// # Errors
///
/// If the magic bytes don't match any known format, or the data is malformed
pub fn identify<'a>(reader: &'a mut impl BufRead) -> Result<WharfBinary<'a>, String> {
  use WharfBinary as WB;

  let magic = read_magic_bytes(reader)?;
  match magic {
    MAGIC_SIGNATURE => Ok(WB::Signature(Signature::read_without_magic(reader)?)),
    MAGIC_PATCH => Ok(WB::Patch(Patch::read_without_magic(reader)?)),
    MAGIC_MANIFEST => Ok(WB::Manifest(Manifest::read_without_magic(reader)?)),
    MAGIC_WOUNDS => Ok(WB::Wounds(wounds::read_header_without_magic(reader)?)),
    _ => Err("The provided binary doesn't match with any known wharf binary format".to_string()),
  }
}
