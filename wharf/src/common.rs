use crate::protos::pwr::CompressionAlgorithm;

use std::io::{self, BufRead, BufReader, Read, Write};

/// Fixed block size used by the signer, differ and apply engine.
///
/// <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/pwr/constants.go#L8>
pub const BLOCK_SIZE: u64 = 65536;

/// <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/pwr/constants.go#L14>
pub const MAGIC_PATCH: u32 = 0x0FEF_5F00;

/// <https://github.com/itchio/wharf/blob/189a01902d172b3297051fab12d5d4db2c620e1d/pwr/constants.go#L17>
pub const MAGIC_SIGNATURE: u32 = MAGIC_PATCH + 1;

/// Manifest files share the patch/signature framing but carry no block hashes
pub const MAGIC_MANIFEST: u32 = MAGIC_PATCH + 2;

/// Wounds files are read without the usual compression framing
pub const MAGIC_WOUNDS: u32 = MAGIC_PATCH + 3;

/// Read the next 4 bytes of the reader and return its little endian u32 representation
pub fn read_magic_bytes(reader: &mut impl Read) -> Result<u32, String> {
  let mut magic_bytes = [0u8; 4];
  reader
    .read_exact(&mut magic_bytes)
    .map_err(|e| format!("Couldn't read magic bytes!\n{e}"))?;

  Ok(u32::from_le_bytes(magic_bytes))
}

/// Write the given magic number as 4 little endian bytes
///
/// # Errors
///
/// If the writer could not be written to
pub fn write_magic_bytes(writer: &mut impl Write, magic: u32) -> Result<(), String> {
  writer
    .write_all(&magic.to_le_bytes())
    .map_err(|e| format!("Couldn't write magic bytes!\n{e}"))
}

/// Verify that the next four bytes of the reader match the expected magic number
///
/// # Errors
///
/// If the bytes couldn't be read from the reader or the magic bytes don't match
pub fn check_magic_bytes(reader: &mut impl Read, expected_magic: u32) -> Result<(), String> {
  // Compare the magic numbers
  if read_magic_bytes(reader)? == expected_magic {
    Ok(())
  } else {
    Err("The magic bytes don't match! The binary file is corrupted!".to_string())
  }
}

/// Decompress a stream using the specified decompression algorithm
///
/// # Returns
///
/// The decompressed buffered stream
pub fn decompress_stream(
  reader: &mut impl BufRead,
  algorithm: CompressionAlgorithm,
) -> Result<Box<dyn BufRead + '_>, String> {
  match algorithm {
    CompressionAlgorithm::None => Ok(Box::new(reader)),

    CompressionAlgorithm::Brotli => {
      #[cfg(feature = "brotli")]
      {
        Ok(Box::new(BufReader::new(
          // Set the buffer size to zero to allow Brotli to select the correct size
          brotli::Decompressor::new(reader, 0),
        )))
      }

      #[cfg(not(feature = "brotli"))]
      {
        Err(
          "This binary was built without Brotli support. Recompile with `--features brotli` to be able to decompress the stream".to_string(),
        )
      }
    }

    CompressionAlgorithm::Gzip => {
      #[cfg(feature = "gzip")]
      {
        Ok(Box::new(BufReader::new(flate2::bufread::GzDecoder::new(
          reader,
        ))))
      }

      #[cfg(not(feature = "gzip"))]
      {
        Err(
          "This binary was built without gzip support. Recompile with `--features gzip` to be able to decompress the stream".to_string(),
        )
      }
    }
    CompressionAlgorithm::Zstd => {
      #[cfg(feature = "zstd")]
      {
        Ok(Box::new(BufReader::new(
          zstd::Decoder::with_buffer(reader)
            .map_err(|e| format!("Couldn't create zstd decoder!\n{e}"))?,
        )))
      }

      #[cfg(not(feature = "zstd"))]
      {
        Err(
          "This binary was built without Zstd support. Recompile with `--features zstd` to be able to decompress the stream".to_string(),
        )
      }
    }
  }
}

/// A writer that finishes (flushes any trailing compressor state) when dropped via [`CompressedWriter::finish`]
pub enum CompressedWriter<'w> {
  None(&'w mut dyn Write),
  #[cfg(feature = "brotli")]
  Brotli(brotli::CompressorWriter<&'w mut dyn Write>),
  #[cfg(feature = "gzip")]
  Gzip(flate2::write::GzEncoder<&'w mut dyn Write>),
  #[cfg(feature = "zstd")]
  Zstd(zstd::Encoder<'w, &'w mut dyn Write>),
}

impl Write for CompressedWriter<'_> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    match self {
      CompressedWriter::None(w) => w.write(buf),
      #[cfg(feature = "brotli")]
      CompressedWriter::Brotli(w) => w.write(buf),
      #[cfg(feature = "gzip")]
      CompressedWriter::Gzip(w) => w.write(buf),
      #[cfg(feature = "zstd")]
      CompressedWriter::Zstd(w) => w.write(buf),
    }
  }

  fn flush(&mut self) -> io::Result<()> {
    match self {
      CompressedWriter::None(w) => w.flush(),
      #[cfg(feature = "brotli")]
      CompressedWriter::Brotli(w) => w.flush(),
      #[cfg(feature = "gzip")]
      CompressedWriter::Gzip(w) => w.flush(),
      #[cfg(feature = "zstd")]
      CompressedWriter::Zstd(w) => w.flush(),
    }
  }
}

impl CompressedWriter<'_> {
  /// Flush and close the underlying compressor, if any
  ///
  /// # Errors
  ///
  /// If the compressor could not finish writing its trailing state
  pub fn finish(self) -> Result<(), String> {
    match self {
      CompressedWriter::None(_) => Ok(()),
      #[cfg(feature = "brotli")]
      CompressedWriter::Brotli(mut w) => w
        .flush()
        .map_err(|e| format!("Couldn't flush brotli compressor!\n{e}")),
      #[cfg(feature = "gzip")]
      CompressedWriter::Gzip(w) => w
        .finish()
        .map(|_| ())
        .map_err(|e| format!("Couldn't finish gzip compressor!\n{e}")),
      #[cfg(feature = "zstd")]
      CompressedWriter::Zstd(w) => w
        .finish()
        .map(|_| ())
        .map_err(|e| format!("Couldn't finish zstd compressor!\n{e}")),
    }
  }
}

/// Wrap a writer with the compressor matching `settings`, mirroring [`decompress_stream`]
///
/// # Errors
///
/// If the requested algorithm's feature was not compiled in, or the compressor
/// could not be constructed
pub fn compress_stream<'w>(
  writer: &'w mut dyn Write,
  settings: &crate::protos::pwr::CompressionSettings,
) -> Result<CompressedWriter<'w>, String> {
  match settings.algorithm() {
    CompressionAlgorithm::None => Ok(CompressedWriter::None(writer)),

    CompressionAlgorithm::Brotli => {
      #[cfg(feature = "brotli")]
      {
        let quality = settings.quality.clamp(0, 11) as u32;
        Ok(CompressedWriter::Brotli(brotli::CompressorWriter::new(
          writer,
          4096,
          quality,
          22,
        )))
      }

      #[cfg(not(feature = "brotli"))]
      {
        Err(
          "This binary was built without Brotli support. Recompile with `--features brotli` to be able to compress the stream".to_string(),
        )
      }
    }

    CompressionAlgorithm::Gzip => {
      #[cfg(feature = "gzip")]
      {
        let level = flate2::Compression::new(settings.quality.clamp(0, 9) as u32);
        Ok(CompressedWriter::Gzip(flate2::write::GzEncoder::new(
          writer, level,
        )))
      }

      #[cfg(not(feature = "gzip"))]
      {
        Err(
          "This binary was built without gzip support. Recompile with `--features gzip` to be able to compress the stream".to_string(),
        )
      }
    }

    CompressionAlgorithm::Zstd => {
      #[cfg(feature = "zstd")]
      {
        let level = settings.quality.clamp(1, 22);
        zstd::Encoder::new(writer, level)
          .map(CompressedWriter::Zstd)
          .map_err(|e| format!("Couldn't create zstd encoder!\n{e}"))
      }

      #[cfg(not(feature = "zstd"))]
      {
        Err(
          "This binary was built without Zstd support. Recompile with `--features zstd` to be able to compress the stream".to_string(),
        )
      }
    }
  }
}
