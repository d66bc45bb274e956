//! Compression of stored chunk files.

use std::io::{self, Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;

use crate::config::Compression;

/// Work out the compression of `data` from its first bytes.
pub fn detect(data: &[u8]) -> Compression {
    match data {
        [0x1F, 0x8B, ..] => Compression::Gzip,
        [0x78, 0x01 | 0x5E | 0x9C | 0xDA, ..] => Compression::Zlib,
        _ => Compression::None,
    }
}

/// Decompress `data`. `Auto` sniffs the header first.
pub fn decompress(data: &[u8], compression: Compression) -> io::Result<Vec<u8>> {
    let compression = match compression {
        Compression::Auto => detect(data),
        other => other,
    };
    let mut output = Vec::new();
    match compression {
        Compression::Gzip => {
            GzDecoder::new(data).read_to_end(&mut output)?;
        }
        Compression::Zlib => {
            ZlibDecoder::new(data).read_to_end(&mut output)?;
        }
        Compression::None | Compression::Auto => output.extend_from_slice(data),
    }
    Ok(output)
}

/// Gzip `data` at the default level.
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
