//! Packet compression envelope.
//!
//! Packets stored in bundles are zlib-compressed behind a small header
//! announcing the inflated size:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 4 | Magic `0x7468DEAD`, little-endian |
//! | 0x04 | 4 | Uncompressed size, little-endian |
//! | 0x08 | n | zlib stream |
//!
//! ```rust
//! use globestore_formats::compress::{compress_packet, decompress_packet};
//!
//! let packet = vec![7u8; 1000];
//! let compressed = compress_packet(&packet).expect("compression succeeds");
//! assert!(compressed.len() < packet.len());
//! assert_eq!(decompress_packet(&compressed).expect("valid envelope"), packet);
//! ```

mod error;

pub use error::{CompressError, CompressResult};

use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;

/// Envelope magic number.
pub const PACKET_MAGIC: u32 = 0x7468_DEAD;

/// Size of the envelope header in bytes.
pub const PACKET_HEADER_SIZE: usize = 8;

/// Maximum declared uncompressed size (64 MiB)
///
/// Quadtree packets are a few kilobytes; terrain and vector packets stay
/// well below a megabyte.
pub const MAX_DECOMPRESSION_SIZE: usize = 64 * 1024 * 1024;

/// Compress `data` into an envelope.
pub fn compress_packet(data: &[u8]) -> CompressResult<Vec<u8>> {
    let size = u32::try_from(data.len()).map_err(|_| CompressError::SizeLimit {
        size: data.len(),
        limit: u32::MAX as usize,
    })?;

    let mut out = Vec::with_capacity(PACKET_HEADER_SIZE + data.len() / 2);
    out.extend_from_slice(&PACKET_MAGIC.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());

    let mut encoder = ZlibEncoder::new(data, Compression::default());
    encoder
        .read_to_end(&mut out)
        .map_err(|e| CompressError::CompressionError(format!("ZLib compression failed: {e}")))?;
    Ok(out)
}

/// Read the uncompressed size announced by an envelope header.
pub fn uncompressed_size(data: &[u8]) -> CompressResult<usize> {
    if data.len() < PACKET_HEADER_SIZE {
        return Err(CompressError::TooShort(data.len()));
    }
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if magic != PACKET_MAGIC {
        return Err(CompressError::InvalidMagic {
            expected: PACKET_MAGIC,
            actual: magic,
        });
    }
    Ok(u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize)
}

/// Inflate an envelope produced by [`compress_packet`].
pub fn decompress_packet(data: &[u8]) -> CompressResult<Vec<u8>> {
    let expected = uncompressed_size(data)?;
    if expected > MAX_DECOMPRESSION_SIZE {
        return Err(CompressError::SizeLimit {
            size: expected,
            limit: MAX_DECOMPRESSION_SIZE,
        });
    }

    let mut decoder = ZlibDecoder::new(&data[PACKET_HEADER_SIZE..]);
    let mut decompressed = Vec::with_capacity(expected);

    // Read in chunks to stop as soon as the declared size is exceeded
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = decoder.read(&mut buffer).map_err(|e| {
            CompressError::CompressionError(format!("ZLib decompression failed: {e}"))
        })?;

        if bytes_read == 0 {
            break;
        }

        if decompressed.len() + bytes_read > expected {
            return Err(CompressError::SizeMismatch {
                expected,
                actual: decompressed.len() + bytes_read,
            });
        }

        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    if decompressed.len() != expected {
        return Err(CompressError::SizeMismatch {
            expected,
            actual: decompressed.len(),
        });
    }
    Ok(decompressed)
}
