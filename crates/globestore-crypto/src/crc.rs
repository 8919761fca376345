//! CRC-32 protection for persisted records.
//!
//! Bundle headers and CRC-protected records carry a trailing 4-byte
//! little-endian CRC-32 (zlib polynomial) computed over every preceding
//! byte of the record:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | n | Payload |
//! | n | 4 | CRC-32 of payload, little-endian |
//!
//! ```rust
//! use globestore_crypto::crc::{append_crc, verify_trailing_crc};
//!
//! let mut record = b"quadtree packet".to_vec();
//! append_crc(&mut record);
//! assert_eq!(verify_trailing_crc(&record).ok(), Some(&b"quadtree packet"[..]));
//! ```

use crate::error::CrcError;
use flate2::Crc;

/// Size in bytes of a trailing CRC field.
pub const CRC_SIZE: usize = 4;

/// Compute the CRC-32 of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Append the little-endian CRC-32 of the current contents.
pub fn append_crc(buf: &mut Vec<u8>) {
    let crc = crc32(buf);
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// Overwrite the last [`CRC_SIZE`] bytes of `buf` with the CRC-32 of the
/// bytes before them.
pub fn fill_trailing_crc(buf: &mut [u8]) -> Result<(), CrcError> {
    if buf.len() <= CRC_SIZE {
        return Err(CrcError::TooShort { len: buf.len() });
    }
    let (payload, tail) = buf.split_at_mut(buf.len() - CRC_SIZE);
    tail.copy_from_slice(&crc32(payload).to_le_bytes());
    Ok(())
}

/// Verify the trailing CRC of `buf` and return the payload it protects.
pub fn verify_trailing_crc(buf: &[u8]) -> Result<&[u8], CrcError> {
    if buf.len() <= CRC_SIZE {
        return Err(CrcError::TooShort { len: buf.len() });
    }
    let (payload, tail) = buf.split_at(buf.len() - CRC_SIZE);
    let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let actual = crc32(payload);
    if expected != actual {
        return Err(CrcError::Mismatch { expected, actual });
    }
    Ok(payload)
}
