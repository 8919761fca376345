//! Error types for checksum and cipher operations

use thiserror::Error;

/// Errors that can occur during cipher operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key size
    #[error("Invalid key size: expected at least {expected}, got {actual}")]
    InvalidKeySize {
        /// Minimum key size in bytes
        expected: usize,
        /// Actual key size in bytes
        actual: usize,
    },
}

/// Errors reported when verifying a trailing CRC-32
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrcError {
    /// The buffer cannot hold a payload and a CRC
    #[error("Buffer of {len} bytes is too short for a CRC-protected record")]
    TooShort {
        /// Buffer length in bytes
        len: usize,
    },

    /// Stored and computed CRC differ
    #[error("CRC mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    Mismatch {
        /// CRC stored in the trailing bytes
        expected: u32,
        /// CRC computed over the payload
        actual: u32,
    },
}
