//! Packet compression error types

use thiserror::Error;

/// Packet compression error type
#[derive(Debug, Error)]
pub enum CompressError {
    /// Buffer too short to hold the envelope header
    #[error("compressed packet too short: {0} bytes")]
    TooShort(usize),

    /// Envelope magic did not match
    #[error("invalid packet magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic {
        /// Expected magic
        expected: u32,
        /// Magic found in the buffer
        actual: u32,
    },

    /// Declared uncompressed size exceeds the decompression limit
    #[error("declared packet size {size} exceeds limit of {limit} bytes")]
    SizeLimit {
        /// Declared size
        size: usize,
        /// Maximum allowed size
        limit: usize,
    },

    /// Inflated length differs from the declared size
    #[error("packet size mismatch: header declares {expected} bytes, inflated {actual}")]
    SizeMismatch {
        /// Size declared in the envelope
        expected: usize,
        /// Size actually produced
        actual: usize,
    },

    /// Compression/decompression error
    #[error("compression error: {0}")]
    CompressionError(String),
}

/// Result type for packet compression
pub type CompressResult<T> = Result<T, CompressError>;
