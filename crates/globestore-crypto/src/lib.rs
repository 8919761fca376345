//! Checksums and ciphers for globe tile storage
//!
//! This crate provides the integrity and obfuscation primitives used by
//! the bundle store and the quadtree packet codec.
//!
//! # Components
//!
//! - **CRC-32**: trailing checksums on bundle headers and records
//! - **Packet cipher**: keyed XOR applied to compressed quadtree packets
//!
//! # Examples
//!
//! ```
//! use globestore_crypto::crc;
//!
//! assert_eq!(crc::crc32(b"123456789"), 0xCBF4_3926);
//! ```

#![warn(missing_docs)]

pub mod crc;
pub mod error;
pub mod xor;

pub use crc::{CRC_SIZE, crc32};
pub use error::{CrcError, CryptoError};
pub use xor::PacketCipher;
