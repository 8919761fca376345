//! Keyed XOR obfuscation for quadtree packets.
//!
//! Packets are compressed and then XOR-ed against a caller-supplied key.
//! The walk over the key starts at offset 16 and visits it in 8-byte runs
//! separated by 16-byte skips, wrapping back into the first 24 bytes
//! once the end of the key is reached. The transform is its own inverse.
//!
//! No key ships with this crate. Packets only interoperate with existing
//! clients and servers when both sides are given the same key bytes.
//!
//! ```rust
//! use globestore_crypto::xor::PacketCipher;
//!
//! let key: Vec<u8> = (0..=255u8).collect();
//! let cipher = PacketCipher::new(&key).expect("key is long enough");
//!
//! let mut data = b"quadtree packet".to_vec();
//! cipher.apply(&mut data);
//! assert_ne!(&data[..], b"quadtree packet");
//! cipher.apply(&mut data);
//! assert_eq!(&data[..], b"quadtree packet");
//! ```

use crate::error::CryptoError;

/// Offset into the key at which every stream starts.
const START_OFFSET: usize = 16;

/// Smallest key the stream walk can use without running off the end.
pub const MIN_KEY_SIZE: usize = 24;

/// XOR cipher bound to one key.
///
/// Unlike a keystream cipher the position in the key depends only on the
/// byte index, so one instance can encode and decode any number of
/// buffers.
#[derive(Clone)]
pub struct PacketCipher {
    key: Vec<u8>,
}

impl PacketCipher {
    /// Create a cipher for `key`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeySize` if the key is shorter than
    /// [`MIN_KEY_SIZE`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() < MIN_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: MIN_KEY_SIZE,
                actual: key.len(),
            });
        }
        Ok(Self { key: key.to_vec() })
    }

    /// Key length in bytes.
    pub fn key_len(&self) -> usize {
        self.key.len()
    }

    /// XOR `data` in place. Applying twice restores the input.
    pub fn apply(&self, data: &mut [u8]) {
        let key_len = self.key.len();
        let mut off = START_OFFSET;
        for byte in data {
            *byte ^= self.key[off];
            off += 1;
            if off % 8 == 0 {
                off += 16;
            }
            if off >= key_len {
                off = (off + 8) % 24;
            }
        }
    }

    /// Return an encoded copy of `data`.
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply(&mut out);
        out
    }

    /// Return a decoded copy of `data`.
    pub fn decode(&self, data: &[u8]) -> Vec<u8> {
        self.encode(data)
    }
}

impl std::fmt::Debug for PacketCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketCipher")
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}
