//! Record addresses inside a bundle

use crate::{BundleError, Result};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Location of one record in a bundle's virtual address space.
///
/// Serialized as 12 little-endian bytes: offset (u64) then size (u32).
/// A zero size marks an empty or missing record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct FileBundleAddr {
    /// Virtual address of the first byte
    pub offset: u64,
    /// Record length in bytes
    pub size: u32,
}

impl FileBundleAddr {
    /// Serialized size in bytes.
    pub const SERIAL_SIZE: usize = 12;

    /// Create an address.
    pub const fn new(offset: u64, size: u32) -> Self {
        Self { offset, size }
    }

    /// True if the address refers to a record.
    pub const fn is_valid(&self) -> bool {
        self.size != 0
    }

    /// Serialize to 12 bytes.
    pub fn to_bytes(&self) -> Result<[u8; Self::SERIAL_SIZE]> {
        let mut buf = [0u8; Self::SERIAL_SIZE];
        self.write(&mut Cursor::new(&mut buf[..]))
            .map_err(|e| BundleError::Internal(format!("cannot serialize address: {e}")))?;
        Ok(buf)
    }

    /// Parse from the first 12 bytes of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read(&mut Cursor::new(data)).map_err(|e| {
            BundleError::Corruption(format!("truncated bundle address ({} bytes): {e}", data.len()))
        })
    }
}
