//! Data header shared by all packet types

use crate::quadtree::error::{QuadtreeError, Result};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Magic id at the start of every data packet.
pub const KEYHOLE_MAGIC_ID: u32 = 32301;

/// Packet header
///
/// Eight little-endian 32-bit fields:
/// - Magic id (32301)
/// - Data type id (1 for quadtree packets)
/// - Format version
/// - Number of fixed-size instances that follow the header
/// - Size of one instance in bytes
/// - Offset of the variable-size data buffer from the start of the packet
/// - Size of the data buffer
/// - Size of the meta buffer (unused, 0)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct DataHeader {
    /// Magic id, always 32301
    pub magic_id: u32,

    /// Packet type
    pub data_type_id: u32,

    /// Packet format version
    pub version: u32,

    /// Number of instances following the header
    pub num_instances: i32,

    /// Serialized size of one instance
    pub data_instance_size: i32,

    /// Offset of the data buffer from the start of the packet
    pub data_buffer_offset: i32,

    /// Size of the data buffer in bytes
    pub data_buffer_size: i32,

    /// Size of the meta buffer in bytes
    pub meta_buffer_size: i32,
}

impl DataHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 32;

    /// Header for `num_instances` instances of `instance_size` bytes,
    /// with the data buffer placed directly after them.
    pub fn new(data_type_id: u32, version: u32, num_instances: i32, instance_size: i32) -> Self {
        Self {
            magic_id: KEYHOLE_MAGIC_ID,
            data_type_id,
            version,
            num_instances,
            data_instance_size: instance_size,
            data_buffer_offset: (Self::SIZE as i32)
                .saturating_add(num_instances.saturating_mul(instance_size)),
            data_buffer_size: 0,
            meta_buffer_size: 0,
        }
    }

    /// Parse a header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(QuadtreeError::Truncated {
                context: "data header",
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        let header = Self::read(&mut Cursor::new(&data[..Self::SIZE]))?;
        header.validate()?;
        Ok(header)
    }

    /// Serialize the header.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.write(&mut Cursor::new(&mut buf))?;
        Ok(buf)
    }

    /// Validate the header fields
    pub fn validate(&self) -> Result<()> {
        if self.magic_id != KEYHOLE_MAGIC_ID {
            return Err(QuadtreeError::InvalidMagic {
                expected: KEYHOLE_MAGIC_ID,
                actual: self.magic_id,
            });
        }
        if self.num_instances < 0 {
            return Err(QuadtreeError::InvalidHeader(format!(
                "negative instance count {}",
                self.num_instances
            )));
        }
        if self.data_buffer_offset < 0 || self.data_buffer_size < 0 {
            return Err(QuadtreeError::InvalidHeader(format!(
                "negative data buffer offset {} or size {}",
                self.data_buffer_offset, self.data_buffer_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_places_data_buffer_after_instances() {
        let header = DataHeader::new(1, 2, 5, 32);
        assert_eq!(header.magic_id, KEYHOLE_MAGIC_ID);
        assert_eq!(header.data_buffer_offset, 32 + 5 * 32);
        assert_eq!(header.data_buffer_size, 0);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut header = DataHeader::new(1, 2, 3, 32);
        header.data_buffer_size = 0x0102;
        let bytes = header.build().expect("build");
        assert_eq!(bytes.len(), DataHeader::SIZE);
        assert_eq!(&bytes[0..4], &32301u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &[1, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[2, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[3, 0, 0, 0]);
        assert_eq!(&bytes[16..20], &[32, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &128i32.to_le_bytes());
        assert_eq!(&bytes[24..28], &[0x02, 0x01, 0, 0]);
        assert_eq!(&bytes[28..32], &[0, 0, 0, 0]);

        assert_eq!(DataHeader::parse(&bytes).expect("parse"), header);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = DataHeader::new(1, 2, 0, 32).build().expect("build");
        bytes[0] = 0;
        assert!(matches!(
            DataHeader::parse(&bytes),
            Err(QuadtreeError::InvalidMagic { actual, .. }) if actual != KEYHOLE_MAGIC_ID
        ));
    }

    #[test]
    fn test_short_buffer() {
        assert!(matches!(
            DataHeader::parse(&[0u8; 31]),
            Err(QuadtreeError::Truncated { needed: 32, available: 31, .. })
        ));
    }

    #[test]
    fn test_negative_count() {
        let mut header = DataHeader::new(1, 2, 0, 32);
        header.num_instances = -1;
        let bytes = header.build().expect("build");
        assert!(matches!(
            DataHeader::parse(&bytes),
            Err(QuadtreeError::InvalidHeader(_))
        ));
    }
}
