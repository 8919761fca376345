//! References from quadtree nodes to the data packets they describe

use crate::quadtree::path::QuadtreePath;
use binrw::{BinRead, BinWrite};

/// Layer types a quadtree node can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum LayerType {
    /// Imagery tiles
    Imagery = 0,
    /// Terrain tiles
    Terrain = 1,
    /// Vector (drawable) packets
    Vector = 2,
    /// Historical imagery
    ImageryHistory = 3,
}

impl LayerType {
    /// Channel value stored in data references for this layer.
    pub const fn channel(self) -> u16 {
        self as u16
    }
}

/// One data packet referenced by a quadtree node.
///
/// Serialized as 14 little-endian bytes: path (u64), version, channel,
/// provider (u16 each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct DataReference {
    /// Absolute path of the tile
    pub path: QuadtreePath,
    /// Packet version
    pub version: u16,
    /// Layer or vector channel
    pub channel: u16,
    /// Data provider id
    pub provider: u16,
}

impl DataReference {
    /// Serialized size in bytes.
    pub const SERIAL_SIZE: usize = QuadtreePath::SERIAL_SIZE + 6;

    /// Create a reference.
    pub const fn new(path: QuadtreePath, version: u16, channel: u16, provider: u16) -> Self {
        Self {
            path,
            version,
            channel,
            provider,
        }
    }
}

/// Data references collected from a packet, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataReferenceGroup {
    /// Quadtree packets of child quadsets (from cache nodes)
    pub qtp: Vec<DataReference>,
    /// Imagery tiles
    pub img: Vec<DataReference>,
    /// Terrain tiles
    pub ter: Vec<DataReference>,
    /// Vector packets, one per channel
    pub vec: Vec<DataReference>,
}

impl DataReferenceGroup {
    /// Total number of references.
    pub fn len(&self) -> usize {
        self.qtp.len() + self.img.len() + self.ter.len() + self.vec.len()
    }

    /// True if no references were collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
