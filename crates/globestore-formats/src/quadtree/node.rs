//! Quadtree nodes and their fixed 32-byte wire record

use crate::quadtree::btg::ChildFlags;
use crate::quadtree::path::QuadtreePath;
use crate::quadtree::reference::{DataReference, DataReferenceGroup, LayerType};
use binrw::{BinRead, BinWrite};
use std::fmt::Write as _;

/// Number of image neighbor bytes on a node.
pub const IMAGE_NEIGHBOR_COUNT: usize = 8;

/// Most channels one node can carry (the count field is 16 bits).
pub const MAX_CHANNELS: usize = u16::MAX as usize;

/// One vector channel on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    /// Channel (layer) type
    pub channel_type: u16,
    /// Packet version for this channel
    pub version: u16,
}

/// Metadata for one tile in a quadset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadtreeNode {
    /// Child and content flags
    pub children: ChildFlags,
    /// Version of the child quadset packet (cache nodes)
    pub cnode_version: u16,
    /// Imagery packet version
    pub image_version: u16,
    /// Terrain packet version
    pub terrain_version: u16,
    /// Vector channels in insertion order
    pub channels: Vec<Channel>,
    /// Image neighbor providers
    pub image_neighbors: [u8; IMAGE_NEIGHBOR_COUNT],
    /// Imagery data provider
    pub image_data_provider: u8,
    /// Terrain data provider
    pub terrain_data_provider: u8,
}

impl QuadtreeNode {
    /// Record the version of channel `channel_type`, replacing the version
    /// if the channel is already present.
    pub fn set_channel_version(&mut self, channel_type: u16, version: u16) {
        if let Some(channel) = self
            .channels
            .iter_mut()
            .find(|c| c.channel_type == channel_type)
        {
            channel.version = version;
        } else {
            self.channels.push(Channel {
                channel_type,
                version,
            });
        }
    }

    /// True if the node carries data of `layer_type`. Historical imagery
    /// is never reported by this packet format.
    pub const fn has_layer_of_type(&self, layer_type: LayerType) -> bool {
        match layer_type {
            LayerType::Imagery => self.children.has_image(),
            LayerType::Terrain => self.children.has_terrain(),
            LayerType::Vector => self.children.has_drawable(),
            LayerType::ImageryHistory => false,
        }
    }

    /// Append the data references of this node, located at `path`.
    pub fn collect_data_references(&self, path: QuadtreePath, refs: &mut DataReferenceGroup) {
        if self.children.is_cache_node() {
            refs.qtp
                .push(DataReference::new(path, self.cnode_version, 0, 0));
        }
        if self.children.has_image() {
            refs.img.push(DataReference::new(
                path,
                self.image_version,
                LayerType::Imagery.channel(),
                u16::from(self.image_data_provider),
            ));
        }
        if self.children.has_terrain() {
            refs.ter.push(DataReference::new(
                path,
                self.terrain_version,
                LayerType::Terrain.channel(),
                u16::from(self.terrain_data_provider),
            ));
        }
        if self.children.has_drawable() {
            refs.vec.extend(
                self.channels
                    .iter()
                    .map(|c| DataReference::new(path, c.version, c.channel_type, 0)),
            );
        }
    }

    /// Append a one-line description plus one line per channel.
    pub(crate) fn describe(
        &self,
        out: &mut String,
        index: usize,
        subindex: Option<u32>,
        path: &QuadtreePath,
    ) {
        let subindex = subindex.map_or_else(|| "?".to_string(), |s| s.to_string());
        let _ = writeln!(
            out,
            "  node {index}  s{subindex} \"{path}\"  iv = {}, ip = {}, tv = {}, tp = {}, c = {}, flags = {}",
            self.image_version,
            self.image_data_provider,
            self.terrain_version,
            self.terrain_data_provider,
            self.cnode_version,
            self.children,
        );
        for (j, channel) in self.channels.iter().enumerate() {
            let _ = writeln!(
                out,
                "    V{j}: layer = {}, version = {}",
                channel.channel_type, channel.version
            );
        }
    }
}

/// Fixed 32-byte node record.
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0x00 | 1 | Child flags |
/// | 0x01 | 1 | Filler |
/// | 0x02 | 2 | Cache node version |
/// | 0x04 | 2 | Image version |
/// | 0x06 | 2 | Terrain version |
/// | 0x08 | 2 | Channel count |
/// | 0x0A | 2 | Filler |
/// | 0x0C | 4 | Channel type list offset |
/// | 0x10 | 4 | Channel version list offset |
/// | 0x14 | 8 | Image neighbors |
/// | 0x1C | 1 | Image data provider |
/// | 0x1D | 1 | Terrain data provider |
/// | 0x1E | 2 | Filler |
///
/// List offsets are relative to the start of the packet's data buffer.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub(crate) struct NodeRecord {
    pub children: u8,
    #[brw(pad_before = 1)]
    pub cnode_version: u16,
    pub image_version: u16,
    pub terrain_version: u16,
    pub num_channels: u16,
    #[brw(pad_before = 2)]
    pub type_offset: i32,
    pub version_offset: i32,
    pub image_neighbors: [u8; IMAGE_NEIGHBOR_COUNT],
    pub image_data_provider: u8,
    #[brw(pad_after = 2)]
    pub terrain_data_provider: u8,
}

impl NodeRecord {
    /// Serialized size in bytes.
    pub const SIZE: usize = 32;

    pub(crate) fn from_node(
        node: &QuadtreeNode,
        num_channels: u16,
        type_offset: i32,
        version_offset: i32,
    ) -> Self {
        Self {
            children: node.children.bits(),
            cnode_version: node.cnode_version,
            image_version: node.image_version,
            terrain_version: node.terrain_version,
            num_channels,
            type_offset,
            version_offset,
            image_neighbors: node.image_neighbors,
            image_data_provider: node.image_data_provider,
            terrain_data_provider: node.terrain_data_provider,
        }
    }

    pub(crate) fn into_node(self, channels: Vec<Channel>) -> QuadtreeNode {
        QuadtreeNode {
            children: ChildFlags::from_bits(self.children),
            cnode_version: self.cnode_version,
            image_version: self.image_version,
            terrain_version: self.terrain_version,
            channels,
            image_neighbors: self.image_neighbors,
            image_data_provider: self.image_data_provider,
            terrain_data_provider: self.terrain_data_provider,
        }
    }
}
