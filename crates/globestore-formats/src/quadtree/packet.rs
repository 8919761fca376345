//! Quadtree packet: one quadset of nodes in pre-order

use crate::PacketFormat;
use crate::quadtree::error::{QuadtreeError, Result};
use crate::quadtree::header::DataHeader;
use crate::quadtree::node::{Channel, MAX_CHANNELS, NodeRecord, QuadtreeNode};
use crate::quadtree::numbering::QuadtreeNumbering;
use crate::quadtree::path::QuadtreePath;
use crate::quadtree::reference::{DataReferenceGroup, LayerType};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use std::collections::BTreeMap;
use std::fmt;

/// Data type id of quadtree packets.
pub const QUADTREE_PACKET_TYPE: u32 = 1;

/// Current quadtree packet format version.
pub const QUADTREE_PACKET_VERSION: u32 = 2;

/// A quadtree packet.
///
/// Nodes are kept in the order they appear on the wire, which is the
/// pre-order of the subtree they describe. Child bits on each node tell a
/// walker which of the following nodes belong to which quadrant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadtreePacket {
    nodes: Vec<QuadtreeNode>,
}

impl QuadtreePacket {
    /// Create an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. The caller is responsible for pushing nodes in
    /// pre-order with matching child bits.
    pub fn push_node(&mut self, node: QuadtreeNode) {
        self.nodes.push(node);
    }

    /// Nodes in wire order.
    pub fn nodes(&self) -> &[QuadtreeNode] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the packet has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build a packet from nodes keyed by their path relative to the
    /// packet root.
    ///
    /// Child bits are derived from the keys present in the map; any child
    /// bits already set on the nodes are replaced. Every non-root node
    /// needs its parent in the map, and cache nodes may not have children
    /// in the same packet.
    pub fn from_nodes(mut nodes: BTreeMap<QuadtreePath, QuadtreeNode>) -> Result<Self> {
        if let Some(first) = nodes.keys().next()
            && !first.is_root()
        {
            return Err(QuadtreeError::InvalidTree(format!(
                "packet has no root node, first node is \"{first}\""
            )));
        }

        for node in nodes.values_mut() {
            for quad in 0..4 {
                node.children.set_child(quad, false);
            }
        }

        let paths: Vec<QuadtreePath> = nodes.keys().copied().collect();
        for path in paths.iter().filter(|p| !p.is_root()) {
            let Some(parent_path) = path.parent() else {
                continue;
            };
            let Some(quad) = path.branch(path.level() - 1) else {
                continue;
            };
            let parent = nodes.get_mut(&parent_path).ok_or_else(|| {
                QuadtreeError::InvalidTree(format!("node \"{path}\" has no parent node"))
            })?;
            if parent.children.is_cache_node() {
                return Err(QuadtreeError::InvalidTree(format!(
                    "cache node \"{parent_path}\" has child \"{path}\" in the same packet"
                )));
            }
            parent.children.set_child(quad, true);
        }

        Ok(Self {
            nodes: nodes.into_values().collect(),
        })
    }

    /// Visit every reachable node in pre-order with its index and path
    /// relative to the packet root.
    ///
    /// The walk descends into quadrant `i` whenever child bit `i` is set
    /// and stops once the node list is exhausted.
    pub fn walk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, QuadtreePath, &QuadtreeNode),
    {
        let mut index = 0;
        self.walk_from(&mut index, QuadtreePath::root(), &mut visit)
    }

    fn walk_from<F>(&self, index: &mut usize, path: QuadtreePath, visit: &mut F) -> Result<()>
    where
        F: FnMut(usize, QuadtreePath, &QuadtreeNode),
    {
        let Some(node) = self.nodes.get(*index) else {
            return Ok(());
        };
        visit(*index, path, node);

        for quad in 0..4 {
            if node.children.has_child(quad) {
                *index += 1;
                if *index >= self.nodes.len() {
                    return Ok(());
                }
                self.walk_from(index, path.child(quad)?, visit)?;
            }
        }
        Ok(())
    }

    /// Find the node at `path`, relative to the packet root.
    pub fn find_node(&self, path: &QuadtreePath) -> Option<&QuadtreeNode> {
        let mut found = None;
        self.walk(|index, node_path, _| {
            if found.is_none() && node_path == *path {
                found = Some(index);
            }
        })
        .ok()?;
        found.and_then(|index| self.nodes.get(index))
    }

    /// Find the node with quadset subindex `subindex`. `root_node` selects
    /// the numbering of the root quadset.
    pub fn find_node_by_subindex(&self, subindex: u32, root_node: bool) -> Option<&QuadtreeNode> {
        let path = QuadtreeNumbering::for_packet(root_node)
            .subindex_to_path(subindex)
            .ok()?;
        self.find_node(&path)
    }

    /// Human-readable listing: the node count, then every node reachable
    /// by the walk with its index, subindex, relative path, versions,
    /// providers, flags and channels.
    ///
    /// Nodes too deep for the quadset numbering print `s?`.
    pub fn listing(&self, root_node: bool) -> Result<String> {
        let numbering = QuadtreeNumbering::for_packet(root_node);
        let mut out = format!("{} nodes\n", self.nodes.len());
        self.walk(|index, path, node| {
            let subindex = numbering.path_to_subindex(&path).ok();
            node.describe(&mut out, index, subindex, &path);
        })?;
        Ok(out)
    }

    /// Collect the data references of every node. `path_prefix` is the
    /// absolute path of the packet root.
    pub fn data_references(&self, path_prefix: &QuadtreePath) -> Result<DataReferenceGroup> {
        let mut refs = DataReferenceGroup::default();
        let mut first_error = None;
        self.walk(|_, path, node| match path_prefix.concat(&path) {
            Ok(absolute) => node.collect_data_references(absolute, &mut refs),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        })?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(refs),
        }
    }

    /// True if any node carries data of `layer_type`.
    pub fn has_layer_of_type(&self, layer_type: LayerType) -> bool {
        self.nodes.iter().any(|n| n.has_layer_of_type(layer_type))
    }

    /// Parse a packet from its wire form.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = DataHeader::parse(data)?;
        let count = header.num_instances as usize;

        let records_end = count
            .checked_mul(NodeRecord::SIZE)
            .and_then(|n| n.checked_add(DataHeader::SIZE))
            .ok_or_else(|| {
                QuadtreeError::InvalidHeader(format!("instance count {count} overflows"))
            })?;
        if data.len() < records_end {
            return Err(QuadtreeError::Truncated {
                context: "node records",
                needed: records_end,
                available: data.len(),
            });
        }

        let buffer_start = header.data_buffer_offset as usize;
        let buffer_end = buffer_start.saturating_add(header.data_buffer_size as usize);
        if data.len() < buffer_end {
            return Err(QuadtreeError::Truncated {
                context: "data buffer",
                needed: buffer_end,
                available: data.len(),
            });
        }
        let data_buffer = &data[buffer_start..buffer_end];

        let mut cursor = Cursor::new(&data[DataHeader::SIZE..records_end]);
        let mut nodes = Vec::with_capacity(count);
        for index in 0..count {
            let record = NodeRecord::read(&mut cursor)?;
            let num_channels = usize::from(record.num_channels);
            let channels = if num_channels == 0 {
                Vec::new()
            } else {
                let types = read_u16_list(data_buffer, index, record.type_offset, num_channels)?;
                let versions =
                    read_u16_list(data_buffer, index, record.version_offset, num_channels)?;
                types
                    .into_iter()
                    .zip(versions)
                    .map(|(channel_type, version)| Channel {
                        channel_type,
                        version,
                    })
                    .collect()
            };
            nodes.push(record.into_node(channels));
        }

        Ok(Self { nodes })
    }

    /// Serialize the packet: data header, node records, then the channel
    /// lists.
    pub fn build(&self) -> Result<Vec<u8>> {
        let count = i32::try_from(self.nodes.len()).map_err(|_| {
            QuadtreeError::PacketTooLarge(format!("{} nodes", self.nodes.len()))
        })?;

        let mut records = Vec::with_capacity(self.nodes.len() * NodeRecord::SIZE);
        let mut data_buffer = Vec::new();
        let mut record_cursor = Cursor::new(&mut records);

        for (index, node) in self.nodes.iter().enumerate() {
            if node.channels.len() > MAX_CHANNELS {
                return Err(QuadtreeError::TooManyChannels {
                    node: index,
                    count: node.channels.len(),
                    max: MAX_CHANNELS,
                });
            }
            let num_channels = node.channels.len() as u16;

            let (type_offset, version_offset) = if num_channels == 0 {
                (0, 0)
            } else {
                let type_offset = buffer_offset(&data_buffer)?;
                for channel in &node.channels {
                    data_buffer.extend_from_slice(&channel.channel_type.to_le_bytes());
                }
                let version_offset = buffer_offset(&data_buffer)?;
                for channel in &node.channels {
                    data_buffer.extend_from_slice(&channel.version.to_le_bytes());
                }
                (type_offset, version_offset)
            };

            NodeRecord::from_node(node, num_channels, type_offset, version_offset)
                .write(&mut record_cursor)?;
        }

        let mut header = DataHeader::new(
            QUADTREE_PACKET_TYPE,
            QUADTREE_PACKET_VERSION,
            count,
            NodeRecord::SIZE as i32,
        );
        header.data_buffer_size = buffer_offset(&data_buffer)?;

        let mut out = header.build()?;
        out.reserve(records.len() + data_buffer.len());
        out.extend_from_slice(&records);
        out.extend_from_slice(&data_buffer);
        Ok(out)
    }
}

fn buffer_offset(data_buffer: &[u8]) -> Result<i32> {
    i32::try_from(data_buffer.len()).map_err(|_| {
        QuadtreeError::PacketTooLarge(format!(
            "channel data buffer reached {} bytes",
            data_buffer.len()
        ))
    })
}

fn read_u16_list(data_buffer: &[u8], node: usize, offset: i32, count: usize) -> Result<Vec<u16>> {
    let len = count * 2;
    let out_of_bounds = || QuadtreeError::ChannelOutOfBounds {
        node,
        offset: i64::from(offset),
        len,
    };
    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data_buffer.get(start..end))
        .ok_or_else(out_of_bounds)?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// [`QuadtreePacket::listing`] of a packet below the root quadset.
impl fmt::Display for QuadtreePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.listing(false).map_err(|_| fmt::Error)?;
        f.write_str(&out)
    }
}

impl PacketFormat for QuadtreePacket {
    fn parse(data: &[u8]) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(Self::build(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::quadtree::btg::ChildFlags;
    use crate::quadtree::reference::DataReference;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn path(s: &str) -> QuadtreePath {
        s.parse().expect("valid path")
    }

    fn sample_nodes() -> BTreeMap<QuadtreePath, QuadtreeNode> {
        let mut map = BTreeMap::new();
        map.insert(
            path(""),
            QuadtreeNode {
                image_version: 1,
                children: ChildFlags::from_bits(ChildFlags::IMAGE),
                ..QuadtreeNode::default()
            },
        );
        let mut drawable = QuadtreeNode {
            children: ChildFlags::from_bits(ChildFlags::DRAWABLE | ChildFlags::TERRAIN),
            terrain_version: 7,
            terrain_data_provider: 3,
            ..QuadtreeNode::default()
        };
        drawable.set_channel_version(10, 20);
        drawable.set_channel_version(11, 21);
        map.insert(path("0"), drawable);
        map.insert(
            path("02"),
            QuadtreeNode {
                children: ChildFlags::from_bits(ChildFlags::CACHE_NODE),
                cnode_version: 5,
                ..QuadtreeNode::default()
            },
        );
        map.insert(
            path("3"),
            QuadtreeNode {
                image_version: 9,
                image_data_provider: 2,
                children: ChildFlags::from_bits(ChildFlags::IMAGE),
                image_neighbors: [1, 2, 3, 4, 5, 6, 7, 8],
                ..QuadtreeNode::default()
            },
        );
        map
    }

    #[test]
    fn test_from_nodes_sets_child_bits() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let bits: Vec<u8> = packet
            .nodes()
            .iter()
            .map(|n| n.children.child_bits())
            .collect();
        assert_eq!(bits, vec![0b1001, 0b0100, 0, 0]);
    }

    #[test]
    fn test_walk_matches_append_order() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let mut visited = Vec::new();
        packet
            .walk(|index, p, _| visited.push((index, p.to_string())))
            .expect("walk");
        assert_eq!(
            visited,
            vec![
                (0, String::new()),
                (1, "0".to_string()),
                (2, "02".to_string()),
                (3, "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_walk_stops_when_nodes_run_out() {
        let mut packet = QuadtreePacket::new();
        packet.push_node(QuadtreeNode {
            children: ChildFlags::from_bits(0x0F),
            ..QuadtreeNode::default()
        });
        packet.push_node(QuadtreeNode::default());
        let mut count = 0;
        packet.walk(|_, _, _| count += 1).expect("walk");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_build_layout() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let bytes = packet.build().expect("build");

        let header = DataHeader::parse(&bytes).expect("header");
        assert_eq!(header.data_type_id, QUADTREE_PACKET_TYPE);
        assert_eq!(header.version, QUADTREE_PACKET_VERSION);
        assert_eq!(header.num_instances, 4);
        assert_eq!(header.data_instance_size, 32);
        assert_eq!(header.data_buffer_offset, 32 + 4 * 32);
        assert_eq!(header.data_buffer_size, 8);
        assert_eq!(bytes.len(), 32 + 4 * 32 + 8);

        // Node 1 carries both channel lists at the start of the buffer
        let record = &bytes[64..96];
        assert_eq!(&record[8..10], &[2, 0]);
        assert_eq!(&record[12..16], &[0, 0, 0, 0]);
        assert_eq!(&record[16..20], &[4, 0, 0, 0]);
        assert_eq!(&bytes[160..], &[10, 0, 11, 0, 20, 0, 21, 0]);
    }

    #[test]
    fn test_parse_build_round_trip() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let bytes = packet.build().expect("build");
        let parsed = QuadtreePacket::parse(&bytes).expect("parse");
        assert_eq!(parsed, packet);
        <QuadtreePacket as PacketFormat>::verify_round_trip(&bytes).expect("round trip");
    }

    #[test]
    fn test_empty_packet() {
        let bytes = QuadtreePacket::new().build().expect("build");
        assert_eq!(bytes.len(), DataHeader::SIZE);
        let parsed = QuadtreePacket::parse(&bytes).expect("parse");
        assert!(parsed.is_empty());
        assert_eq!(parsed.to_string(), "0 nodes\n");
    }

    #[test]
    fn test_find_node() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        assert_eq!(
            packet.find_node(&path("02")).map(|n| n.cnode_version),
            Some(5)
        );
        assert_eq!(
            packet.find_node(&path("3")).map(|n| n.image_version),
            Some(9)
        );
        assert!(packet.find_node(&path("1")).is_none());
    }

    #[test]
    fn test_data_references_with_prefix() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let refs = packet.data_references(&path("21")).expect("refs");

        assert_eq!(refs.qtp, vec![DataReference::new(path("2102"), 5, 0, 0)]);
        assert_eq!(
            refs.img,
            vec![
                DataReference::new(path("21"), 1, 0, 0),
                DataReference::new(path("213"), 9, 0, 2),
            ]
        );
        assert_eq!(refs.ter, vec![DataReference::new(path("210"), 7, 1, 3)]);
        assert_eq!(
            refs.vec,
            vec![
                DataReference::new(path("210"), 20, 10, 0),
                DataReference::new(path("210"), 21, 11, 0),
            ]
        );
    }

    #[test]
    fn test_has_layer_of_type() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        assert!(packet.has_layer_of_type(LayerType::Imagery));
        assert!(packet.has_layer_of_type(LayerType::Terrain));
        assert!(packet.has_layer_of_type(LayerType::Vector));
        assert!(!packet.has_layer_of_type(LayerType::ImageryHistory));
        assert!(!QuadtreePacket::new().has_layer_of_type(LayerType::Imagery));
    }

    #[test]
    fn test_display_listing() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let listing = packet.to_string();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "4 nodes");
        assert_eq!(
            lines[1],
            "  node 0  s0 \"\"  iv = 1, ip = 0, tv = 0, tp = 0, c = 0, flags = 0x49(I03)"
        );
        assert_eq!(
            lines[2],
            "  node 1  s1 \"0\"  iv = 0, ip = 0, tv = 7, tp = 3, c = 0, flags = 0xa4(TV2)"
        );
        assert_eq!(lines[3], "    V0: layer = 10, version = 20");
        assert_eq!(lines[4], "    V1: layer = 11, version = 21");
        assert!(lines[5].starts_with("  node 2  s4 \"02\""));
        assert!(lines[6].starts_with("  node 3  s256 \"3\""));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_root_listing_uses_level_order() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let listing = packet.listing(true).expect("listing");
        let lines: Vec<&str> = listing.lines().collect();
        assert!(lines[5].starts_with("  node 2  s7 \"02\""));
        assert!(lines[6].starts_with("  node 3  s4 \"3\""));
    }

    #[test]
    fn test_listing_of_deep_node() {
        let mut map = BTreeMap::new();
        for p in ["", "0", "00", "000", "0000"] {
            map.insert(path(p), QuadtreeNode::default());
        }
        let packet = QuadtreePacket::from_nodes(map).expect("valid tree");
        let listing = packet.listing(true).expect("listing");
        assert!(listing.contains("  node 4  s? \"0000\""));
        assert!(packet.listing(false).expect("listing").contains("  node 4  s22 \"0000\""));
    }

    #[test]
    fn test_find_node_by_subindex() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        assert_eq!(
            packet.find_node_by_subindex(4, false).map(|n| n.cnode_version),
            Some(5)
        );
        assert_eq!(
            packet.find_node_by_subindex(256, false).map(|n| n.image_version),
            Some(9)
        );
        assert_eq!(
            packet.find_node_by_subindex(7, true).map(|n| n.cnode_version),
            Some(5)
        );
        assert_eq!(
            packet.find_node_by_subindex(4, true).map(|n| n.image_version),
            Some(9)
        );
        assert!(packet.find_node_by_subindex(86, false).is_none());
        assert!(packet.find_node_by_subindex(85, true).is_none());
    }

    #[test]
    fn test_missing_parent_is_rejected() {
        let mut map = sample_nodes();
        map.insert(path("123"), QuadtreeNode::default());
        assert!(matches!(
            QuadtreePacket::from_nodes(map),
            Err(QuadtreeError::InvalidTree(_))
        ));
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let mut map = BTreeMap::new();
        map.insert(path("1"), QuadtreeNode::default());
        assert!(matches!(
            QuadtreePacket::from_nodes(map),
            Err(QuadtreeError::InvalidTree(_))
        ));
    }

    #[test]
    fn test_cache_node_with_children_is_rejected() {
        let mut map = sample_nodes();
        map.insert(path("020"), QuadtreeNode::default());
        assert!(matches!(
            QuadtreePacket::from_nodes(map),
            Err(QuadtreeError::InvalidTree(_))
        ));
    }

    #[test]
    fn test_too_many_channels() {
        let mut node = QuadtreeNode::default();
        node.channels = (0..=MAX_CHANNELS)
            .map(|i| Channel {
                channel_type: i as u16,
                version: 0,
            })
            .collect();
        let mut packet = QuadtreePacket::new();
        packet.push_node(QuadtreeNode::default());
        packet.push_node(node);
        assert!(matches!(
            packet.build(),
            Err(QuadtreeError::TooManyChannels { node: 1, count, max })
                if count == MAX_CHANNELS + 1 && max == MAX_CHANNELS
        ));
    }

    #[test]
    fn test_truncated_node_records() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let bytes = packet.build().expect("build");
        assert!(matches!(
            QuadtreePacket::parse(&bytes[..100]),
            Err(QuadtreeError::Truncated { context: "node records", .. })
        ));
    }

    #[test]
    fn test_channel_offset_out_of_bounds() {
        let packet = QuadtreePacket::from_nodes(sample_nodes()).expect("valid tree");
        let mut bytes = packet.build().expect("build");
        // Version list offset of node 1
        bytes[80..84].copy_from_slice(&6i32.to_le_bytes());
        assert!(matches!(
            QuadtreePacket::parse(&bytes),
            Err(QuadtreeError::ChannelOutOfBounds { node: 1, offset: 6, len: 4 })
        ));

        bytes[80..84].copy_from_slice(&(-2i32).to_le_bytes());
        assert!(matches!(
            QuadtreePacket::parse(&bytes),
            Err(QuadtreeError::ChannelOutOfBounds { node: 1, offset: -2, .. })
        ));
    }

    fn arb_node() -> impl Strategy<Value = QuadtreeNode> {
        (
            any::<u8>(),
            any::<[u16; 3]>(),
            proptest::collection::vec(any::<(u16, u16)>(), 0..6),
            any::<[u8; 8]>(),
            any::<[u8; 2]>(),
        )
            .prop_map(|(bits, versions, channels, neighbors, providers)| {
                let mut node = QuadtreeNode {
                    children: ChildFlags::from_bits(bits),
                    cnode_version: versions[0],
                    image_version: versions[1],
                    terrain_version: versions[2],
                    image_neighbors: neighbors,
                    image_data_provider: providers[0],
                    terrain_data_provider: providers[1],
                    ..QuadtreeNode::default()
                };
                for (channel_type, version) in channels {
                    node.set_channel_version(channel_type, version);
                }
                node
            })
    }

    proptest! {
        #[test]
        fn prop_nodes_survive_round_trip(nodes in proptest::collection::vec(arb_node(), 0..20)) {
            let mut packet = QuadtreePacket::new();
            for node in nodes {
                packet.push_node(node);
            }
            let bytes = packet.build().expect("build");
            let parsed = QuadtreePacket::parse(&bytes).expect("parse");
            prop_assert_eq!(&parsed, &packet);
            prop_assert_eq!(parsed.build().expect("rebuild"), bytes);
        }
    }
}
