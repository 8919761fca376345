//! Quadtree packets.
//!
//! A quadtree packet describes one quadset: a small subtree of the global
//! tile quadtree. Every node says which of its four children are present
//! in the same packet, whether its subtree continues in another packet
//! (cache node), and which imagery, terrain and vector versions exist for
//! the tile.
//!
//! # Wire layout
//!
//! | Section | Size | Contents |
//! |---------|------|----------|
//! | Data header | 32 | Magic, type 1, version 2, node count, node size, buffer offset and size |
//! | Node records | 32 × n | One [`QuadtreeNode`] per entry, pre-order |
//! | Data buffer | variable | Per node with channels: its channel types, then its channel versions |
//!
//! All integers are little-endian. Packets are stored compressed and
//! XOR-ed, see [`encode_quadtree_packet`].
//!
//! # Example
//!
//! ```rust
//! use globestore_formats::quadtree::{LayerType, QuadtreeNode, QuadtreePacket, QuadtreePath};
//! use std::collections::BTreeMap;
//!
//! let mut nodes = BTreeMap::new();
//! nodes.insert(QuadtreePath::root(), QuadtreeNode::default());
//! let mut child = QuadtreeNode::default();
//! child.children.set_image(true);
//! child.image_version = 4;
//! nodes.insert("2".parse::<QuadtreePath>().expect("valid path"), child);
//!
//! let packet = QuadtreePacket::from_nodes(nodes).expect("valid tree");
//! assert!(packet.has_layer_of_type(LayerType::Imagery));
//!
//! let bytes = packet.build().expect("serializable");
//! assert_eq!(QuadtreePacket::parse(&bytes).expect("valid packet"), packet);
//! ```

mod btg;
mod codec;
mod error;
mod header;
mod node;
mod numbering;
mod packet;
mod path;
mod reference;

pub use btg::ChildFlags;
pub use codec::{decode_quadtree_packet, encode_quadtree_packet};
pub use error::{QuadtreeError, Result};
pub use header::{DataHeader, KEYHOLE_MAGIC_ID};
pub use node::{Channel, IMAGE_NEIGHBOR_COUNT, MAX_CHANNELS, QuadtreeNode};
pub use numbering::{
    QuadtreeNumbering, global_node_number_to_path, is_quadset_root_level,
    level_row_col_to_maps_path, maps_path_to_level_row_col, path_to_global_node_number,
    path_to_quadset_and_subindex, quadset_and_subindex_to_path,
};
pub use packet::{QUADTREE_PACKET_TYPE, QUADTREE_PACKET_VERSION, QuadtreePacket};
pub use path::{MAX_LEVEL, QuadtreePath};
pub use reference::{DataReference, DataReferenceGroup, LayerType};
