#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for the stored quadtree packet pipeline
//!
//! Builds a full quadset (root plus three levels), pushes it through
//! serialize, compress and XOR, and checks that the decoded packet walks
//! and references the same tiles.

use globestore_crypto::PacketCipher;
use globestore_formats::PacketFormat;
use globestore_formats::quadtree::{
    ChildFlags, LayerType, QuadtreeNode, QuadtreePacket, QuadtreePath, decode_quadtree_packet,
    encode_quadtree_packet,
};
use std::collections::BTreeMap;

const QUADSET_DEPTH: u32 = 3;

fn test_cipher() -> PacketCipher {
    let key: Vec<u8> = (0..1024u32).map(|i| (i * 7 + 3) as u8).collect();
    PacketCipher::new(&key).expect("key")
}

/// Every tile down to `QUADSET_DEPTH`; the deepest level are cache nodes
/// pointing at the next quadset.
fn full_quadset() -> BTreeMap<QuadtreePath, QuadtreeNode> {
    let mut nodes = BTreeMap::new();
    let mut frontier = vec![QuadtreePath::root()];
    while let Some(path) = frontier.pop() {
        let mut node = QuadtreeNode {
            image_version: 100 + path.level() as u16,
            image_data_provider: (path.raw() >> 60) as u8,
            ..QuadtreeNode::default()
        };
        node.children.set_image(true);
        if path.level() == QUADSET_DEPTH {
            node.children.set_cache_node(true);
            node.cnode_version = 7;
        } else {
            for quad in 0..4 {
                frontier.push(path.child(quad).expect("child"));
            }
        }
        if path.level() == 1 {
            node.children.set_drawable(true);
            node.set_channel_version(3, 40);
            node.set_channel_version(8, 41);
        }
        nodes.insert(path, node);
    }
    nodes
}

#[test]
fn quadset_has_expected_shape() {
    let packet = QuadtreePacket::from_nodes(full_quadset()).expect("valid tree");
    assert_eq!(packet.len(), 85);

    let mut visited = Vec::new();
    packet
        .walk(|index, path, _| visited.push((index, path)))
        .expect("walk");
    assert_eq!(visited.len(), 85);
    assert!(visited.iter().enumerate().all(|(i, (index, _))| i == *index));

    // Pre-order visit equals path order
    let mut sorted: Vec<QuadtreePath> = visited.iter().map(|(_, p)| *p).collect();
    sorted.sort();
    assert_eq!(
        sorted,
        visited.iter().map(|(_, p)| *p).collect::<Vec<_>>()
    );
}

#[test]
fn pipeline_round_trip() {
    let packet = QuadtreePacket::from_nodes(full_quadset()).expect("valid tree");
    let cipher = test_cipher();

    let stored = encode_quadtree_packet(&packet, &cipher).expect("encode");
    let decoded = decode_quadtree_packet(&stored, &cipher).expect("decode");
    assert_eq!(decoded, packet);

    let raw = packet.build().expect("build");
    QuadtreePacket::verify_round_trip(&raw).expect("byte-exact round trip");
}

#[test]
fn references_of_decoded_packet() {
    let prefix: QuadtreePath = "0123".parse().expect("valid path");
    let packet = QuadtreePacket::from_nodes(full_quadset()).expect("valid tree");
    let cipher = test_cipher();
    let stored = encode_quadtree_packet(&packet, &cipher).expect("encode");
    let decoded = decode_quadtree_packet(&stored, &cipher).expect("decode");

    let refs = decoded.data_references(&prefix).expect("references");
    assert_eq!(refs.img.len(), 85);
    assert_eq!(refs.qtp.len(), 64);
    assert_eq!(refs.vec.len(), 8);
    assert!(refs.ter.is_empty());

    assert!(refs.qtp.iter().all(|r| r.path.level() == 7 && r.version == 7));
    assert!(refs.img.iter().all(|r| prefix.is_ancestor_of(&r.path)));
    assert_eq!(refs.img[0].path, prefix);
    assert_eq!(refs.img[0].version, 100);

    let child_quadset: QuadtreePath = "0123321".parse().expect("valid path");
    assert!(refs.qtp.iter().any(|r| r.path == child_quadset));

    assert!(decoded.has_layer_of_type(LayerType::Vector));
    assert!(!decoded.has_layer_of_type(LayerType::Terrain));
}

#[test]
fn cache_nodes_carry_no_child_bits() {
    let packet = QuadtreePacket::from_nodes(full_quadset()).expect("valid tree");
    for node in packet.nodes() {
        if node.children.is_cache_node() {
            assert_eq!(node.children.child_bits(), 0);
        } else {
            assert_eq!(node.children.child_bits(), ChildFlags::CHILD_MASK);
        }
    }
}

#[test]
fn corrupted_stored_packet_is_rejected() {
    let packet = QuadtreePacket::from_nodes(full_quadset()).expect("valid tree");
    let cipher = test_cipher();
    let mut stored = encode_quadtree_packet(&packet, &cipher).expect("encode");
    let mid = stored.len() / 2;
    stored.truncate(mid);
    assert!(decode_quadtree_packet(&stored, &cipher).is_err());
}
