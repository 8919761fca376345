//! Stored form of quadtree packets: serialize, compress, then XOR.

use crate::compress::{compress_packet, decompress_packet};
use crate::quadtree::error::Result;
use crate::quadtree::packet::QuadtreePacket;
use globestore_crypto::PacketCipher;

/// Encode a packet into the form stored in a bundle.
pub fn encode_quadtree_packet(packet: &QuadtreePacket, cipher: &PacketCipher) -> Result<Vec<u8>> {
    let raw = packet.build()?;
    let mut stored = compress_packet(&raw)?;
    cipher.apply(&mut stored);
    Ok(stored)
}

/// Decode a packet read from a bundle.
pub fn decode_quadtree_packet(stored: &[u8], cipher: &PacketCipher) -> Result<QuadtreePacket> {
    let compressed = cipher.decode(stored);
    let raw = decompress_packet(&compressed)?;
    QuadtreePacket::parse(&raw)
}
