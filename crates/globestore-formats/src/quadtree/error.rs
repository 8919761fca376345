//! Error types for quadtree packet parsing and building

use crate::compress::CompressError;
use thiserror::Error;

/// Errors that can occur when parsing or building quadtree packets
#[derive(Error, Debug)]
pub enum QuadtreeError {
    /// Invalid data header magic
    #[error("Invalid data header magic: expected {expected}, got {actual}")]
    InvalidMagic {
        /// Expected magic id
        expected: u32,
        /// Magic id found in the buffer
        actual: u32,
    },

    /// Buffer ended before a structure was complete
    #[error("Packet truncated: {context} needs {needed} bytes, buffer has {available}")]
    Truncated {
        /// Structure being read
        context: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Header field outside its valid range
    #[error("Invalid data header: {0}")]
    InvalidHeader(String),

    /// Channel list points outside the data buffer
    #[error("Node {node} channel list at offset {offset} ({len} bytes) lies outside the data buffer")]
    ChannelOutOfBounds {
        /// Node index in traversal order
        node: usize,
        /// Offset relative to the data buffer
        offset: i64,
        /// Length of the channel list in bytes
        len: usize,
    },

    /// Node carries more channels than the count field can hold
    #[error("Node {node} has {count} channels, limit is {max}")]
    TooManyChannels {
        /// Node index
        node: usize,
        /// Number of channels on the node
        count: usize,
        /// Maximum channel count
        max: usize,
    },

    /// Serialized packet would exceed the 32-bit offsets of the format
    #[error("Packet too large: {0}")]
    PacketTooLarge(String),

    /// Invalid quadtree path
    #[error("Invalid quadtree path: {0}")]
    InvalidPath(String),

    /// Node map handed to the builder is not a tree
    #[error("Invalid node tree: {0}")]
    InvalidTree(String),

    /// Packet compression failed
    #[error("Packet compression error: {0}")]
    Compress(#[from] CompressError),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Type alias for quadtree operation results
pub type Result<T> = std::result::Result<T, QuadtreeError>;
