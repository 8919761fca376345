//! Packet formats for globe tile storage
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::doc_markdown)] // Format names don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::derive_partial_eq_without_eq)] // Binary format structs
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate provides symmetric (parser and builder) implementations of the
//! packet formats stored inside globe tile bundles.
//!
//! # Supported Formats
//!
//! - **Data header**: the 32-byte header shared by every packet type
//! - **Quadtree packet**: one quadset of quadtree nodes with their layer
//!   versions, providers and vector channels
//! - **Data references**: (path, version, channel, provider) tuples derived
//!   from a quadtree packet
//! - **Packet compression**: magic-prefixed zlib envelope
//!
//! # Design Principles
//!
//! Every format implementation follows these principles:
//! - **Symmetric Operations**: Both parsing and building supported
//! - **Type Safety**: Use Rust's type system to enforce invariants
//! - **Round-Trip Guarantee**: parse(build(data)) == data

#![warn(missing_docs)]

/// Magic-prefixed zlib compression for packets
pub mod compress;
/// Quadtree packet codec
///
/// Quadtree packets describe one quadset: a four-level subtree of the
/// global quadtree, listing which tiles exist below it and which imagery,
/// terrain and vector versions each tile carries. See the [`quadtree`]
/// module for the wire layout.
pub mod quadtree;

/// Common format trait that all packet formats implement
pub trait PacketFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
