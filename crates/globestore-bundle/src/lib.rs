//! Segmented file bundles for globe tile storage.
//!
//! A bundle is a directory holding a `bundle.hdr` header and a series of
//! segment files (`bundle.0000`, `bundle.0001`, ...). Together they form
//! one virtual address space in which segment `i` covers
//! `[i * segment_break, i * segment_break + size_i)`. Records never cross
//! a segment boundary; a writer starts a new segment instead.
//!
//! - **Header**: signature, format version, segment table and the
//!   original location of every file, protected by a trailing CRC-32.
//!   Paths are stored relative to the bundle so a bundle directory can be
//!   moved or copied.
//! - **Reader**: memory-mapped segments, plain and CRC-checked reads, and
//!   an optional LRU block cache.
//! - **Writer**: appends with automatic segment rollover, in-place
//!   overwrites, write coalescing, checkpoints, update writers that
//!   extend an existing bundle and import of legacy `pack.NNNN` files.
//!
//! # Example
//!
//! ```rust,no_run
//! use globestore_bundle::{BundleConfig, FileBundleReader, FileBundleWriter};
//!
//! # fn example() -> globestore_bundle::Result<()> {
//! let config = BundleConfig::default().with_segment_break(64 * 1024 * 1024);
//! let mut writer = FileBundleWriter::create("/tmp/tiles", &config)?;
//! let mut record = b"tile payload\0\0\0\0".to_vec();
//! let pos = writer.write_append_crc(&mut record)?;
//! writer.close()?;
//!
//! let reader = FileBundleReader::open("/tmp/tiles")?;
//! let payload = reader.read_at_crc_vec(pos, record.len())?;
//! assert_eq!(payload, b"tile payload");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use globestore_crypto::CrcError;
use std::path::PathBuf;
use thiserror::Error;

// Record addresses
pub mod addr;

// Shared bundle state: addressing, reads, header persistence
pub mod bundle;

// LRU block cache
pub mod cache;

// Configuration
pub mod config;

// Header file format
pub mod header;

// Manifest entries for packaging
pub mod manifest;

// Path portability
pub mod paths;

// Read-only bundles
pub mod reader;

// Segment files
pub mod segment;

// Writers
pub mod writer;

mod io;

pub use addr::FileBundleAddr;
pub use bundle::{FileBundle, SegmentPosition};
pub use cache::{CacheBlockAddress, CacheStats, CachedReadAccessor};
pub use config::{BundleConfig, ReadCacheConfig};
pub use manifest::ManifestEntry;
pub use reader::FileBundleReader;
pub use segment::SegmentKind;
pub use writer::FileBundleWriter;

/// Result type for bundle operations.
pub type Result<T> = std::result::Result<T, BundleError>;

/// Errors that can occur during bundle operations.
#[derive(Debug, Error)]
pub enum BundleError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file or directory could not be opened or created.
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Persisted data is corrupt.
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// The caller broke an API contract.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A new bundle would overwrite an existing one.
    #[error("Destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Trailing CRC could not be checked or computed.
    #[error("CRC error: {0}")]
    Crc(#[from] CrcError),
}

/// Version information for the bundle library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header file name inside a bundle directory.
pub const HEADER_FILE_NAME: &str = "bundle.hdr";

/// Prefix of segment file names.
pub const SEGMENT_FILE_PREFIX: &str = "bundle";

/// Number of digits in a segment file suffix.
pub const SEGMENT_FILE_SUFFIX_LENGTH: usize = 4;

/// Maximum number of segments in one bundle.
pub const SEGMENT_FILE_COUNT_MAX: usize = 10_000;

/// Default segment break for new bundles (1 GiB).
pub const DEFAULT_SEGMENT_BREAK: u64 = 1 << 30;

/// File name of segment `index`, e.g. `bundle.0007`.
pub fn segment_file_name(index: usize) -> String {
    format!(
        "{SEGMENT_FILE_PREFIX}.{index:0width$}",
        width = SEGMENT_FILE_SUFFIX_LENGTH
    )
}
