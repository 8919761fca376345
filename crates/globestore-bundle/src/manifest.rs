//! Manifest entries for packaging bundles.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file that belongs to a bundle.
///
/// Packaging tools copy `current_path` to wherever `orig_path` says the
/// file should live in the final layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Where the file belongs
    pub orig_path: PathBuf,
    /// Where the file is right now
    pub current_path: PathBuf,
    /// File size in bytes
    pub data_size: u64,
}

impl ManifestEntry {
    /// Create an entry.
    pub fn new(orig_path: impl Into<PathBuf>, current_path: impl Into<PathBuf>, data_size: u64) -> Self {
        Self {
            orig_path: orig_path.into(),
            current_path: current_path.into(),
            data_size,
        }
    }
}
