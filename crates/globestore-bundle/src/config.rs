//! Configuration for bundle readers and writers

use crate::{BundleError, DEFAULT_SEGMENT_BREAK, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Read cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCacheConfig {
    /// Number of blocks kept in memory (at least 2)
    pub max_blocks: u32,

    /// Size of one cache block in bytes
    pub block_size: u32,
}

impl Default for ReadCacheConfig {
    fn default() -> Self {
        Self {
            max_blocks: 64,
            block_size: 64 * 1024,
        }
    }
}

/// Configuration for opening or creating a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Maximum bytes per segment for new writers
    pub segment_break: u64,

    /// Write coalescing buffer size (0 disables buffering)
    pub write_buffer_size: usize,

    /// Optional LRU read cache
    pub read_cache: Option<ReadCacheConfig>,

    /// Prefix applied to absolute paths stored in a header
    pub path_prefix: Option<PathBuf>,

    /// Wipe the destination directory when creating a bundle
    pub overwrite: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            segment_break: DEFAULT_SEGMENT_BREAK,
            write_buffer_size: 0,
            read_cache: None,
            path_prefix: None,
            overwrite: false,
        }
    }
}

impl BundleConfig {
    /// Set the segment break for new writers
    #[must_use]
    pub const fn with_segment_break(mut self, segment_break: u64) -> Self {
        self.segment_break = segment_break;
        self
    }

    /// Set the write coalescing buffer size
    #[must_use]
    pub const fn with_write_buffer(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Enable the read cache
    #[must_use]
    pub const fn with_read_cache(mut self, max_blocks: u32, block_size: u32) -> Self {
        self.read_cache = Some(ReadCacheConfig {
            max_blocks,
            block_size,
        });
        self
    }

    /// Set the prefix for absolute stored paths
    #[must_use]
    pub fn with_path_prefix<P: AsRef<Path>>(mut self, prefix: P) -> Self {
        self.path_prefix = Some(prefix.as_ref().to_path_buf());
        self
    }

    /// Wipe the destination directory on create
    #[must_use]
    pub const fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.segment_break == 0 || self.segment_break > u64::from(u32::MAX) {
            return Err(BundleError::Config(format!(
                "segment break {} must be between 1 and {}",
                self.segment_break,
                u32::MAX
            )));
        }
        if let Some(cache) = &self.read_cache {
            if cache.max_blocks < 2 {
                return Err(BundleError::Config(format!(
                    "read cache needs at least 2 blocks, got {}",
                    cache.max_blocks
                )));
            }
            if cache.block_size == 0 {
                return Err(BundleError::Config(
                    "read cache block size must not be 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BundleError::Config(format!("invalid bundle config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BundleError::Config(format!("cannot serialize bundle config: {e}")))
    }
}
