//! Read-only access to an existing bundle.

use crate::bundle::FileBundle;
use crate::config::BundleConfig;
use crate::Result;
use std::ops::Deref;
use std::path::Path;
use tracing::info;

/// An existing bundle opened for reading.
///
/// All read operations live on [`FileBundle`], reachable through `Deref`.
/// Reads take `&self`, so one reader can be shared between threads.
/// With the read cache enabled, each read holds the cache lock until its
/// blocks are filled, so concurrent reads run one at a time.
#[derive(Debug)]
pub struct FileBundleReader {
    bundle: FileBundle,
}

impl FileBundleReader {
    /// Open the bundle in `dir` with the default configuration.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_config(dir, &BundleConfig::default())
    }

    /// Open the bundle in `dir`.
    ///
    /// Only `path_prefix` and `read_cache` of `config` apply to readers.
    pub fn open_with_config<P: AsRef<Path>>(dir: P, config: &BundleConfig) -> Result<Self> {
        let mut bundle = FileBundle::new(dir, 0, config.path_prefix.clone())?;
        bundle.load_header()?;
        if let Some(cache) = &config.read_cache {
            bundle.enable_read_cache(cache.max_blocks, cache.block_size)?;
        }
        info!(
            "Opened bundle {} ({} segments, {} bytes)",
            bundle.path().display(),
            bundle.segment_count(),
            bundle.data_size()
        );
        Ok(Self { bundle })
    }

    /// Forget where the header and segments were originally written.
    /// Manifests built afterwards point every entry at its current path.
    pub fn clear_orig_paths(&mut self) {
        self.bundle.clear_orig_paths();
    }
}

impl Deref for FileBundleReader {
    type Target = FileBundle;

    fn deref(&self) -> &FileBundle {
        &self.bundle
    }
}
