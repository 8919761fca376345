//! State shared by bundle readers and writers.
//!
//! A [`FileBundle`] owns the segment list of one bundle directory and maps
//! virtual addresses onto it. Segment `i` covers
//! `[i * segment_break, i * segment_break + data_size_i)`; nothing in that
//! range may cross into the next segment.

use crate::addr::FileBundleAddr;
use crate::cache::{CacheStats, CachedReadAccessor};
use crate::header::{BundleHeader, SegmentRecord};
use crate::manifest::ManifestEntry;
use crate::paths::{
    normalize_lexically, portable_dir_path, portable_file_name, resolve_file_name,
    resolve_stored_path, to_stored_string,
};
use crate::segment::{Segment, SegmentKind};
use crate::{BundleError, HEADER_FILE_NAME, Result};
use globestore_crypto::{CRC_SIZE, crc32};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of the temporary file used while replacing a header.
const HEADER_TMP_SUFFIX: &str = ".tmp";

/// Result of mapping a virtual address to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPosition {
    /// Index of the segment
    pub segment: usize,
    /// Byte offset within the segment
    pub offset: u64,
}

/// One bundle directory: segments, header state and an optional read cache.
#[derive(Debug)]
pub struct FileBundle {
    /// Absolute, normalized bundle directory
    pub(crate) dir: PathBuf,
    pub(crate) segment_break: u64,
    /// Sum of all segment sizes
    pub(crate) data_size: u64,
    pub(crate) segments: Vec<Segment>,
    /// Size of the header file including its CRC
    pub(crate) header_size: u64,
    /// Directory the header was originally written to (empty if unknown)
    pub(crate) orig_path: PathBuf,
    pub(crate) path_prefix: Option<PathBuf>,
    pub(crate) was_relative_paths: bool,
    next_segment_id: u32,
    cache: Mutex<Option<CachedReadAccessor>>,
}

impl FileBundle {
    pub(crate) fn new(
        dir: impl AsRef<Path>,
        segment_break: u64,
        path_prefix: Option<PathBuf>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let absolute = std::path::absolute(dir).map_err(|source| BundleError::Open {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: normalize_lexically(&absolute),
            segment_break,
            data_size: 0,
            segments: Vec::new(),
            header_size: 0,
            orig_path: PathBuf::new(),
            path_prefix,
            was_relative_paths: true,
            next_segment_id: 0,
            cache: Mutex::new(None),
        })
    }

    /// Bundle directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Full path of the header file.
    pub fn header_path(&self) -> PathBuf {
        self.dir.join(HEADER_FILE_NAME)
    }

    /// Maximum bytes per segment.
    pub const fn segment_break(&self) -> u64 {
        self.segment_break
    }

    /// Total bytes in all segments.
    pub const fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Segments in address order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment file names, relative to the bundle directory.
    pub fn segment_list(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.name().to_string()).collect()
    }

    /// Original directory of every segment.
    pub fn segment_orig_paths(&self) -> Vec<PathBuf> {
        self.segments.iter().map(|s| s.orig_path().to_path_buf()).collect()
    }

    /// Directory the header was originally written to.
    pub fn orig_path(&self) -> &Path {
        &self.orig_path
    }

    /// Header file size, CRC included.
    pub const fn header_size(&self) -> u64 {
        self.header_size
    }

    /// False if the loaded header stored any absolute path.
    pub const fn was_relative_paths(&self) -> bool {
        self.was_relative_paths
    }

    /// Map `[pos, pos + len)` to a segment.
    ///
    /// The range must lie entirely within one segment's data. When
    /// `expected` is given the segment must also be of that kind.
    pub fn position_to_segment(
        &self,
        pos: u64,
        len: u64,
        expected: Option<SegmentKind>,
    ) -> Result<SegmentPosition> {
        let index = pos / self.segment_break;
        let offset = pos % self.segment_break;

        let segment = usize::try_from(index)
            .ok()
            .and_then(|i| self.segments.get(i).map(|s| (i, s)));
        let Some((index, segment)) = segment else {
            return Err(BundleError::Internal(format!(
                "position {pos} maps to segment {index}, bundle has {}",
                self.segments.len()
            )));
        };
        if offset.checked_add(len).is_none_or(|end| end > segment.data_size()) {
            return Err(BundleError::Internal(format!(
                "position {pos} length {len} not within segment {} ({} bytes)",
                segment.name(),
                segment.data_size()
            )));
        }
        if let Some(kind) = expected {
            if segment.kind() != kind {
                return Err(BundleError::Internal(format!(
                    "operation type {kind} does not match segment type {}",
                    segment.kind()
                )));
            }
        }
        Ok(SegmentPosition {
            segment: index,
            offset,
        })
    }

    /// True if `pos` lies within the data of a writer segment.
    pub fn is_writeable(&self, pos: u64) -> bool {
        let offset = pos % self.segment_break;
        usize::try_from(pos / self.segment_break)
            .ok()
            .and_then(|i| self.segments.get(i))
            .is_some_and(|s| s.kind() == SegmentKind::Writer && offset < s.data_size())
    }

    /// Convert a linear address (contiguous across segments, as used by
    /// legacy pack files) to a bundle address.
    pub fn linear_to_bundle_position(&self, linear: u64) -> Result<u64> {
        let mut remainder = linear;
        for (index, segment) in self.segments.iter().enumerate() {
            if remainder < segment.data_size() {
                return Ok(index as u64 * self.segment_break + remainder);
            }
            remainder -= segment.data_size();
        }
        Err(BundleError::Internal(format!(
            "linear position {linear} is beyond end of bundle ({} bytes)",
            self.data_size
        )))
    }

    /// Fill `buf` from bundle address `pos`.
    pub fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let loc = self.position_to_segment(pos, buf.len() as u64, None)?;
        let segment = &self.segments[loc.segment];
        if let Some(cache) = self.cache.lock().as_mut() {
            return cache.pread(segment, buf, loc.offset);
        }
        segment.read_into(buf, loc.offset)
    }

    /// Read `len` bytes from `pos` into a new buffer.
    pub fn read_at_vec(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read the record at `addr`.
    pub fn read_addr(&self, addr: FileBundleAddr) -> Result<Vec<u8>> {
        self.read_at_vec(addr.offset, addr.size as usize)
    }

    /// Fill `buf` from `pos` and check its trailing CRC.
    ///
    /// The last 4 bytes of `buf` must hold the little-endian CRC-32 of the
    /// bytes before them.
    pub fn read_at_crc(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        if buf.len() <= CRC_SIZE {
            return Err(BundleError::Internal(format!(
                "CRC read of {} bytes, must be larger than the CRC size",
                buf.len()
            )));
        }
        self.read_at(pos, buf)?;

        let (data, stored) = buf.split_at(buf.len() - CRC_SIZE);
        let stored = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        if crc32(data) != stored {
            let loc = self.position_to_segment(pos, buf.len() as u64, None)?;
            return Err(BundleError::Corruption(format!(
                "CRC mismatch, offset={}, len={}, file: {}",
                loc.offset,
                buf.len(),
                self.segments[loc.segment].path().display()
            )));
        }
        Ok(())
    }

    /// Read a CRC-protected record of `len` bytes and return its payload
    /// without the CRC.
    pub fn read_at_crc_vec(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at_crc(pos, &mut buf)?;
        buf.truncate(len - CRC_SIZE);
        Ok(buf)
    }

    /// Read the CRC-protected record at `addr`, returning its payload.
    pub fn read_addr_crc(&self, addr: FileBundleAddr) -> Result<Vec<u8>> {
        self.read_at_crc_vec(addr.offset, addr.size as usize)
    }

    /// Route reads through an LRU cache of `max_blocks` blocks.
    ///
    /// Fewer than two blocks leaves the cache disabled. While the cache is
    /// on, reads through this bundle are serialized on its lock.
    pub fn enable_read_cache(&self, max_blocks: u32, block_size: u32) -> Result<()> {
        if max_blocks < 2 {
            debug!(
                "Read cache not enabled for {}: {max_blocks} blocks requested",
                self.dir.display()
            );
            return Ok(());
        }
        let cache = CachedReadAccessor::new(max_blocks, block_size)?;
        *self.cache.lock() = Some(cache);
        debug!(
            "Read cache enabled for {}: {max_blocks} x {block_size} bytes",
            self.dir.display()
        );
        Ok(())
    }

    /// Drop the read cache.
    pub fn disable_read_cache(&self) {
        *self.cache.lock() = None;
    }

    /// Statistics of the read cache, if one is enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.lock().as_ref().map(CachedReadAccessor::stats)
    }

    pub(crate) fn invalidate_cached_segment(&self, segment_id: u32) {
        if let Some(cache) = self.cache.lock().as_mut() {
            cache.invalidate_segment(segment_id);
        }
    }

    pub(crate) const fn allocate_segment_id(&mut self) -> u32 {
        let id = self.next_segment_id;
        self.next_segment_id += 1;
        id
    }

    /// Add one entry for the header and one per segment to `manifest`.
    ///
    /// If the header was loaded with absolute paths, it will be rewritten
    /// with relative ones on delivery, so the entry carries the rewritten
    /// size. With `tmp_dir` the rewritten header is also written below it
    /// and the entry points there.
    pub fn append_manifest(
        &self,
        manifest: &mut Vec<ManifestEntry>,
        tmp_dir: Option<&Path>,
    ) -> Result<()> {
        let header_path = self.header_path();
        let orig_header = if self.orig_path.as_os_str().is_empty() {
            header_path.clone()
        } else {
            self.orig_path.join(HEADER_FILE_NAME)
        };

        let (current, size) = if self.was_relative_paths {
            (header_path, self.header_size)
        } else {
            let bytes = self.build_header_bytes()?;
            match tmp_dir {
                Some(tmp_dir) => {
                    let target = tmp_dir.join(strip_root(&header_path));
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent).map_err(|source| BundleError::Open {
                            path: parent.to_path_buf(),
                            source,
                        })?;
                    }
                    fs::write(&target, &bytes).map_err(|source| BundleError::Open {
                        path: target.clone(),
                        source,
                    })?;
                    debug!("Wrote relocatable header {}", target.display());
                    (target, bytes.len() as u64)
                }
                None => (header_path, bytes.len() as u64),
            }
        };
        manifest.push(ManifestEntry::new(orig_header, current, size));

        for segment in &self.segments {
            let current = self.dir.join(segment.name());
            let orig = if segment.orig_path().as_os_str().is_empty() {
                current.clone()
            } else {
                segment.orig_path().join(segment.name())
            };
            manifest.push(ManifestEntry::new(orig, current, segment.data_size()));
        }
        Ok(())
    }

    pub(crate) fn clear_orig_paths(&mut self) {
        self.orig_path = PathBuf::new();
        for segment in &mut self.segments {
            segment.clear_orig_path();
        }
    }

    /// Populate the segment list from the header file.
    pub(crate) fn load_header(&mut self) -> Result<()> {
        let header_path = self.header_path();
        self.load_header_inner(&header_path).inspect_err(|e| {
            warn!("Failed to load bundle header {}: {e}", header_path.display());
        })
    }

    fn load_header_inner(&mut self, header_path: &Path) -> Result<()> {
        let data = fs::read(header_path).map_err(|source| BundleError::Open {
            path: header_path.to_path_buf(),
            source,
        })?;
        let header = BundleHeader::parse(&data, header_path)?;
        let prefix = self.path_prefix.clone();
        let prefix = prefix.as_deref();

        let orig = resolve_stored_path(&self.dir, &header.orig_path, prefix);
        let mut was_relative = orig.was_relative;
        let mut segments = Vec::with_capacity(header.segments.len());
        let mut data_size = 0u64;

        for record in &header.segments {
            let orig_path = resolve_stored_path(&self.dir, &record.orig_path, prefix);
            let name = resolve_file_name(&self.dir, &record.file_name, prefix);
            was_relative &= orig_path.was_relative && name.was_relative;

            let id = self.allocate_segment_id();
            let segment =
                Segment::open_reader(&self.dir, to_stored_string(&name.path), orig_path.path, id)?;
            let size = segment.file_size()?;
            if size > header.segment_break {
                return Err(BundleError::Corruption(format!(
                    "corrupt header or segment, segment {} size {size} exceeds segment break {}",
                    segment.path().display(),
                    header.segment_break
                )));
            }
            if size != u64::from(record.size) {
                return Err(BundleError::Corruption(format!(
                    "corrupt header or segment, segment {} size {size} does not match header size {}",
                    segment.path().display(),
                    record.size
                )));
            }
            data_size += size;
            segments.push(segment);
        }

        self.segment_break = header.segment_break;
        self.orig_path = orig.path;
        self.was_relative_paths = was_relative;
        self.segments = segments;
        self.data_size = data_size;
        self.header_size = data.len() as u64;
        debug!(
            "Loaded bundle header {}: {} segments, {} bytes",
            header_path.display(),
            self.segments.len(),
            self.data_size
        );
        Ok(())
    }

    /// Serialize the header with paths made relative to the bundle.
    pub(crate) fn build_header_bytes(&self) -> Result<Vec<u8>> {
        let segments = self
            .segments
            .iter()
            .map(|segment| {
                let size = u32::try_from(segment.data_size()).map_err(|_| {
                    BundleError::Internal(format!(
                        "segment {} size {} does not fit the header",
                        segment.name(),
                        segment.data_size()
                    ))
                })?;
                Ok(SegmentRecord {
                    orig_path: portable_dir_path(&self.dir, segment.orig_path()),
                    file_name: portable_file_name(&self.dir, segment.name()),
                    size,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        BundleHeader {
            segment_break: self.segment_break,
            orig_path: portable_dir_path(&self.dir, &self.orig_path),
            segments,
        }
        .to_bytes()
        .map_err(|e| match e {
            BundleError::Internal(msg) => {
                BundleError::Internal(format!("{msg} ({})", self.dir.display()))
            }
            other => other,
        })
    }

    /// Replace the header file: write a temporary file, sync it, rename.
    pub(crate) fn save_header(&mut self) -> Result<()> {
        let bytes = self.build_header_bytes()?;
        let header_path = self.header_path();
        let mut tmp_name = header_path.clone().into_os_string();
        tmp_name.push(HEADER_TMP_SUFFIX);
        let tmp_path = PathBuf::from(tmp_name);

        let open_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| BundleError::Open { path, source }
        };
        let mut file = File::create(&tmp_path).map_err(open_err(&tmp_path))?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, &header_path).map_err(open_err(&header_path))?;

        self.header_size = bytes.len() as u64;
        info!(
            "Saved bundle header {} ({} segments, {} bytes of data)",
            header_path.display(),
            self.segments.len(),
            self.data_size
        );
        Ok(())
    }
}

fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a bundle from raw segment contents and persist its header.
    fn fixture(dir: &Path, segment_break: u64, contents: &[&[u8]]) -> FileBundle {
        let mut bundle = FileBundle::new(dir, segment_break, None).expect("bundle");
        bundle.orig_path = bundle.dir.clone();
        for (i, data) in contents.iter().enumerate() {
            let name = crate::segment_file_name(i);
            fs::write(dir.join(&name), data).expect("write segment");
            let id = bundle.allocate_segment_id();
            let segment =
                Segment::open_reader(&bundle.dir, name, bundle.dir.clone(), id).expect("open");
            bundle.data_size += segment.data_size();
            bundle.segments.push(segment);
        }
        bundle.save_header().expect("save header");
        bundle
    }

    fn load(dir: &Path) -> FileBundle {
        let mut bundle = FileBundle::new(dir, 0, None).expect("bundle");
        bundle.load_header().expect("load");
        bundle
    }

    #[test]
    fn test_position_to_segment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bundle = fixture(dir.path(), 100, &[&[1u8; 80], &[2u8; 50]]);

        assert_eq!(
            bundle.position_to_segment(130, 20, None).expect("in range"),
            SegmentPosition {
                segment: 1,
                offset: 30
            }
        );
        // Crosses the end of segment 0's data.
        assert!(bundle.position_to_segment(70, 20, None).is_err());
        // Past the last segment.
        assert!(bundle.position_to_segment(200, 1, None).is_err());
        // Wrong kind.
        assert!(matches!(
            bundle.position_to_segment(0, 1, Some(SegmentKind::Writer)),
            Err(BundleError::Internal(_))
        ));
        bundle
            .position_to_segment(0, 80, Some(SegmentKind::Reader))
            .expect("reader segment");
        assert!(!bundle.is_writeable(0));
    }

    #[test]
    fn test_linear_to_bundle_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bundle = fixture(dir.path(), 1000, &[&[0u8; 600], &[0u8; 600]]);
        assert_eq!(bundle.linear_to_bundle_position(0).expect("start"), 0);
        assert_eq!(bundle.linear_to_bundle_position(599).expect("end of 0"), 599);
        assert_eq!(bundle.linear_to_bundle_position(600).expect("start of 1"), 1000);
        assert_eq!(bundle.linear_to_bundle_position(1199).expect("last"), 1599);
        assert!(bundle.linear_to_bundle_position(1200).is_err());
    }

    #[test]
    fn test_header_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let written = fixture(dir.path(), 64, &[&[5u8; 64], &[6u8; 10], &[]]);
        let loaded = load(dir.path());

        assert_eq!(loaded.segment_break(), 64);
        assert_eq!(loaded.segment_list(), written.segment_list());
        assert_eq!(loaded.segment_orig_paths(), written.segment_orig_paths());
        assert_eq!(loaded.data_size(), 74);
        assert_eq!(loaded.header_size(), written.header_size());
        assert_eq!(
            loaded.header_size(),
            fs::metadata(loaded.header_path()).expect("stat").len()
        );
        assert!(loaded.was_relative_paths());
        assert_eq!(loaded.orig_path(), loaded.path());
    }

    #[test]
    fn test_size_mismatch_is_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        fixture(dir.path(), 64, &[&[5u8; 32]]);
        fs::write(dir.path().join("bundle.0000"), [5u8; 33]).expect("grow segment");

        let mut bundle = FileBundle::new(dir.path(), 0, None).expect("bundle");
        let err = bundle.load_header().expect_err("size mismatch");
        assert!(matches!(err, BundleError::Corruption(_)));
        assert!(err.to_string().contains("does not match header size 32"));
    }

    #[test]
    fn test_segment_over_break_is_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        fixture(dir.path(), 64, &[&[5u8; 32]]);
        fs::write(dir.path().join("bundle.0000"), [5u8; 65]).expect("grow segment");

        let mut bundle = FileBundle::new(dir.path(), 0, None).expect("bundle");
        let err = bundle.load_header().expect_err("over break");
        assert!(err.to_string().contains("exceeds segment break 64"));
    }

    #[test]
    fn test_missing_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut bundle = FileBundle::new(dir.path(), 0, None).expect("bundle");
        assert!(matches!(
            bundle.load_header(),
            Err(BundleError::Open { .. })
        ));
    }

    #[test]
    fn test_crc_reads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut record = b"payload".to_vec();
        globestore_crypto::crc::append_crc(&mut record);
        let bundle = fixture(dir.path(), 1024, &[&record]);

        assert_eq!(
            bundle.read_at_crc_vec(0, record.len()).expect("crc read"),
            b"payload"
        );
        let addr = FileBundleAddr::new(0, record.len() as u32);
        assert_eq!(bundle.read_addr_crc(addr).expect("addr read"), b"payload");
        assert_eq!(bundle.read_addr(addr).expect("raw read"), record);

        assert!(matches!(
            bundle.read_at_crc_vec(0, CRC_SIZE),
            Err(BundleError::Internal(_))
        ));
        // Shorter read: the "CRC" is payload bytes.
        let err = bundle.read_at_crc_vec(0, 8).expect_err("mismatch");
        assert!(matches!(err, BundleError::Corruption(_)));
        assert!(err.to_string().contains("offset=0, len=8"));
        assert!(err.to_string().contains("bundle.0000"));
    }

    #[test]
    fn test_cache_toggle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data: Vec<u8> = (0..=255).collect();
        let bundle = fixture(dir.path(), 1024, &[&data]);

        bundle.enable_read_cache(1, 64).expect("ignored");
        assert!(bundle.cache_stats().is_none());
        assert!(bundle.enable_read_cache(2, 0).is_err());

        bundle.enable_read_cache(2, 64).expect("enable");
        assert_eq!(bundle.read_at_vec(60, 10).expect("read"), &data[60..70]);
        assert_eq!(bundle.cache_stats().expect("stats").disk_accesses, 2);

        bundle.disable_read_cache();
        assert!(bundle.cache_stats().is_none());
        assert_eq!(bundle.read_at_vec(60, 10).expect("read"), &data[60..70]);
    }

    #[test]
    fn test_manifest_relative_bundle() {
        let dir = tempfile::tempdir().expect("tempdir");
        fixture(dir.path(), 64, &[&[1u8; 20], &[2u8; 30]]);
        let mut bundle = load(dir.path());

        let mut manifest = Vec::new();
        bundle.append_manifest(&mut manifest, None).expect("manifest");
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest[0].current_path, bundle.header_path());
        assert_eq!(manifest[0].orig_path, bundle.header_path());
        assert_eq!(manifest[0].data_size, bundle.header_size());
        assert_eq!(manifest[2].current_path, bundle.path().join("bundle.0001"));
        assert_eq!(manifest[2].data_size, 30);

        bundle.clear_orig_paths();
        assert!(bundle.orig_path().as_os_str().is_empty());
        assert!(bundle.segment_orig_paths().iter().all(|p| p.as_os_str().is_empty()));
        manifest.clear();
        bundle.append_manifest(&mut manifest, None).expect("manifest");
        assert_eq!(manifest[1].orig_path, manifest[1].current_path);
    }

    #[cfg(unix)]
    #[test]
    fn test_manifest_absolute_header_rewritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tmp = tempfile::tempdir().expect("tmp");
        let bundle_dir = normalize_lexically(&std::path::absolute(dir.path()).expect("abs"));
        fs::write(bundle_dir.join("bundle.0000"), [9u8; 16]).expect("segment");

        let abs = bundle_dir.to_string_lossy().into_owned();
        let legacy = BundleHeader {
            segment_break: 64,
            orig_path: abs.clone(),
            segments: vec![SegmentRecord {
                orig_path: abs,
                file_name: "bundle.0000".to_string(),
                size: 16,
            }],
        };
        let legacy_bytes = legacy.to_bytes().expect("legacy header");
        fs::write(bundle_dir.join(HEADER_FILE_NAME), &legacy_bytes).expect("header");

        let bundle = load(&bundle_dir);
        assert!(!bundle.was_relative_paths());
        assert_eq!(bundle.segment_orig_paths(), vec![bundle_dir.clone()]);

        let mut manifest = Vec::new();
        bundle
            .append_manifest(&mut manifest, Some(tmp.path()))
            .expect("manifest");
        let header = &manifest[0];
        assert!(header.current_path.starts_with(tmp.path()));
        let rewritten = fs::read(&header.current_path).expect("rewritten header");
        assert_eq!(rewritten.len() as u64, header.data_size);
        let parsed = BundleHeader::parse(&rewritten, &header.current_path).expect("parse");
        assert_eq!(parsed.orig_path, ".");
        assert_eq!(parsed.segments[0].orig_path, ".");
    }
}
