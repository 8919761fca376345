//! Writing bundles.
//!
//! A writer either creates a fresh bundle, extends an existing one with
//! new segments (update), or wraps legacy `pack.NNNN` files in a bundle
//! header without adding data (pack import).
//!
//! Space is handed out by [`FileBundleWriter::allocate_append`] at the end
//! of the last segment. When a record does not fit in what is left of the
//! segment break, a new segment is started, so a record never straddles
//! two segment files. The header is only written by
//! [`FileBundleWriter::checkpoint`] and [`FileBundleWriter::close`].

use crate::bundle::{FileBundle, SegmentPosition};
use crate::config::BundleConfig;
use crate::segment::{Segment, SegmentKind};
use crate::{BundleError, Result, SEGMENT_FILE_COUNT_MAX, segment_file_name};
use globestore_crypto::CRC_SIZE;
use globestore_crypto::crc::fill_trailing_crc;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use tracing::{debug, info, warn};

/// Prefix of legacy pack file names.
const PACK_FILE_PREFIX: &str = "pack.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterMode {
    /// Fresh bundle
    New,
    /// Existing segments are read-only, new ones are appended
    Update,
    /// Legacy pack files, no appends
    PackImport,
}

/// Coalesces contiguous writes to one segment.
#[derive(Debug)]
struct WriteBuffer {
    capacity: usize,
    segment: Option<usize>,
    offset: u64,
    data: Vec<u8>,
}

impl WriteBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            segment: None,
            offset: 0,
            data: Vec::with_capacity(capacity),
        }
    }

    fn flush(&mut self, bundle: &FileBundle) -> Result<()> {
        if let Some(index) = self.segment {
            if !self.data.is_empty() {
                let segment = &bundle.segments[index];
                segment.write_at(&self.data, self.offset)?;
                bundle.invalidate_cached_segment(segment.id());
            }
        }
        self.data.clear();
        Ok(())
    }
}

/// Writes records to a bundle.
///
/// Read operations of [`FileBundle`] are available through `Deref`; they
/// see buffered writes only after [`flush_write_buffer`](Self::flush_write_buffer).
#[derive(Debug)]
pub struct FileBundleWriter {
    bundle: FileBundle,
    mode: WriterMode,
    buffer: Option<WriteBuffer>,
    closed: bool,
}

impl FileBundleWriter {
    /// Create a new bundle in `dir`.
    ///
    /// The directory is created if needed, or wiped first when
    /// `config.overwrite` is set. Fails if a bundle header already exists.
    pub fn create<P: AsRef<Path>>(dir: P, config: &BundleConfig) -> Result<Self> {
        config.validate()?;
        let dir = dir.as_ref();
        if config.overwrite && dir.exists() {
            fs::remove_dir_all(dir).map_err(|source| BundleError::Open {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::create_dir_all(dir).map_err(|source| BundleError::Open {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut bundle = FileBundle::new(dir, config.segment_break, config.path_prefix.clone())?;
        let header_path = bundle.header_path();
        if header_path.exists() {
            return Err(BundleError::AlreadyExists(header_path));
        }
        bundle.orig_path = bundle.dir.clone();

        let mut writer = Self::from_bundle(bundle, WriterMode::New);
        writer.create_segment()?;
        writer.apply_config(config)?;
        info!(
            "Created bundle {} (segment break {})",
            writer.bundle.path().display(),
            writer.bundle.segment_break()
        );
        Ok(writer)
    }

    /// Open an existing bundle to append to it.
    ///
    /// Existing segments stay read-only and keep their data; appends go to
    /// a new segment. The segment break of the existing bundle is kept.
    pub fn open_update<P: AsRef<Path>>(dir: P, config: &BundleConfig) -> Result<Self> {
        let mut bundle = FileBundle::new(dir, 0, config.path_prefix.clone())?;
        bundle.load_header()?;

        let mut writer = Self::from_bundle(bundle, WriterMode::Update);
        writer.create_segment()?;
        writer.apply_config(config)?;
        info!(
            "Opened bundle {} for update ({} existing segments)",
            writer.bundle.path().display(),
            writer.bundle.segment_count() - 1
        );
        Ok(writer)
    }

    /// Wrap the legacy `pack.NNNN` files in `dir` as a bundle.
    ///
    /// The pack files become read-only segments in numeric order. No data
    /// can be added; [`close`](Self::close) writes the header. Addresses
    /// from the old linear layout map through
    /// [`FileBundle::linear_to_bundle_position`].
    pub fn import_pack<P: AsRef<Path>>(dir: P, segment_break: u64) -> Result<Self> {
        BundleConfig::default()
            .with_segment_break(segment_break)
            .validate()?;
        let mut bundle = FileBundle::new(dir, segment_break, None)?;
        let pack_names = numeric_pack_files(&bundle.dir)?;
        if pack_names.is_empty() {
            return Err(BundleError::Config(format!(
                "no pack files found at {}",
                bundle.dir.display()
            )));
        }

        bundle.orig_path = bundle.dir.clone();
        for name in pack_names {
            let id = bundle.allocate_segment_id();
            let segment = Segment::open_reader(&bundle.dir, name, bundle.dir.clone(), id)?;
            let size = segment.file_size()?;
            if size > segment_break {
                return Err(BundleError::Config(format!(
                    "file {}, size {size} is > segment break {segment_break}",
                    segment.path().display()
                )));
            }
            bundle.data_size += size;
            bundle.segments.push(segment);
        }

        info!(
            "Imported {} pack files from {} ({} bytes)",
            bundle.segment_count(),
            bundle.path().display(),
            bundle.data_size()
        );
        Ok(Self::from_bundle(bundle, WriterMode::PackImport))
    }

    const fn from_bundle(bundle: FileBundle, mode: WriterMode) -> Self {
        Self {
            bundle,
            mode,
            buffer: None,
            closed: false,
        }
    }

    fn apply_config(&mut self, config: &BundleConfig) -> Result<()> {
        if config.write_buffer_size > 0 {
            self.buffer_writes(config.write_buffer_size)?;
        }
        if let Some(cache) = &config.read_cache {
            self.bundle
                .enable_read_cache(cache.max_blocks, cache.block_size)?;
        }
        Ok(())
    }

    /// True once [`close`](Self::close) has run.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reserve `len` bytes at the end of the bundle and return their
    /// address. A new segment is started if the last one cannot hold them.
    pub fn allocate_append(&mut self, len: u64) -> Result<u64> {
        self.ensure_open()?;
        if len == 0 {
            return Err(BundleError::Internal(format!(
                "attempt to allocate 0 bytes in {}",
                self.bundle.path().display()
            )));
        }
        if self.mode == WriterMode::PackImport {
            return Err(self.import_read_only());
        }
        let segment_break = self.bundle.segment_break();
        if len > segment_break {
            return Err(BundleError::Internal(format!(
                "record of {len} bytes exceeds segment break {segment_break}"
            )));
        }

        let needs_segment = self.bundle.segments.last().is_none_or(|last| {
            last.kind() != SegmentKind::Writer || last.data_size() + len > segment_break
        });
        if needs_segment {
            self.create_segment()?;
        }

        let index = self.bundle.segments.len() - 1;
        let segment = &mut self.bundle.segments[index];
        let offset = segment.data_size();
        segment.grow(len);
        self.bundle.data_size += len;
        Ok(index as u64 * segment_break + offset)
    }

    /// Append `data` and return its address.
    pub fn write_append(&mut self, data: &[u8]) -> Result<u64> {
        self.ensure_open()?;
        if data.is_empty() {
            return Err(self.zero_length_write());
        }
        let pos = self.allocate_append(data.len() as u64)?;
        let loc = self.bundle.position_to_segment(pos, data.len() as u64, Some(SegmentKind::Writer))?;
        self.write_to_segment(loc, data)?;
        Ok(pos)
    }

    /// Store the CRC of all but the last 4 bytes of `buf` in those bytes,
    /// then append `buf`.
    pub fn write_append_crc(&mut self, buf: &mut [u8]) -> Result<u64> {
        Self::check_crc_len(buf)?;
        fill_trailing_crc(buf)?;
        self.write_append(buf)
    }

    /// Overwrite already allocated bytes at `pos`.
    pub fn write_at(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if data.is_empty() {
            return Err(self.zero_length_write());
        }
        let loc = self
            .bundle
            .position_to_segment(pos, data.len() as u64, Some(SegmentKind::Writer))?;
        self.write_to_segment(loc, data)
    }

    /// Fill the trailing CRC of `buf`, then overwrite at `pos`.
    pub fn write_at_crc(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        Self::check_crc_len(buf)?;
        fill_trailing_crc(buf)?;
        self.write_at(pos, buf)
    }

    /// Coalesce contiguous writes in a buffer of `size` bytes. Zero turns
    /// buffering off. Pending data is flushed first.
    pub fn buffer_writes(&mut self, size: usize) -> Result<()> {
        self.flush_write_buffer()?;
        self.buffer = (size > 0).then(|| WriteBuffer::new(size));
        Ok(())
    }

    /// Write out buffered data.
    pub fn flush_write_buffer(&mut self) -> Result<()> {
        match self.buffer.as_mut() {
            Some(buffer) => buffer.flush(&self.bundle),
            None => Ok(()),
        }
    }

    /// Flush, sync every segment and rewrite the header, leaving the
    /// bundle readable as it stands now.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_write_buffer()?;
        for segment in &self.bundle.segments {
            segment.sync()?;
        }
        self.bundle.save_header()?;
        debug!("Checkpointed bundle {}", self.bundle.path().display());
        Ok(())
    }

    /// Flush, write the header and close every segment.
    ///
    /// Closing twice is a no-op. Every later write fails.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_write_buffer()?;
        self.bundle.save_header()?;
        self.close_segments()?;
        info!(
            "Closed bundle {} ({} bytes)",
            self.bundle.path().display(),
            self.bundle.data_size()
        );
        Ok(())
    }

    /// Close every segment without writing a header. An imported pack
    /// directory is left as it was found.
    pub fn close_no_update(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_write_buffer()?;
        self.close_segments()?;
        debug!(
            "Closed bundle {} without updating the header",
            self.bundle.path().display()
        );
        Ok(())
    }

    fn close_segments(&mut self) -> Result<()> {
        self.closed = true;
        self.bundle.disable_read_cache();
        while let Some(segment) = self.bundle.segments.pop() {
            segment.close()?;
        }
        Ok(())
    }

    fn create_segment(&mut self) -> Result<()> {
        if self.mode == WriterMode::PackImport {
            return Err(self.import_read_only());
        }
        let count = self.bundle.segment_count();
        if count >= SEGMENT_FILE_COUNT_MAX {
            return Err(BundleError::Internal(format!(
                "max segment file count {SEGMENT_FILE_COUNT_MAX} exceeded in {}",
                self.bundle.path().display()
            )));
        }
        let id = self.bundle.allocate_segment_id();
        let segment = Segment::create_writer(&self.bundle.dir, segment_file_name(count), id)?;
        debug!("Added segment {count}: {}", segment.name());
        self.bundle.segments.push(segment);
        Ok(())
    }

    fn write_to_segment(&mut self, loc: SegmentPosition, data: &[u8]) -> Result<()> {
        let segment = &self.bundle.segments[loc.segment];
        self.bundle.invalidate_cached_segment(segment.id());

        let Some(buffer) = self.buffer.as_mut() else {
            return segment.write_at(data, loc.offset);
        };
        if data.len() > buffer.capacity {
            buffer.flush(&self.bundle)?;
            return segment.write_at(data, loc.offset);
        }
        let contiguous = buffer.segment == Some(loc.segment)
            && buffer.offset + buffer.data.len() as u64 == loc.offset;
        if !contiguous || buffer.data.len() + data.len() > buffer.capacity {
            buffer.flush(&self.bundle)?;
            buffer.segment = Some(loc.segment);
            buffer.offset = loc.offset;
        }
        buffer.data.extend_from_slice(data);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(BundleError::Internal(format!(
                "bundle {} is closed",
                self.bundle.path().display()
            )));
        }
        Ok(())
    }

    fn check_crc_len(buf: &[u8]) -> Result<()> {
        if buf.len() <= CRC_SIZE {
            return Err(BundleError::Internal(format!(
                "CRC record of {} bytes, must be larger than the CRC size",
                buf.len()
            )));
        }
        Ok(())
    }

    fn zero_length_write(&self) -> BundleError {
        BundleError::Internal(format!(
            "attempt to write 0 bytes to {}",
            self.bundle.path().display()
        ))
    }

    fn import_read_only(&self) -> BundleError {
        BundleError::Internal(format!(
            "cannot add data to imported bundle {}",
            self.bundle.path().display()
        ))
    }
}

impl Deref for FileBundleWriter {
    type Target = FileBundle;

    fn deref(&self) -> &FileBundle {
        &self.bundle
    }
}

impl Drop for FileBundleWriter {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "FileBundleWriter not closed properly, header not updated: {}",
                self.bundle.path().display()
            );
        }
        if self.buffer.as_ref().is_some_and(|b| !b.data.is_empty()) {
            warn!(
                "FileBundleWriter write buffer not flushed: {}",
                self.bundle.path().display()
            );
        }
    }
}

/// Names of `pack.<digits>` files in `dir`, in numeric order.
fn numeric_pack_files(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|source| BundleError::Open {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut packs: Vec<(u64, String)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let Some(number) = name.strip_prefix(PACK_FILE_PREFIX) else {
            continue;
        };
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(number) = number.parse::<u64>() {
            packs.push((number, name));
        }
    }
    packs.sort();
    Ok(packs.into_iter().map(|(_, name)| name).collect())
}
