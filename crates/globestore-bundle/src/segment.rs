//! Segment files.
//!
//! Each segment holds one slice of the bundle's virtual address space.
//! Segments of a loaded bundle are read-only and memory-mapped; segments
//! created by a writer are plain files written with positioned I/O.

use crate::io::{read_exact_at, write_all_at};
use crate::{BundleError, Result};
use memmap2::{Mmap, MmapOptions};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What a segment can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Read-only segment of an existing bundle
    Reader,
    /// Segment created by a writer
    Writer,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader => f.write_str("reader"),
            Self::Writer => f.write_str("writer"),
        }
    }
}

enum SegmentStorage {
    /// `None` for an empty file, which cannot be mapped
    Reader(Option<Mmap>),
    Writer(File),
}

/// One segment file.
pub struct Segment {
    /// File name, relative to the bundle directory
    name: String,
    /// Directory the segment was originally written to (may be empty)
    orig_path: PathBuf,
    /// Bytes of the virtual address space used by this segment
    data_size: u64,
    /// Runtime id, unique within one bundle instance
    id: u32,
    /// Full path of the file
    path: PathBuf,
    storage: SegmentStorage,
}

impl Segment {
    /// Map an existing segment file read-only.
    pub(crate) fn open_reader(
        bundle_dir: &Path,
        name: String,
        orig_path: PathBuf,
        id: u32,
    ) -> Result<Self> {
        let path = bundle_dir.join(&name);
        let file = File::open(&path).map_err(|source| BundleError::Open {
            path: path.clone(),
            source,
        })?;
        let size = file.metadata()?.len();

        let mmap = if size == 0 {
            None
        } else {
            #[allow(unsafe_code)]
            let mmap = unsafe {
                MmapOptions::new()
                    .map(&file)
                    .map_err(|source| BundleError::Open {
                        path: path.clone(),
                        source,
                    })?
            };
            Some(mmap)
        };

        Ok(Self {
            name,
            orig_path,
            data_size: size,
            id,
            path,
            storage: SegmentStorage::Reader(mmap),
        })
    }

    /// Create (or truncate) a segment file for writing.
    pub(crate) fn create_writer(bundle_dir: &Path, name: String, id: u32) -> Result<Self> {
        let path = bundle_dir.join(&name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| BundleError::Open {
                path: path.clone(),
                source,
            })?;
        debug!("Created segment {} (id {})", path.display(), id);

        Ok(Self {
            name,
            orig_path: bundle_dir.to_path_buf(),
            data_size: 0,
            id,
            path,
            storage: SegmentStorage::Writer(file),
        })
    }

    /// File name relative to the bundle directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the segment was originally written to.
    pub fn orig_path(&self) -> &Path {
        &self.orig_path
    }

    /// Bytes of address space in use.
    pub const fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Runtime id.
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Reader or writer.
    pub const fn kind(&self) -> SegmentKind {
        match self.storage {
            SegmentStorage::Reader(_) => SegmentKind::Reader,
            SegmentStorage::Writer(_) => SegmentKind::Writer,
        }
    }

    pub(crate) fn clear_orig_path(&mut self) {
        self.orig_path = PathBuf::new();
    }

    pub(crate) fn grow(&mut self, len: u64) {
        self.data_size += len;
    }

    /// Fill `buf` from `offset` within the segment.
    pub fn read_into(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|end| *end <= self.data_size)
            .ok_or_else(|| self.out_of_range(offset, buf.len()))?;

        match &self.storage {
            SegmentStorage::Reader(mmap) => {
                if buf.is_empty() {
                    return Ok(());
                }
                let data = mmap
                    .as_ref()
                    .and_then(|m| m.get(offset as usize..end as usize))
                    .ok_or_else(|| self.out_of_range(offset, buf.len()))?;
                buf.copy_from_slice(data);
                Ok(())
            }
            SegmentStorage::Writer(file) => {
                let len = buf.len();
                read_exact_at(file, buf, offset).map_err(|e| {
                    BundleError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "reading {len} bytes at {offset} from {}: {e}",
                            self.path.display()
                        ),
                    ))
                })
            }
        }
    }

    /// Write `data` at `offset`. Only writer segments accept writes and
    /// zero-length writes are rejected.
    pub(crate) fn write_at(&self, data: &[u8], offset: u64) -> Result<()> {
        if data.is_empty() {
            return Err(BundleError::Internal(format!(
                "attempt to write 0 bytes to offset {offset} in file {}",
                self.name
            )));
        }
        match &self.storage {
            SegmentStorage::Writer(file) => Ok(write_all_at(file, data, offset)?),
            SegmentStorage::Reader(_) => Err(BundleError::Internal(format!(
                "attempt to write to read-only segment {}",
                self.name
            ))),
        }
    }

    /// Size of the file on disk.
    pub fn file_size(&self) -> Result<u64> {
        match &self.storage {
            SegmentStorage::Reader(mmap) => Ok(mmap.as_ref().map_or(0, |m| m.len() as u64)),
            SegmentStorage::Writer(file) => Ok(file.metadata()?.len()),
        }
    }

    /// Bytes that can be read back right now.
    ///
    /// Writer segments allocate address space ahead of the file: appends
    /// may still sit in a write buffer and reserved space is only
    /// materialized on sync, so the file can be shorter than
    /// [`Segment::data_size`].
    pub fn readable_size(&self) -> Result<u64> {
        match &self.storage {
            SegmentStorage::Reader(_) => Ok(self.data_size),
            SegmentStorage::Writer(file) => Ok(file.metadata()?.len().min(self.data_size)),
        }
    }

    /// Extend a writer segment's file to cover every allocated byte, then
    /// sync it to disk.
    pub(crate) fn sync(&self) -> Result<()> {
        if let SegmentStorage::Writer(file) = &self.storage {
            if file.metadata()?.len() < self.data_size {
                file.set_len(self.data_size)?;
            }
            file.sync_all()?;
        }
        Ok(())
    }

    /// Sync and close the segment. The file stays on disk even when empty.
    pub(crate) fn close(self) -> Result<()> {
        self.sync()?;
        if self.kind() == SegmentKind::Writer && !self.path.exists() {
            warn!("Segment file {} vanished, recreating it empty", self.path.display());
            File::create(&self.path).map_err(|source| BundleError::Open {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn out_of_range(&self, offset: u64, len: usize) -> BundleError {
        BundleError::Internal(format!(
            "read of {len} bytes at offset {offset} past end of segment {} ({} bytes)",
            self.name, self.data_size
        ))
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("data_size", &self.data_size)
            .finish_non_exhaustive()
    }
}
