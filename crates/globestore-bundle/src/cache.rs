//! LRU block cache for segment reads.
//!
//! Segments are divided into fixed-size blocks. A read no larger than one
//! block touches at most two adjacent blocks, which are loaded whole on
//! first use and then served from memory. Larger reads bypass the cache.
//!
//! Every touch stamps the block with a strictly increasing tick. Eviction
//! scans all resident blocks for the smallest tick: touches vastly
//! outnumber evictions, so an O(1) touch with an O(n) eviction beats
//! keeping the blocks ordered.

use crate::segment::Segment;
use crate::{BundleError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Identifies one cache block: segment id plus block-aligned offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheBlockAddress {
    /// Runtime id of the segment
    pub segment_id: u32,
    /// Offset of the block's first byte, a multiple of the block size
    pub offset: u64,
}

#[derive(Debug)]
struct CacheBlock {
    data: Vec<u8>,
    initialized: bool,
    last_access_tick: u64,
}

/// Disk statistics, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Bytes read from segment files
    pub bytes_read: u64,
    /// Number of segment reads issued
    pub disk_accesses: u64,
}

/// Read-through LRU cache over segment files.
#[derive(Debug)]
pub struct CachedReadAccessor {
    max_blocks: usize,
    block_size: u64,
    blocks: HashMap<CacheBlockAddress, CacheBlock>,
    access_tick: u64,
    stats: CacheStats,
}

impl CachedReadAccessor {
    /// Create a cache of `max_blocks` blocks of `block_size` bytes.
    ///
    /// At least two blocks are required since one read may span two.
    pub fn new(max_blocks: u32, block_size: u32) -> Result<Self> {
        if max_blocks < 2 {
            return Err(BundleError::Config(format!(
                "read cache needs at least 2 blocks, got {max_blocks}"
            )));
        }
        if block_size == 0 {
            return Err(BundleError::Config(
                "read cache block size must not be 0".to_string(),
            ));
        }
        Ok(Self {
            max_blocks: max_blocks as usize,
            block_size: u64::from(block_size),
            blocks: HashMap::with_capacity(max_blocks as usize),
            access_tick: 0,
            stats: CacheStats::default(),
        })
    }

    /// Fill `buf` with bytes of `segment` starting at `offset`.
    pub fn pread(&mut self, segment: &Segment, buf: &mut [u8], offset: u64) -> Result<()> {
        let len = buf.len() as u64;
        if len > self.block_size {
            self.record_disk_read(len);
            return segment.read_into(buf, offset);
        }

        let in_range = offset
            .checked_add(len)
            .is_some_and(|end| end <= segment.data_size());
        if !in_range {
            return Err(BundleError::Internal(format!(
                "cached read of {len} bytes at offset {offset} past end of segment {} ({} bytes)",
                segment.name(),
                segment.data_size()
            )));
        }
        if buf.is_empty() {
            return Ok(());
        }

        let first = CacheBlockAddress {
            segment_id: segment.id(),
            offset: offset - offset % self.block_size,
        };
        let second = (offset + len > first.offset + self.block_size).then(|| CacheBlockAddress {
            segment_id: segment.id(),
            offset: first.offset + self.block_size,
        });

        // Touch both before filling so the second cannot evict the first.
        self.touch(first);
        if let Some(second) = second {
            self.touch(second);
        }

        let skip = (offset - first.offset) as usize;
        let consumed = self.copy_from_block(segment, first, skip, buf)?;
        if let Some(second) = second {
            self.copy_from_block(segment, second, 0, &mut buf[consumed..])?;
        }
        Ok(())
    }

    /// Drop every block of one segment. Called after the segment changes.
    pub fn invalidate_segment(&mut self, segment_id: u32) {
        self.blocks.retain(|addr, _| addr.segment_id != segment_id);
    }

    /// True if a block is resident.
    pub fn contains(&self, addr: &CacheBlockAddress) -> bool {
        self.blocks.contains_key(addr)
    }

    /// Number of resident blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True if no block is resident.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Maximum number of resident blocks.
    pub const fn max_blocks(&self) -> usize {
        self.max_blocks
    }

    /// Block size in bytes.
    pub const fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Disk statistics.
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    fn touch(&mut self, addr: CacheBlockAddress) {
        self.access_tick += 1;
        let tick = self.access_tick;
        if let Some(block) = self.blocks.get_mut(&addr) {
            block.last_access_tick = tick;
            return;
        }
        if self.blocks.len() >= self.max_blocks {
            self.evict_oldest();
        }
        self.blocks.insert(
            addr,
            CacheBlock {
                data: Vec::new(),
                initialized: false,
                last_access_tick: tick,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .blocks
            .iter()
            .min_by_key(|(_, block)| block.last_access_tick)
            .map(|(addr, _)| *addr);
        if let Some(addr) = oldest {
            debug!("Evicting cache block {}@{}", addr.segment_id, addr.offset);
            self.blocks.remove(&addr);
        }
    }

    /// Copy from block `addr`, starting `skip` bytes into it, as much of
    /// `out` as the block holds. Returns the number of bytes copied.
    fn copy_from_block(
        &mut self,
        segment: &Segment,
        addr: CacheBlockAddress,
        skip: usize,
        out: &mut [u8],
    ) -> Result<usize> {
        let block_size = self.block_size;
        let block = self.blocks.get_mut(&addr).ok_or_else(|| {
            BundleError::Internal(format!(
                "cache block {}@{} vanished",
                addr.segment_id, addr.offset
            ))
        })?;

        let wanted = out.len().min(block_size as usize - skip);
        if !block.initialized || block.data.len() < skip + wanted {
            // Writer segments can be shorter on disk than their data size.
            let readable = segment.readable_size()?;
            let fill = block_size.min(readable.saturating_sub(addr.offset));
            let mut data = vec![0u8; fill as usize];
            segment.read_into(&mut data, addr.offset)?;
            block.data = data;
            block.initialized = true;
            self.stats.bytes_read += fill;
            self.stats.disk_accesses += 1;
        }

        match block.data.get(skip..skip + wanted) {
            Some(src) => out[..wanted].copy_from_slice(src),
            None => {
                // Not on disk yet: report it exactly like an uncached read.
                segment.read_into(&mut out[..wanted], addr.offset + skip as u64)?;
                self.stats.bytes_read += wanted as u64;
                self.stats.disk_accesses += 1;
            }
        }
        Ok(wanted)
    }

    fn record_disk_read(&mut self, len: u64) {
        self.stats.bytes_read += len;
        self.stats.disk_accesses += 1;
    }
}
