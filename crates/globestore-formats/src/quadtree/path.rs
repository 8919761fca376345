//! Quadtree addresses.
//!
//! A path names one tile of the global quadtree by the list of quadrants
//! chosen on the way down from the root. It is packed into a `u64`:
//!
//! | Bits | Field |
//! |------|-------|
//! | 63..62 | Quadrant at level 1 |
//! | 61..60 | Quadrant at level 2 |
//! | ... | ... |
//! | 17..16 | Quadrant at level 24 |
//! | 4..0 | Level (0-24) |
//!
//! Unused quadrant bits are zero, so comparing the packed values orders
//! paths in pre-order: a parent sorts before its children and siblings
//! sort by quadrant.
//!
//! Quadrants within a tile are numbered
//!
//! ```text
//! +---+---+
//! | 3 | 2 |  row 1
//! +---+---+
//! | 0 | 1 |  row 0
//! +---+---+
//! ```

use crate::quadtree::error::{QuadtreeError, Result};
use binrw::{BinRead, BinWrite};
use std::fmt;
use std::str::FromStr;

/// Deepest level a path can address.
pub const MAX_LEVEL: u32 = 24;

const LEVEL_MASK: u64 = 0x1F;
const ROW_BITS: [u32; 4] = [0, 0, 1, 1];
const COL_BITS: [u32; 4] = [0, 1, 1, 0];

/// Location of a tile in the quadtree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct QuadtreePath {
    #[br(assert(QuadtreePath::is_valid_raw(path), "invalid packed quadtree path {:#018x}", path))]
    path: u64,
}

impl QuadtreePath {
    /// Serialized size in bytes.
    pub const SERIAL_SIZE: usize = 8;

    /// The root tile.
    pub const fn root() -> Self {
        Self { path: 0 }
    }

    /// Build a path from a list of quadrants (each 0-3).
    pub fn from_branches(branches: &[u8]) -> Result<Self> {
        if branches.len() > MAX_LEVEL as usize {
            return Err(QuadtreeError::InvalidPath(format!(
                "{} levels exceeds maximum of {MAX_LEVEL}",
                branches.len()
            )));
        }
        let mut path = Self::root();
        for &quad in branches {
            path = path.child(quad)?;
        }
        Ok(path)
    }

    /// Build a path from a level and the row/column of the tile at that
    /// level.
    pub fn from_level_row_col(level: u32, row: u32, col: u32) -> Result<Self> {
        if level > MAX_LEVEL {
            return Err(QuadtreeError::InvalidPath(format!(
                "level {level} exceeds maximum of {MAX_LEVEL}"
            )));
        }
        if row >> level != 0 || col >> level != 0 {
            return Err(QuadtreeError::InvalidPath(format!(
                "row {row} / column {col} out of range at level {level}"
            )));
        }
        let mut path = Self::root();
        for j in (0..level).rev() {
            let r = (row >> j) & 1;
            let c = (col >> j) & 1;
            let quad = match (r, c) {
                (0, 0) => 0,
                (0, _) => 1,
                (_, 1) => 2,
                _ => 3,
            };
            path = path.child(quad)?;
        }
        Ok(path)
    }

    /// Reconstruct a path from its packed form.
    pub fn from_raw(path: u64) -> Result<Self> {
        if !Self::is_valid_raw(path) {
            return Err(QuadtreeError::InvalidPath(format!(
                "invalid packed quadtree path {path:#018x}"
            )));
        }
        Ok(Self { path })
    }

    fn is_valid_raw(path: u64) -> bool {
        let level = (path & LEVEL_MASK) as u32;
        if level > MAX_LEVEL {
            return false;
        }
        // Everything below the used quadrant bits other than the level must be zero
        let used = Self::prefix_mask(level);
        path & !used & !LEVEL_MASK == 0
    }

    const fn prefix_mask(level: u32) -> u64 {
        if level == 0 {
            0
        } else {
            !0u64 << (64 - 2 * level)
        }
    }

    /// Packed representation.
    pub const fn raw(&self) -> u64 {
        self.path
    }

    /// Number of quadrants in the path.
    pub const fn level(&self) -> u32 {
        (self.path & LEVEL_MASK) as u32
    }

    /// True for the root tile.
    pub const fn is_root(&self) -> bool {
        self.path == 0
    }

    /// Quadrant chosen at depth `index` (0-based).
    pub fn branch(&self, index: u32) -> Option<u8> {
        if index >= self.level() {
            return None;
        }
        Some(((self.path >> (62 - 2 * index)) & 3) as u8)
    }

    /// Iterate over the quadrants from the root down.
    pub fn branches(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.level()).filter_map(|i| self.branch(i))
    }

    /// Path of quadrant `quad` below this tile.
    pub fn child(&self, quad: u8) -> Result<Self> {
        if quad > 3 {
            return Err(QuadtreeError::InvalidPath(format!(
                "quadrant {quad} out of range"
            )));
        }
        let level = self.level();
        if level >= MAX_LEVEL {
            return Err(QuadtreeError::InvalidPath(format!(
                "cannot descend below level {MAX_LEVEL}"
            )));
        }
        let bits = u64::from(quad) << (62 - 2 * level);
        Ok(Self {
            path: ((self.path & !LEVEL_MASK) | bits) + u64::from(level + 1),
        })
    }

    /// Path of the enclosing tile, `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let level = self.level();
        if level == 0 {
            return None;
        }
        Some(self.truncated(level - 1))
    }

    /// The ancestor at `level`, or `self` if already at or above it.
    pub fn truncated(&self, level: u32) -> Self {
        if level >= self.level() {
            return *self;
        }
        Self {
            path: (self.path & Self::prefix_mask(level)) | u64::from(level),
        }
    }

    /// True if `other` lies in the subtree rooted at this tile (a path is
    /// its own ancestor).
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.level() <= other.level() && other.truncated(self.level()) == *self
    }

    /// Path of `descendant` relative to this tile.
    pub fn relative_path(&self, descendant: &Self) -> Option<Self> {
        if !self.is_ancestor_of(descendant) {
            return None;
        }
        let level = self.level();
        let rel_level = descendant.level() - level;
        let bits = (descendant.path & !LEVEL_MASK) << (2 * level);
        Some(Self {
            path: bits | u64::from(rel_level),
        })
    }

    /// Append the quadrants of `suffix` to this path.
    pub fn concat(&self, suffix: &Self) -> Result<Self> {
        let level = self.level() + suffix.level();
        if level > MAX_LEVEL {
            return Err(QuadtreeError::InvalidPath(format!(
                "concatenated path has {level} levels, maximum is {MAX_LEVEL}"
            )));
        }
        let bits = (suffix.path & !LEVEL_MASK) >> (2 * self.level());
        Ok(Self {
            path: (self.path & !LEVEL_MASK) | bits | u64::from(level),
        })
    }

    /// Index of the ancestor at `level` among the `4^level` tiles of that
    /// level, counted in quadrant order.
    pub fn as_index(&self, level: u32) -> u64 {
        let level = level.min(self.level());
        if level == 0 {
            return 0;
        }
        self.path >> (64 - 2 * level)
    }

    /// Level, row and column of the tile.
    pub fn level_row_col(&self) -> (u32, u32, u32) {
        let mut row = 0;
        let mut col = 0;
        for quad in self.branches() {
            row = (row << 1) | ROW_BITS[quad as usize];
            col = (col << 1) | COL_BITS[quad as usize];
        }
        (self.level(), row, col)
    }
}

impl fmt::Display for QuadtreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for quad in self.branches() {
            write!(f, "{quad}")?;
        }
        Ok(())
    }
}

impl FromStr for QuadtreePath {
    type Err = QuadtreeError;

    fn from_str(s: &str) -> Result<Self> {
        let branches = s
            .bytes()
            .map(|b| match b {
                b'0'..=b'3' => Ok(b - b'0'),
                _ => Err(QuadtreeError::InvalidPath(format!(
                    "invalid quadrant character in {s:?}"
                ))),
            })
            .collect::<Result<Vec<u8>>>()?;
        Self::from_branches(&branches)
    }
}
