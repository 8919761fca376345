//! Node numbering within quadsets.
//!
//! The global quadtree is cut into quadsets. The root quadset covers
//! levels 0-3 (85 nodes); every other quadset is rooted at level
//! `3 + 4k` and covers five levels (341 nodes), the first of which
//! overlaps the last level of its parent quadset.
//!
//! Within a quadset nodes are addressed three ways:
//!
//! - **Traversal path** relative to the quadset root.
//! - **Inorder** index: the node's position in a pre-order walk.
//! - **Subindex**: level order. Quadsets other than the root number the
//!   second row specially: each of the four subtrees below the root is
//!   numbered level by level before the next one starts. The root quadset
//!   uses plain level order.
//!
//! A quadset itself is identified by the global node number of its root,
//! the breadth-first index of that tile in the whole quadtree.
//!
//! ```text
//! depth 5, mangled second row:
//!
//!   subindex 0        ""
//!   subindex 1..=85   "0" subtree: "0", "00".."03", "000".."033", ...
//!   subindex 86..=170 "1" subtree
//!   ...
//! ```

use crate::quadtree::error::{QuadtreeError, Result};
use crate::quadtree::path::QuadtreePath;

const BRANCHING: u64 = 4;
const X_OFFSETS: [u32; 4] = [0, 1, 1, 0];
const Y_OFFSETS: [u32; 4] = [0, 0, 1, 1];

/// Numbering scheme of one quadset shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadtreeNumbering {
    depth: u32,
    mangle_second_row: bool,
}

impl QuadtreeNumbering {
    /// Levels covered by the root quadset.
    pub const ROOT_DEPTH: u32 = 4;

    /// Levels covered by every other quadset.
    pub const DEFAULT_DEPTH: u32 = 5;

    /// Numbering of the root quadset.
    pub const ROOT: Self = Self::new(Self::ROOT_DEPTH, false);

    /// Numbering of every quadset below the root.
    pub const DEFAULT: Self = Self::new(Self::DEFAULT_DEPTH, true);

    /// Numbering of a tree `depth` levels deep.
    pub const fn new(depth: u32, mangle_second_row: bool) -> Self {
        Self {
            depth,
            mangle_second_row,
        }
    }

    /// Numbering used by a packet, depending on whether it is the root
    /// quadset.
    pub const fn for_packet(root_node: bool) -> Self {
        if root_node { Self::ROOT } else { Self::DEFAULT }
    }

    /// Numbering of quadset `quadset_num`.
    pub const fn for_quadset(quadset_num: u64) -> Self {
        Self::for_packet(quadset_num == 0)
    }

    /// Number of levels.
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// True if the second row is numbered subtree by subtree.
    pub const fn mangles_second_row(&self) -> bool {
        self.mangle_second_row
    }

    /// Number of nodes in the tree.
    pub const fn num_nodes(&self) -> u32 {
        nodes_above(self.depth) as u32
    }

    /// True if `index` is a valid subindex or inorder index.
    pub const fn in_range(&self, index: u32) -> bool {
        index < self.num_nodes()
    }

    /// Traversal path of the node with subindex `subindex`.
    pub fn subindex_to_path(&self, subindex: u32) -> Result<QuadtreePath> {
        self.check_index(subindex, "subindex")?;
        let subindex = u64::from(subindex);
        if !self.mangle_second_row || subindex == 0 {
            return level_order_to_path(subindex);
        }
        let subtree = nodes_above(self.depth - 1);
        let offset = subindex - 1;
        let quad = (offset / subtree) as u8;
        let below = level_order_to_path(offset % subtree)?;
        QuadtreePath::root().child(quad)?.concat(&below)
    }

    /// Subindex of the node at `path`.
    pub fn path_to_subindex(&self, path: &QuadtreePath) -> Result<u32> {
        self.check_path(path)?;
        let level = path.level();
        let subindex = match path.branch(0) {
            Some(quad) if self.mangle_second_row => {
                let rel_level = level - 1;
                let within =
                    nodes_above(rel_level) + (path.as_index(level) & level_mask(rel_level));
                1 + u64::from(quad) * nodes_above(self.depth - 1) + within
            }
            _ => nodes_above(level) + path.as_index(level),
        };
        Ok(subindex as u32)
    }

    /// Pre-order index of the node at `path`.
    pub fn path_to_inorder(&self, path: &QuadtreePath) -> Result<u32> {
        self.check_path(path)?;
        let inorder: u64 = path
            .branches()
            .zip(0u32..)
            .map(|(quad, i)| 1 + u64::from(quad) * nodes_above(self.depth - 1 - i))
            .sum();
        Ok(inorder as u32)
    }

    /// Traversal path of the node with pre-order index `inorder`.
    pub fn inorder_to_path(&self, inorder: u32) -> Result<QuadtreePath> {
        self.check_index(inorder, "inorder index")?;
        let mut remaining = u64::from(inorder);
        let mut path = QuadtreePath::root();
        while remaining > 0 {
            remaining -= 1;
            let subtree = nodes_above(self.depth - 1 - path.level());
            path = path.child((remaining / subtree) as u8)?;
            remaining %= subtree;
        }
        Ok(path)
    }

    /// Convert a subindex to the pre-order index of the same node.
    pub fn subindex_to_inorder(&self, subindex: u32) -> Result<u32> {
        self.path_to_inorder(&self.subindex_to_path(subindex)?)
    }

    /// Convert a pre-order index to the subindex of the same node.
    pub fn inorder_to_subindex(&self, inorder: u32) -> Result<u32> {
        self.path_to_subindex(&self.inorder_to_path(inorder)?)
    }

    /// Level and grid position (x to the right, y up) of a node.
    pub fn subindex_to_level_xy(&self, subindex: u32) -> Result<(u32, u32, u32)> {
        let path = self.subindex_to_path(subindex)?;
        let level = path.level();
        let (x, y) = path.branches().fold((0, 0), |(x, y), quad| {
            (
                (x << 1) | X_OFFSETS[quad as usize],
                (y << 1) | Y_OFFSETS[quad as usize],
            )
        });
        Ok((level, x, y))
    }

    /// Subindex of the node at grid position `(x, y)` of `level`.
    pub fn level_xy_to_subindex(&self, level: u32, x: u32, y: u32) -> Result<u32> {
        if level >= self.depth || x >> level != 0 || y >> level != 0 {
            return Err(QuadtreeError::InvalidPath(format!(
                "position ({x}, {y}) at level {level} outside a tree of depth {}",
                self.depth
            )));
        }
        let branches: Vec<u8> = (0..level)
            .rev()
            .map(|bit| match ((x >> bit) & 1, (y >> bit) & 1) {
                (0, 0) => 0,
                (1, 0) => 1,
                (1, _) => 2,
                _ => 3,
            })
            .collect();
        self.path_to_subindex(&QuadtreePath::from_branches(&branches)?)
    }

    /// Level of the node with subindex `subindex`.
    pub fn subindex_level(&self, subindex: u32) -> Result<u32> {
        Ok(self.subindex_to_path(subindex)?.level())
    }

    /// Subindices of the four children, `None` on the last level.
    pub fn children_subindex(&self, subindex: u32) -> Result<Option<[u32; 4]>> {
        let path = self.subindex_to_path(subindex)?;
        if path.level() + 1 >= self.depth {
            return Ok(None);
        }
        let mut children = [0; 4];
        for (quad, child) in (0u8..).zip(children.iter_mut()) {
            *child = self.path_to_subindex(&path.child(quad)?)?;
        }
        Ok(Some(children))
    }

    /// Subindex of the parent, `None` for the root.
    pub fn parent_subindex(&self, subindex: u32) -> Result<Option<u32>> {
        self.subindex_to_path(subindex)?
            .parent()
            .map(|parent| self.path_to_subindex(&parent))
            .transpose()
    }

    fn check_index(&self, index: u32, what: &str) -> Result<()> {
        if self.in_range(index) {
            Ok(())
        } else {
            Err(QuadtreeError::InvalidPath(format!(
                "{what} {index} outside a tree of {} nodes",
                self.num_nodes()
            )))
        }
    }

    fn check_path(&self, path: &QuadtreePath) -> Result<()> {
        if path.level() < self.depth {
            Ok(())
        } else {
            Err(QuadtreeError::InvalidPath(format!(
                "\"{path}\" lies below a tree of depth {}",
                self.depth
            )))
        }
    }
}

/// Nodes in a full quadtree of `levels` levels.
const fn nodes_above(levels: u32) -> u64 {
    (BRANCHING.pow(levels) - 1) / (BRANCHING - 1)
}

const fn level_mask(level: u32) -> u64 {
    (1u64 << (2 * level)) - 1
}

/// Path of the node at position `index` of a plain level-order numbering.
fn level_order_to_path(index: u64) -> Result<QuadtreePath> {
    let mut level = 0;
    while nodes_above(level + 1) <= index {
        level += 1;
    }
    let offset = index - nodes_above(level);
    let branches: Vec<u8> = (0..level)
        .rev()
        .map(|i| ((offset >> (2 * i)) & 3) as u8)
        .collect();
    QuadtreePath::from_branches(&branches)
}

/// Breadth-first index of `path` in the whole quadtree.
pub fn path_to_global_node_number(path: &QuadtreePath) -> u64 {
    path.branches()
        .fold(0, |num, quad| num * BRANCHING + u64::from(quad) + 1)
}

/// Path of the tile with breadth-first index `num`.
pub fn global_node_number_to_path(mut num: u64) -> Result<QuadtreePath> {
    let mut branches = Vec::new();
    while num > 0 {
        branches.push(((num - 1) & 3) as u8);
        num = (num - 1) / BRANCHING;
    }
    branches.reverse();
    QuadtreePath::from_branches(&branches)
}

/// Absolute path of node `subindex` in quadset `quadset_num`.
pub fn quadset_and_subindex_to_path(quadset_num: u64, subindex: u32) -> Result<QuadtreePath> {
    let numbering = QuadtreeNumbering::for_quadset(quadset_num);
    if quadset_num == 0 {
        return numbering.subindex_to_path(subindex);
    }
    global_node_number_to_path(quadset_num)?.concat(&numbering.subindex_to_path(subindex)?)
}

/// Quadset number and subindex addressing `path`.
///
/// Paths on a level shared by two quadsets resolve to the deeper one,
/// where the node is a quadset root.
pub fn path_to_quadset_and_subindex(path: &QuadtreePath) -> Result<(u64, u32)> {
    let level = path.level();
    if level < QuadtreeNumbering::ROOT_DEPTH {
        return Ok((0, QuadtreeNumbering::ROOT.path_to_subindex(path)?));
    }
    let quadset_root = path.truncated(4 * (level / 4) - 1);
    let relative = quadset_root.relative_path(path).ok_or_else(|| {
        QuadtreeError::InvalidPath(format!("\"{quadset_root}\" is not an ancestor of \"{path}\""))
    })?;
    Ok((
        path_to_global_node_number(&quadset_root),
        QuadtreeNumbering::DEFAULT.path_to_subindex(&relative)?,
    ))
}

/// True if tiles of `level` are the root of some quadset.
pub const fn is_quadset_root_level(level: u32) -> bool {
    let first = QuadtreeNumbering::ROOT_DEPTH - 1;
    level == 0
        || (level >= first && (level - first) % (QuadtreeNumbering::DEFAULT_DEPTH - 1) == 0)
}

/// Maps-style tile name: `t` followed by one of `t s r q` per quadrant
/// 0-3.
pub fn level_row_col_to_maps_path(level: u32, row: u32, col: u32) -> Result<String> {
    let path = QuadtreePath::from_level_row_col(level, row, col)?;
    let mut name = String::with_capacity(path.level() as usize + 1);
    name.push('t');
    name.extend(path.branches().map(|quad| char::from(b't' - quad)));
    Ok(name)
}

/// Level, row and column of a Maps-style tile name.
pub fn maps_path_to_level_row_col(name: &str) -> Result<(u32, u32, u32)> {
    let rest = name.strip_prefix('t').ok_or_else(|| {
        QuadtreeError::InvalidPath(format!("maps tile name {name:?} does not start with 't'"))
    })?;
    let branches = rest
        .bytes()
        .map(|b| match b {
            b'q'..=b't' => Ok(b't' - b),
            _ => Err(QuadtreeError::InvalidPath(format!(
                "invalid character in maps tile name {name:?}"
            ))),
        })
        .collect::<Result<Vec<u8>>>()?;
    Ok(QuadtreePath::from_branches(&branches)?.level_row_col())
}
