//! Child and content flags of a quadtree node.

use std::fmt;

/// Flag byte of a quadtree node.
///
/// | Bit | Mask | Meaning |
/// |-----|------|---------|
/// | 0-3 | 0x0F | Child quadrant N is present in this packet |
/// | 4 | 0x10 | Cache node: children are described by the next quadset |
/// | 5 | 0x20 | Node carries vector (drawable) data |
/// | 6 | 0x40 | Node carries imagery |
/// | 7 | 0x80 | Node carries terrain |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChildFlags(u8);

impl ChildFlags {
    /// Mask of the four child-presence bits.
    pub const CHILD_MASK: u8 = 0x0F;
    /// Cache node bit.
    pub const CACHE_NODE: u8 = 0x10;
    /// Drawable (vector) bit.
    pub const DRAWABLE: u8 = 0x20;
    /// Imagery bit.
    pub const IMAGE: u8 = 0x40;
    /// Terrain bit.
    pub const TERRAIN: u8 = 0x80;

    /// Wrap a raw flag byte.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw flag byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if child quadrant `quad` (0-3) is present.
    pub const fn has_child(self, quad: u8) -> bool {
        quad < 4 && self.0 & (1 << quad) != 0
    }

    /// Set or clear child quadrant `quad`. Values above 3 are ignored.
    pub fn set_child(&mut self, quad: u8, present: bool) {
        if quad < 4 {
            self.set(1 << quad, present);
        }
    }

    /// The four child-presence bits.
    pub const fn child_bits(self) -> u8 {
        self.0 & Self::CHILD_MASK
    }

    /// Number of children present in this packet.
    pub const fn child_count(self) -> u32 {
        self.child_bits().count_ones()
    }

    /// Cache node bit.
    pub const fn is_cache_node(self) -> bool {
        self.0 & Self::CACHE_NODE != 0
    }

    /// Set or clear the cache node bit.
    pub fn set_cache_node(&mut self, on: bool) {
        self.set(Self::CACHE_NODE, on);
    }

    /// Drawable (vector) bit.
    pub const fn has_drawable(self) -> bool {
        self.0 & Self::DRAWABLE != 0
    }

    /// Set or clear the drawable bit.
    pub fn set_drawable(&mut self, on: bool) {
        self.set(Self::DRAWABLE, on);
    }

    /// Imagery bit.
    pub const fn has_image(self) -> bool {
        self.0 & Self::IMAGE != 0
    }

    /// Set or clear the imagery bit.
    pub fn set_image(&mut self, on: bool) {
        self.set(Self::IMAGE, on);
    }

    /// Terrain bit.
    pub const fn has_terrain(self) -> bool {
        self.0 & Self::TERRAIN != 0
    }

    /// Set or clear the terrain bit.
    pub fn set_terrain(&mut self, on: bool) {
        self.set(Self::TERRAIN, on);
    }

    fn set(&mut self, mask: u8, on: bool) {
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }
}

/// Renders as `0x<hex>(<letters>)`, e.g. `0xc3(IT01)`.
impl fmt::Display for ChildFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}(", self.0)?;
        if self.has_image() {
            f.write_str("I")?;
        }
        if self.has_terrain() {
            f.write_str("T")?;
        }
        if self.has_drawable() {
            f.write_str("V")?;
        }
        if self.is_cache_node() {
            f.write_str("C")?;
        }
        for quad in 0..4u8 {
            if self.has_child(quad) {
                write!(f, "{quad}")?;
            }
        }
        f.write_str(")")
    }
}

impl From<u8> for ChildFlags {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl From<ChildFlags> for u8 {
    fn from(flags: ChildFlags) -> Self {
        flags.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_independent() {
        let mut flags = ChildFlags::default();
        flags.set_child(0, true);
        flags.set_child(3, true);
        flags.set_cache_node(true);
        flags.set_drawable(true);
        flags.set_image(true);
        flags.set_terrain(true);
        assert_eq!(flags.bits(), 0xF9);
        assert_eq!(flags.child_count(), 2);

        flags.set_drawable(false);
        flags.set_child(0, false);
        assert_eq!(flags.bits(), 0xD8);
        assert!(flags.has_child(3));
        assert!(!flags.has_child(0));
        assert!(flags.is_cache_node());
        assert!(flags.has_image());
        assert!(flags.has_terrain());
        assert!(!flags.has_drawable());
    }

    #[test]
    fn test_out_of_range_quadrant() {
        let mut flags = ChildFlags::from_bits(0xFF);
        assert!(!flags.has_child(4));
        flags.set_child(4, false);
        assert_eq!(flags.bits(), 0xFF);
    }

    #[test]
    fn test_display() {
        assert_eq!(ChildFlags::from_bits(0xC3).to_string(), "0xc3(IT01)");
        assert_eq!(ChildFlags::from_bits(0x30).to_string(), "0x30(VC)");
        assert_eq!(ChildFlags::default().to_string(), "0x0()");
    }
}
