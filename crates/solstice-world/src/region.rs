use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Horizontal edge length of a region, in blocks.
pub const REGION_SIZE: i32 = 16;
pub const REGION_SHIFT: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub Uuid);

impl WorldId {
    #[inline]
    pub const fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }

    /// 128-bit id folded to 64 bits (`msb ^ lsb`).
    #[inline]
    pub fn folded(self) -> u64 {
        let (hi, lo) = self.0.as_u64_pair();
        hi ^ lo
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionCoord {
    pub rx: i32,
    pub rz: i32,
}

impl RegionCoord {
    #[inline]
    pub const fn new(rx: i32, rz: i32) -> Self {
        Self { rx, rz }
    }

    /// Region containing the block column `(x, z)`.
    #[inline]
    pub const fn containing(x: i32, z: i32) -> Self {
        Self {
            rx: x >> REGION_SHIFT,
            rz: z >> REGION_SHIFT,
        }
    }

    /// Wraps at the edges of the coordinate space.
    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            rx: self.rx.wrapping_add(dx),
            rz: self.rz.wrapping_add(dz),
        }
    }

    /// Block coordinates of the region's minimum corner.
    #[inline]
    pub const fn origin(self) -> (i32, i32) {
        (self.rx << REGION_SHIFT, self.rz << REGION_SHIFT)
    }

    #[inline]
    pub fn chebyshev(self, other: RegionCoord) -> u32 {
        self.rx.abs_diff(other.rx).max(self.rz.abs_diff(other.rz))
    }
}

impl From<(i32, i32)> for RegionCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl std::fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.rx, self.rz)
    }
}

/// Collision-resistant 64-bit handle for a region in a specific world.
///
/// Stable across restarts: x fills the high half, z the low half, and the
/// folded world id is XORed on top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey(pub u64);

impl RegionKey {
    #[inline]
    pub fn new(world: WorldId, coord: RegionCoord) -> Self {
        let packed = ((coord.rx as u32 as u64) << 32) | (coord.rz as u32 as u64);
        Self(packed ^ world.folded())
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_floors_negative_blocks() {
        assert_eq!(RegionCoord::containing(-1, -16), RegionCoord::new(-1, -1));
        assert_eq!(RegionCoord::containing(-17, 15), RegionCoord::new(-2, 0));
        assert_eq!(RegionCoord::containing(16, 31), RegionCoord::new(1, 1));
        assert_eq!(RegionCoord::new(-2, 3).origin(), (-32, 48));
    }

    #[test]
    fn far_coordinates_do_not_overflow() {
        let (lo, hi) = (RegionCoord::new(i32::MIN, 0), RegionCoord::new(i32::MAX, -3));
        assert_eq!(lo.chebyshev(hi), u32::MAX);
        assert_eq!(hi.chebyshev(lo), u32::MAX);
        assert_eq!(RegionCoord::new(2, -7).chebyshev(RegionCoord::new(-1, -5)), 3);
        assert_eq!(hi.offset(1, 0), RegionCoord::new(i32::MIN, -3));
        assert_eq!(lo.offset(-1, 2), RegionCoord::new(i32::MAX, 2));
    }

    #[test]
    fn key_is_stable_and_world_scoped() {
        let a = WorldId::from_u128(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210);
        let b = WorldId::from_u128(0x1111_2222_3333_4444_5555_6666_7777_8888);
        let c = RegionCoord::new(-5, 12);
        assert_eq!(RegionKey::new(a, c), RegionKey::new(a, c));
        assert_ne!(RegionKey::new(a, c), RegionKey::new(b, c));
        let expected = ((-5i32 as u32 as u64) << 32 | 12) ^ a.folded();
        assert_eq!(RegionKey::new(a, c).raw(), expected);
    }

    #[test]
    fn world_id_display_parses_back() {
        let w = WorldId::from_u128(42);
        assert_eq!(WorldId::parse(&w.to_string()), Some(w));
        assert_eq!(WorldId::parse("not-a-uuid"), None);
    }
}
