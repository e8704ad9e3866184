use crate::region::REGION_SIZE;

/// Fixed-stride sampling lattice over one region's full vertical extent.
///
/// Points are ordered x-major, then z, then ascending y; snapshot indices
/// follow the same order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleGrid {
    pub step_xz: u8,
    pub step_y: u8,
    pub min_y: i32,
    pub max_y: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplePoint {
    /// Offset inside the region, `0..REGION_SIZE`.
    pub lx: i32,
    pub lz: i32,
    /// Absolute height.
    pub y: i32,
}

impl SampleGrid {
    pub fn new(step_xz: u8, step_y: u8, min_y: i32, max_y: i32) -> Self {
        Self {
            step_xz: step_xz.max(1),
            step_y: step_y.max(1),
            min_y,
            max_y: max_y.max(min_y),
        }
    }

    #[inline]
    pub fn columns_per_axis(&self) -> usize {
        let s = self.step_xz.max(1) as usize;
        (REGION_SIZE as usize).div_ceil(s)
    }

    /// Height covered by the grid. Computed in `i64` so any pair of `i32`
    /// bounds is representable.
    #[inline]
    pub fn height_span(&self) -> u64 {
        (i64::from(self.max_y) - i64::from(self.min_y)).max(0) as u64
    }

    #[inline]
    pub fn layers(&self) -> usize {
        let layers = self.height_span().div_ceil(u64::from(self.step_y.max(1)));
        usize::try_from(layers).unwrap_or(usize::MAX)
    }

    #[inline]
    pub fn len(&self) -> usize {
        let c = self.columns_per_axis();
        (c * c).saturating_mul(self.layers())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> impl Iterator<Item = SamplePoint> + '_ {
        let sxz = self.step_xz.max(1) as usize;
        let sy = self.step_y.max(1) as usize;
        let (min_y, max_y) = (self.min_y, self.max_y);
        (0..REGION_SIZE).step_by(sxz).flat_map(move |lx| {
            (0..REGION_SIZE).step_by(sxz).flat_map(move |lz| {
                (min_y..max_y)
                    .step_by(sy)
                    .map(move |y| SamplePoint { lx, lz, y })
            })
        })
    }

    /// Snapshot index of the lattice cell covering `(lx, y, lz)`. Heights
    /// outside the extent clamp to the nearest layer.
    pub fn index_of(&self, lx: i32, y: i32, lz: i32) -> Option<usize> {
        if !(0..REGION_SIZE).contains(&lx) || !(0..REGION_SIZE).contains(&lz) {
            return None;
        }
        let layers = self.layers();
        if layers == 0 {
            return None;
        }
        let step = self.step_xz.max(1) as usize;
        let cols = self.columns_per_axis();
        let yy = y.clamp(self.min_y, self.max_y.saturating_sub(1));
        let iy = ((i64::from(yy) - i64::from(self.min_y)) as u64 / u64::from(self.step_y.max(1))) as usize;
        let ix = lx as usize / step;
        let iz = lz as usize / step;
        Some((ix * cols + iz) * layers + iy.min(layers - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_matches_point_count() {
        for (sxz, sy, min, max) in [(4, 4, -64, 320), (3, 5, 0, 256), (16, 7, 10, 11), (1, 1, 0, 3)] {
            let g = SampleGrid::new(sxz, sy, min, max);
            assert_eq!(g.points().count(), g.len(), "{g:?}");
        }
        let g = SampleGrid::new(4, 4, -64, 320);
        assert_eq!(g.len(), 4 * 4 * 96);
    }

    #[test]
    fn index_of_agrees_with_iteration_order() {
        let g = SampleGrid::new(3, 5, -7, 40);
        for (i, p) in g.points().enumerate() {
            assert_eq!(g.index_of(p.lx, p.y, p.lz), Some(i));
        }
    }

    #[test]
    fn extreme_heights_do_not_overflow() {
        let g = SampleGrid::new(1, 1, i32::MIN, i32::MAX);
        assert_eq!(g.height_span(), u64::from(u32::MAX));
        assert_eq!(g.layers(), u32::MAX as usize);
        assert_eq!(g.len(), 256 * u32::MAX as usize);
        assert_eq!(g.index_of(0, i32::MAX, 0), Some(u32::MAX as usize - 1));
        let flat = SampleGrid::new(4, 4, i32::MIN, i32::MIN);
        assert_eq!(flat.len(), 0);
        assert_eq!(flat.index_of(0, 0, 0), None);
    }

    #[test]
    fn index_of_clamps_height_and_rejects_outside_columns() {
        let g = SampleGrid::new(4, 4, 0, 16);
        assert_eq!(g.index_of(0, -100, 0), Some(0));
        assert_eq!(g.index_of(0, 1000, 0), Some(3));
        assert_eq!(g.index_of(16, 0, 0), None);
        assert_eq!(g.index_of(0, 0, -1), None);
    }
}
