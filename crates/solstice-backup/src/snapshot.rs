use solstice_biomes::BiomeId;
use solstice_world::{REGION_SIZE, RegionCoord, SampleGrid, WorldHost, WorldId};

/// Biomes recorded on a [`SampleGrid`] before a region was first repainted.
///
/// Samples follow the grid's iteration order (x, then z, then ascending y).
/// A snapshot never changes after capture; stores hand out `Arc`s to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionSnapshot {
    grid: SampleGrid,
    samples: Vec<BiomeId>,
}

impl RegionSnapshot {
    pub fn new(grid: SampleGrid, samples: Vec<BiomeId>) -> Self {
        debug_assert_eq!(grid.len(), samples.len(), "snapshot length must match its grid");
        Self { grid, samples }
    }

    /// Reads every grid point of a region from the live world.
    pub fn capture(
        host: &dyn WorldHost,
        world: WorldId,
        coord: RegionCoord,
        grid: SampleGrid,
    ) -> Option<Self> {
        let (bx, bz) = coord.origin();
        let mut samples = Vec::with_capacity(grid.len());
        for p in grid.points() {
            samples.push(host.biome_at(world, bx + p.lx, p.y, bz + p.lz)?);
        }
        Some(Self { grid, samples })
    }

    #[inline]
    pub fn grid(&self) -> SampleGrid {
        self.grid
    }

    #[inline]
    pub fn samples(&self) -> &[BiomeId] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<BiomeId> {
        self.samples.first().copied()
    }

    pub fn any(&self, mut pred: impl FnMut(BiomeId) -> bool) -> bool {
        self.samples.iter().any(|b| pred(*b))
    }

    pub fn find(&self, mut pred: impl FnMut(BiomeId) -> bool) -> Option<BiomeId> {
        self.samples.iter().copied().find(|b| pred(*b))
    }

    /// Recorded biome covering world block `(x, y, z)`, with `y` clamped to
    /// the captured height range. Falls back to the first sample when the
    /// lattice cell lies past the recorded samples.
    pub fn sample_at(&self, x: i32, y: i32, z: i32) -> Option<BiomeId> {
        let lx = x.rem_euclid(REGION_SIZE);
        let lz = z.rem_euclid(REGION_SIZE);
        match self.grid.index_of(lx, y, lz) {
            Some(i) if i < self.samples.len() => Some(self.samples[i]),
            _ => self.first(),
        }
    }

    /// Writes every recorded sample back into the live world. Heights outside
    /// the world's current extent are skipped. Returns the number of writes;
    /// the caller refreshes the region.
    pub fn apply(&self, host: &dyn WorldHost, world: WorldId, coord: RegionCoord) -> usize {
        let Some(bounds) = host.bounds(world) else {
            return 0;
        };
        let (bx, bz) = coord.origin();
        let mut writes = 0;
        for (p, biome) in self.grid.points().zip(self.samples.iter().copied()) {
            if !bounds.contains_y(p.y) {
                continue;
            }
            host.set_biome(world, bx + p.lx, p.y, bz + p.lz, biome);
            writes += 1;
        }
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solstice_world::{MemoryWorld, WorldBounds};

    fn world() -> (MemoryWorld, WorldId) {
        let mw = MemoryWorld::new();
        let w = WorldId::from_u128(1);
        mw.add_uniform_world(
            w,
            WorldBounds {
                min_y: 0,
                max_y: 64,
                sea_level: 32,
            },
            BiomeId(5),
        );
        (mw, w)
    }

    #[test]
    fn capture_then_apply_restores_cells() {
        let (mw, w) = world();
        let c = RegionCoord::new(1, 1);
        mw.ensure_loaded(w, c);
        let grid = SampleGrid::new(4, 4, 0, 64);
        let snap = RegionSnapshot::capture(&mw, w, c, grid).unwrap();
        assert_eq!(snap.len(), grid.len());
        mw.paint_region(w, c, BiomeId(9));
        assert_eq!(snap.apply(&mw, w, c), grid.len());
        assert_eq!(mw.count_cells(w, c, BiomeId(5)), grid.len());
    }

    #[test]
    fn apply_skips_heights_outside_current_world() {
        let (mw, w) = world();
        let c = RegionCoord::new(0, 0);
        mw.ensure_loaded(w, c);
        // Captured when the world was taller.
        let grid = SampleGrid::new(4, 4, -64, 128);
        let snap = RegionSnapshot::new(grid, vec![BiomeId(2); grid.len()]);
        let expected = 4 * 4 * 16;
        assert_eq!(snap.apply(&mw, w, c), expected);
    }

    #[test]
    fn sample_at_uses_lattice_cell() {
        let grid = SampleGrid::new(4, 4, 0, 8);
        let samples = (0..grid.len() as u16).map(BiomeId).collect();
        let snap = RegionSnapshot::new(grid, samples);
        // lx=5 -> ix=1, lz=0 -> iz=0, y=6 -> iy=1; (1*4+0)*2+1
        assert_eq!(snap.sample_at(16 + 5, 6, -16), Some(BiomeId(9)));
        assert_eq!(snap.sample_at(0, 500, 0), Some(BiomeId(1)));
    }
}
