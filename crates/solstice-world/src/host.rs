use solstice_biomes::BiomeId;

use crate::region::{RegionCoord, WorldId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldBounds {
    pub min_y: i32,
    /// Exclusive.
    pub max_y: i32,
    pub sea_level: i32,
}

impl WorldBounds {
    /// Sea level clamped into `[min_y, max_y - 1]`.
    #[inline]
    pub fn sample_y(&self) -> i32 {
        self.sea_level.clamp(self.min_y, (self.max_y - 1).max(self.min_y))
    }

    #[inline]
    pub fn contains_y(&self, y: i32) -> bool {
        y >= self.min_y && y < self.max_y
    }
}

pub type ObserverId = u64;

/// A connected viewer whose surroundings should be repainted first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observer {
    pub id: ObserverId,
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Horizontal look direction; need not be normalized.
    pub facing: (f64, f64),
}

impl Observer {
    #[inline]
    pub fn region(&self) -> RegionCoord {
        RegionCoord::containing(self.x.floor() as i32, self.z.floor() as i32)
    }
}

/// Everything the repaint engine needs from the host world.
///
/// Implementations are shared across the tick loop, region workers, and I/O
/// completions, so every method takes `&self`.
pub trait WorldHost: Send + Sync {
    fn bounds(&self, world: WorldId) -> Option<WorldBounds>;

    #[inline]
    fn is_world_loaded(&self, world: WorldId) -> bool {
        self.bounds(world).is_some()
    }

    fn is_region_loaded(&self, world: WorldId, coord: RegionCoord) -> bool;

    /// Makes the region resident if the host supports on-demand loading.
    fn load_region(&self, world: WorldId, coord: RegionCoord) -> bool {
        self.is_region_loaded(world, coord)
    }

    fn biome_at(&self, world: WorldId, x: i32, y: i32, z: i32) -> Option<BiomeId>;

    fn set_biome(&self, world: WorldId, x: i32, y: i32, z: i32, biome: BiomeId);

    /// Resend the region to every observer that can see it.
    fn refresh_region(&self, world: WorldId, coord: RegionCoord);

    fn observers(&self) -> Vec<Observer>;

    /// Host-specific anti-flicker nudge for a single observer.
    fn nudge_observer(&self, _observer: ObserverId, _world: WorldId, _coord: RegionCoord) {}
}
