use std::sync::RwLock;

use hashbrown::HashSet;
use solstice_biomes::BiomeRegistry;
use solstice_world::{REGION_SIZE, RegionCoord, RegionKey, WorldHost, WorldId};

const STRIDE_XZ: usize = 4;
const STRIDE_Y: usize = 32;

/// Regions whose original biomes include a cold biome. They are never
/// repainted, and membership lasts until the engine is shut down.
#[derive(Default)]
pub struct ColdRegions {
    keys: RwLock<HashSet<RegionKey>>,
}

impl ColdRegions {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, key: RegionKey) -> bool {
        self.keys.read().unwrap().contains(&key)
    }

    pub fn mark(&self, key: RegionKey) {
        self.keys.write().unwrap().insert(key);
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.keys.write().unwrap().clear();
    }

    /// Whether a region must be left alone because it is naturally cold.
    ///
    /// A region with a backup was already checked when it was captured, so
    /// only untouched regions are sampled live: every 4th column on each axis
    /// and every 32nd block of height. A cold hit is remembered.
    pub fn should_skip(
        &self,
        host: &dyn WorldHost,
        reg: &BiomeRegistry,
        world: WorldId,
        coord: RegionCoord,
        has_backup: bool,
    ) -> bool {
        let key = RegionKey::new(world, coord);
        if self.contains(key) {
            return true;
        }
        if has_backup {
            return false;
        }
        let Some(bounds) = host.bounds(world) else {
            return false;
        };
        let (bx, bz) = coord.origin();
        for x in (0..REGION_SIZE).step_by(STRIDE_XZ) {
            for z in (0..REGION_SIZE).step_by(STRIDE_XZ) {
                for y in (bounds.min_y..bounds.max_y).step_by(STRIDE_Y) {
                    if host
                        .biome_at(world, bx + x, y, bz + z)
                        .is_some_and(|b| reg.is_cold(b))
                    {
                        log::trace!(target: "repaint", "{world}/{coord} is naturally cold");
                        self.mark(key);
                        return true;
                    }
                }
            }
        }
        false
    }
}
