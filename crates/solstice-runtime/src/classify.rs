use std::sync::RwLock;

use hashbrown::HashMap;
use solstice_backup::RegionSnapshot;
use solstice_biomes::{BiomeId, BiomeRegistry, Family, FamilyRules};
use solstice_world::{RegionCoord, RegionKey, WorldHost, WorldId};

/// Column offsets inside a region sampled when no backup exists yet.
const CORNER_SAMPLES: [(i32, i32); 4] = [(0, 0), (0, 8), (8, 0), (8, 8)];
const CENTRE: i32 = 8;

/// Per-region family and representative-original caches.
#[derive(Default)]
pub struct FamilyClassifier {
    families: RwLock<HashMap<RegionKey, Family>>,
    originals: RwLock<HashMap<RegionKey, BiomeId>>,
}

impl FamilyClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Family of the region's original biome.
    ///
    /// Prefers the backup when one exists, since live samples of a repainted
    /// region no longer show the original. Without a backup the region is
    /// still untouched and a 2x2 sample at sea level decides. Regions whose
    /// world is gone read as `Land` and are not cached.
    pub fn classify(
        &self,
        host: &dyn WorldHost,
        reg: &BiomeRegistry,
        rules: FamilyRules,
        backup: Option<&RegionSnapshot>,
        world: WorldId,
        coord: RegionCoord,
    ) -> Family {
        let key = RegionKey::new(world, coord);
        if let Some(f) = self.families.read().unwrap().get(&key) {
            return *f;
        }
        let family = match backup {
            Some(snap) => rules.classify(reg, snap.samples().iter().copied()),
            None => {
                let Some(bounds) = host.bounds(world) else {
                    return Family::Land;
                };
                let (bx, bz) = coord.origin();
                let y = bounds.sample_y();
                rules.classify(
                    reg,
                    CORNER_SAMPLES
                        .iter()
                        .filter_map(|&(dx, dz)| host.biome_at(world, bx + dx, y, bz + dz)),
                )
            }
        };
        self.families.write().unwrap().insert(key, family);
        family
    }

    /// One biome standing for the region's original: the backup's first
    /// sample, else the live centre column at sea level. Cached once found.
    pub fn representative(
        &self,
        host: &dyn WorldHost,
        backup: Option<&RegionSnapshot>,
        world: WorldId,
        coord: RegionCoord,
    ) -> Option<BiomeId> {
        let key = RegionKey::new(world, coord);
        if let Some(b) = self.originals.read().unwrap().get(&key) {
            return Some(*b);
        }
        let found = match backup.and_then(RegionSnapshot::first) {
            Some(b) => Some(b),
            None => {
                let bounds = host.bounds(world)?;
                let (bx, bz) = coord.origin();
                host.biome_at(world, bx + CENTRE, bounds.sample_y(), bz + CENTRE)
            }
        }?;
        self.originals.write().unwrap().insert(key, found);
        Some(found)
    }

    /// Original biome used for ocean variant decisions: the first ocean
    /// sample of the backup, falling back to [`Self::representative`].
    pub fn representative_ocean(
        &self,
        host: &dyn WorldHost,
        reg: &BiomeRegistry,
        backup: Option<&RegionSnapshot>,
        world: WorldId,
        coord: RegionCoord,
    ) -> Option<BiomeId> {
        backup
            .and_then(|snap| snap.find(|b| reg.is_ocean(b)))
            .or_else(|| self.representative(host, backup, world, coord))
    }

    pub fn forget(&self, key: RegionKey) {
        self.families.write().unwrap().remove(&key);
        self.originals.write().unwrap().remove(&key);
    }

    pub fn clear(&self) {
        self.families.write().unwrap().clear();
        self.originals.write().unwrap().clear();
    }

    pub fn cached(&self) -> usize {
        self.families.read().unwrap().len()
    }
}
