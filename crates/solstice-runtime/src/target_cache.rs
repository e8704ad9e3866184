use std::sync::RwLock;

use hashbrown::HashMap;
use solstice_biomes::BiomeId;
use solstice_world::{RegionCoord, RegionKey, WorldId};

/// Last target applied per region, plus the set of regions whose live
/// biomes currently differ from their backup.
#[derive(Default)]
pub struct TargetCache {
    last_applied: RwLock<HashMap<RegionKey, BiomeId>>,
    modified: RwLock<HashMap<RegionKey, (WorldId, RegionCoord)>>,
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, key: RegionKey) -> Option<BiomeId> {
        self.last_applied.read().unwrap().get(&key).copied()
    }

    pub fn set(&self, key: RegionKey, target: BiomeId) {
        self.last_applied.write().unwrap().insert(key, target);
    }

    pub fn remove(&self, key: RegionKey) -> Option<BiomeId> {
        self.last_applied.write().unwrap().remove(&key)
    }

    /// Drops every cached target. Modified marks are kept.
    pub fn clear(&self) {
        self.last_applied.write().unwrap().clear();
    }

    pub fn mark_modified(&self, world: WorldId, coord: RegionCoord) {
        self.modified
            .write()
            .unwrap()
            .insert(RegionKey::new(world, coord), (world, coord));
    }

    #[inline]
    pub fn is_modified(&self, key: RegionKey) -> bool {
        self.modified.read().unwrap().contains_key(&key)
    }

    pub fn take_modified(&self, key: RegionKey) -> Option<(WorldId, RegionCoord)> {
        self.modified.write().unwrap().remove(&key)
    }

    pub fn clear_modified(&self) {
        self.modified.write().unwrap().clear();
    }

    /// Snapshot of every modified region.
    pub fn modified(&self) -> Vec<(WorldId, RegionCoord)> {
        self.modified.read().unwrap().values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.last_applied.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_and_marks_are_independent() {
        let cache = TargetCache::new();
        let w = WorldId::from_u128(1);
        let c = RegionCoord::new(4, 4);
        let k = RegionKey::new(w, c);
        cache.set(k, BiomeId(7));
        cache.mark_modified(w, c);
        cache.clear();
        assert_eq!(cache.get(k), None);
        assert!(cache.is_modified(k));
        assert_eq!(cache.modified(), vec![(w, c)]);
        assert_eq!(cache.take_modified(k), Some((w, c)));
        assert!(!cache.is_modified(k));
    }
}
