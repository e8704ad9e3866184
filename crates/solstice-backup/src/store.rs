use std::sync::{Arc, RwLock};

use hashbrown::HashMap;
use solstice_world::{RegionCoord, RegionKey, WorldHost, WorldId};

use crate::snapshot::RegionSnapshot;

#[derive(Clone, Debug)]
pub struct StoredBackup {
    pub world: WorldId,
    pub coord: RegionCoord,
    pub snapshot: Arc<RegionSnapshot>,
}

/// Snapshots of every region touched this session, keyed by region.
#[derive(Default)]
pub struct BackupStore {
    entries: RwLock<HashMap<RegionKey, StoredBackup>>,
}

impl BackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `snapshot` unless the region already has one. Only the call that
    /// actually stored gets `Some` back, so exactly one caller goes on to
    /// persist it.
    pub fn capture_if_absent(
        &self,
        world: WorldId,
        coord: RegionCoord,
        snapshot: RegionSnapshot,
    ) -> Option<Arc<RegionSnapshot>> {
        let key = RegionKey::new(world, coord);
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&key) {
            return None;
        }
        let snapshot = Arc::new(snapshot);
        entries.insert(
            key,
            StoredBackup {
                world,
                coord,
                snapshot: Arc::clone(&snapshot),
            },
        );
        Some(snapshot)
    }

    pub fn get(&self, key: RegionKey) -> Option<Arc<RegionSnapshot>> {
        self.entries
            .read()
            .unwrap()
            .get(&key)
            .map(|e| Arc::clone(&e.snapshot))
    }

    #[inline]
    pub fn contains(&self, key: RegionKey) -> bool {
        self.entries.read().unwrap().contains_key(&key)
    }

    pub fn remove(&self, key: RegionKey) -> Option<StoredBackup> {
        self.entries.write().unwrap().remove(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<StoredBackup> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Writes the stored snapshot back into the live world and refreshes the
    /// region. Returns whether a snapshot existed. Safe to repeat.
    pub fn restore(&self, host: &dyn WorldHost, world: WorldId, coord: RegionCoord) -> bool {
        let Some(snapshot) = self.get(RegionKey::new(world, coord)) else {
            return false;
        };
        let writes = snapshot.apply(host, world, coord);
        host.refresh_region(world, coord);
        log::trace!(target: "backup", "restored {world}/{coord} ({writes} samples)");
        true
    }
}
