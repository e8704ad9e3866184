use std::collections::VecDeque;
use std::sync::Mutex;

use hashbrown::HashSet;
use solstice_world::{RegionCoord, RegionKey, WorldId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRegion {
    pub key: RegionKey,
    pub world: WorldId,
    pub coord: RegionCoord,
}

impl PendingRegion {
    pub fn new(world: WorldId, coord: RegionCoord) -> Self {
        Self {
            key: RegionKey::new(world, coord),
            world,
            coord,
        }
    }
}

#[derive(Default)]
struct QueueState {
    fifo: VecDeque<PendingRegion>,
    keys: HashSet<RegionKey>,
}

/// FIFO of regions waiting for a repaint. A region is queued at most once
/// until it is popped.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the region was already pending.
    pub fn enqueue(&self, world: WorldId, coord: RegionCoord) -> bool {
        let item = PendingRegion::new(world, coord);
        let mut st = self.state.lock().unwrap();
        if !st.keys.insert(item.key) {
            return false;
        }
        st.fifo.push_back(item);
        true
    }

    pub fn pop(&self) -> Option<PendingRegion> {
        let mut st = self.state.lock().unwrap();
        let item = st.fifo.pop_front()?;
        st.keys.remove(&item.key);
        Some(item)
    }

    /// Drops a pending region, e.g. because it was unloaded.
    pub fn remove(&self, key: RegionKey) -> bool {
        let mut st = self.state.lock().unwrap();
        if !st.keys.remove(&key) {
            return false;
        }
        st.fifo.retain(|p| p.key != key);
        true
    }

    #[inline]
    pub fn contains(&self, key: RegionKey) -> bool {
        self.state.lock().unwrap().keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut st = self.state.lock().unwrap();
        st.fifo.clear();
        st.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_suppressed_until_popped() {
        let q = WorkQueue::new();
        let w = WorldId::from_u128(1);
        assert!(q.enqueue(w, RegionCoord::new(0, 0)));
        assert!(q.enqueue(w, RegionCoord::new(1, 0)));
        assert!(!q.enqueue(w, RegionCoord::new(0, 0)));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().map(|p| p.coord), Some(RegionCoord::new(0, 0)));
        assert!(q.enqueue(w, RegionCoord::new(0, 0)));
        assert_eq!(q.pop().map(|p| p.coord), Some(RegionCoord::new(1, 0)));
    }

    #[test]
    fn remove_drops_from_fifo() {
        let q = WorkQueue::new();
        let w = WorldId::from_u128(2);
        q.enqueue(w, RegionCoord::new(0, 0));
        q.enqueue(w, RegionCoord::new(5, 5));
        assert!(q.remove(RegionKey::new(w, RegionCoord::new(0, 0))));
        assert!(!q.remove(RegionKey::new(w, RegionCoord::new(0, 0))));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().map(|p| p.coord), Some(RegionCoord::new(5, 5)));
        assert!(q.pop().is_none());
    }
}
