use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use solstice_world::{Observer, ObserverId, RegionCoord, RegionKey, WorldHost, WorldId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NudgeSettings {
    pub enabled: bool,
    /// Nudges sent per observer per tick.
    pub per_tick: usize,
    /// Minimum gap between two nudges of the same region for one observer.
    pub cooldown: Duration,
    /// View distance in regions.
    pub view_distance: i32,
}

impl Default for NudgeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            per_tick: 8,
            cooldown: Duration::from_millis(3000),
            view_distance: 10,
        }
    }
}

#[derive(Default)]
struct NudgeState {
    queues: HashMap<ObserverId, VecDeque<(WorldId, RegionCoord)>>,
    last: HashMap<(ObserverId, RegionKey), Instant>,
}

/// Per-observer queue of anti-flicker nudges for repainted regions.
#[derive(Default)]
pub struct NudgeQueue {
    state: Mutex<NudgeState>,
}

impl NudgeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a nudge unless this observer got one for the region within the
    /// cooldown. Returns whether it was queued.
    pub fn enqueue(
        &self,
        observer: ObserverId,
        world: WorldId,
        coord: RegionCoord,
        now: Instant,
        cooldown: Duration,
    ) -> bool {
        let mut st = self.state.lock().unwrap();
        let ck = (observer, RegionKey::new(world, coord));
        if let Some(last) = st.last.get(&ck) {
            if now.saturating_duration_since(*last) < cooldown {
                return false;
            }
        }
        st.last.insert(ck, now);
        st.queues.entry(observer).or_default().push_back((world, coord));
        true
    }

    /// Queues a nudge for every observer within view of the region.
    pub fn enqueue_viewers(
        &self,
        observers: &[Observer],
        world: WorldId,
        coord: RegionCoord,
        now: Instant,
        settings: &NudgeSettings,
    ) -> usize {
        if !settings.enabled {
            return 0;
        }
        let view = reach(settings.view_distance, 1);
        observers
            .iter()
            .filter(|o| o.world == world && o.region().chebyshev(coord) <= view)
            .filter(|o| self.enqueue(o.id, world, coord, now, settings.cooldown))
            .count()
    }

    pub fn remove_region(&self, world: WorldId, coord: RegionCoord) {
        let mut st = self.state.lock().unwrap();
        for q in st.queues.values_mut() {
            q.retain(|&(w, c)| w != world || c != coord);
        }
    }

    /// Sends up to `per_tick` queued nudges per observer. Entries for regions
    /// that are out of range or no longer resident are dropped.
    pub fn flush(&self, host: &dyn WorldHost, now: Instant, settings: &NudgeSettings) -> usize {
        let observers = host.observers();
        let mut st = self.state.lock().unwrap();
        st.queues
            .retain(|id, q| !q.is_empty() && observers.iter().any(|o| o.id == *id));
        let cooldown = settings.cooldown;
        st.last
            .retain(|_, t| now.saturating_duration_since(*t) < cooldown);
        if !settings.enabled {
            st.queues.clear();
            return 0;
        }

        let view = reach(settings.view_distance, 2);
        let mut sent = 0;
        for o in &observers {
            let Some(q) = st.queues.get_mut(&o.id) else {
                continue;
            };
            let here = o.region();
            for _ in 0..settings.per_tick {
                let Some((world, coord)) = q.pop_front() else {
                    break;
                };
                if world != o.world
                    || here.chebyshev(coord) > view
                    || !host.is_region_loaded(world, coord)
                {
                    continue;
                }
                host.nudge_observer(o.id, world, coord);
                sent += 1;
            }
        }
        sent
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().queues.values().map(VecDeque::len).sum()
    }

    pub fn clear(&self) {
        let mut st = self.state.lock().unwrap();
        st.queues.clear();
        st.last.clear();
    }
}

/// View distance widened by `slack` regions, in Chebyshev units.
fn reach(view_distance: i32, slack: u32) -> u32 {
    u32::try_from(view_distance).unwrap_or(0).saturating_add(slack)
}
