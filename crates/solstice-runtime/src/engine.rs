use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use solstice_backup::{BackupStore, DiskBackupStore, DiskStats, RegionSnapshot, RestoreJob, RestoreProgress};
use solstice_biomes::{BiomeId, BiomeRegistry, Family, SeasonTargetTable};
use solstice_world::{Observer, ObserverId, RegionCoord, RegionKey, WorldHost, WorldId};

use crate::blend::{blend_factor, choose_blended};
use crate::calendar::{Calendar, CalendarState};
use crate::classify::FamilyClassifier;
use crate::cold::ColdRegions;
use crate::config::RepaintConfig;
use crate::executor::{InlineExecutor, RegionExecutor};
use crate::nudge::{NudgeQueue, NudgeSettings};
use crate::offsets::OffsetCache;
use crate::painter::{RegionPainter, Resume};
use crate::queue::{PendingRegion, WorkQueue};
use crate::target_cache::TargetCache;

/// Per-tick repaint budget. Outside the transition window this is `base`;
/// inside it the budget grows with the blend factor up to `base * multiplier`.
pub fn effective_budget(base: usize, factor: f64, in_window: bool, multiplier: f64) -> usize {
    if !in_window {
        return base;
    }
    let boosted = base as f64 * (1.0 + factor.clamp(0.0, 1.0) * (multiplier - 1.0));
    (boosted.round() as usize).max(1)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickReport {
    pub budget: usize,
    pub factor: f64,
    /// Regions handed to the executor.
    pub dispatched: usize,
    /// Queue entries whose world or region was no longer resident.
    pub dropped: usize,
    /// Regions repainted or reverted by jobs that finished during this tick.
    pub painted: usize,
    pub nudges: usize,
    pub disk_completed: usize,
    /// Backups read back from disk and installed this tick.
    pub resumed: usize,
    pub restored: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub enabled: bool,
    pub queued: usize,
    /// Regions waiting on a backup read.
    pub loading: usize,
    pub backups: usize,
    pub modified: usize,
    pub cold: usize,
    pub processed: u64,
    pub painted: u64,
    pub writes: u64,
    pub restoring: bool,
    pub disk: DiskStats,
}

/// What a region should look like this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Paint(BiomeId),
    /// Show the region's own original biomes.
    Original,
}

struct Settings {
    config: RepaintConfig,
    table: SeasonTargetTable,
    nudge: NudgeSettings,
}

impl Settings {
    fn new(registry: &BiomeRegistry, config: RepaintConfig) -> Self {
        let config = config.normalized();
        Self {
            table: SeasonTargetTable::from_config(registry, &config.targets),
            nudge: config.nudge_settings(),
            config,
        }
    }
}

/// State shared between the tick loop and region jobs.
struct RepaintCore {
    host: Arc<dyn WorldHost>,
    calendar: Arc<dyn Calendar>,
    registry: Arc<BiomeRegistry>,
    settings: RwLock<Arc<Settings>>,
    enabled: AtomicBool,
    backups: BackupStore,
    disk: DiskBackupStore,
    classifier: FamilyClassifier,
    cold: ColdRegions,
    targets: TargetCache,
    queue: WorkQueue,
    offsets: OffsetCache,
    nudges: NudgeQueue,
    last_region: Mutex<HashMap<ObserverId, RegionKey>>,
    transition_until: Mutex<Option<Instant>>,
    remaining: AtomicUsize,
    processed: AtomicU64,
    painted: AtomicU64,
    writes: AtomicU64,
}

impl RepaintCore {
    fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings.read().unwrap())
    }

    fn take_budget(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1))
            .is_ok()
    }

    fn refund_budget(&self) {
        self.remaining.fetch_add(1, Ordering::AcqRel);
    }

    fn painter<'a>(&'a self, settings: &Settings) -> RegionPainter<'a> {
        RegionPainter {
            host: self.host.as_ref(),
            registry: &self.registry,
            backups: &self.backups,
            disk: &self.disk,
            cold: &self.cold,
            targets: &self.targets,
            fallback: settings.table.fallback(),
            step_xz: settings.config.sample.step_xz,
            step_y: settings.config.sample.step_y,
        }
    }

    fn enqueue_around(&self, observer: &Observer, radius: i32, prioritize_view: bool) -> usize {
        if !self.host.is_world_loaded(observer.world) {
            return 0;
        }
        let centre = observer.region();
        let facing = prioritize_view.then_some(observer.facing);
        self.offsets
            .ordered(radius, facing)
            .into_iter()
            .filter(|o| self.queue.enqueue(observer.world, centre.offset(o.dx, o.dz)))
            .count()
    }

    fn enqueue_around_all(&self, radius: i32) -> usize {
        let prioritize = self.settings().config.prioritize_view;
        self.host
            .observers()
            .iter()
            .map(|o| self.enqueue_around(o, radius, prioritize))
            .sum()
    }

    /// One region job. Runs on the executor that owns the region.
    fn process_region(&self, world: WorldId, coord: RegionCoord, state: CalendarState, factor: f64, now: Instant) {
        if !self.enabled.load(Ordering::Acquire) || !self.host.is_region_loaded(world, coord) {
            return;
        }
        if !self.take_budget() {
            self.queue.enqueue(world, coord);
            return;
        }
        let settings = self.settings();
        let painter = self.painter(&settings);

        // The region comes back through `install_loaded` once its read lands.
        let backup = match painter.resume(world, coord) {
            Resume::Ready(backup) => backup,
            Resume::Loading => {
                self.refund_budget();
                return;
            }
        };
        self.processed.fetch_add(1, Ordering::Relaxed);
        let family = self.classifier.classify(
            self.host.as_ref(),
            &self.registry,
            settings.table.rules(),
            backup.as_deref(),
            world,
            coord,
        );
        let target = self.choose_target(&settings.table, family, backup.as_deref(), world, coord, state, factor);
        if self
            .cold
            .should_skip(self.host.as_ref(), &self.registry, world, coord, backup.is_some())
        {
            self.refund_budget();
            return;
        }

        let writes = match target {
            Target::Paint(biome) => painter.apply(world, coord, biome).map(|r| r.writes),
            Target::Original => self.revert(world, coord),
        };
        match writes {
            Some(n) => {
                self.painted.fetch_add(1, Ordering::Relaxed);
                self.writes.fetch_add(n as u64, Ordering::Relaxed);
                let observers = self.host.observers();
                self.nudges
                    .enqueue_viewers(&observers, world, coord, now, &settings.nudge);
            }
            None => self.refund_budget(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn choose_target(
        &self,
        table: &SeasonTargetTable,
        family: Family,
        backup: Option<&RegionSnapshot>,
        world: WorldId,
        coord: RegionCoord,
        state: CalendarState,
        factor: f64,
    ) -> Target {
        let key = RegionKey::new(world, coord);
        let (cur, next) = (state.season, state.next_season());
        match family {
            Family::Land => {
                let chosen = choose_blended(key, table.land(cur), table.land(next), factor);
                chosen.map_or(Target::Original, Target::Paint)
            }
            Family::River => Target::Paint(choose_blended(key, table.river(cur), table.river(next), factor)),
            Family::Ocean => {
                let base = choose_blended(key, table.ocean(cur), table.ocean(next), factor);
                let original = self.classifier.representative_ocean(
                    self.host.as_ref(),
                    &self.registry,
                    backup,
                    world,
                    coord,
                );
                let biome = match original {
                    Some(o) if self.registry.is_ocean(o) => {
                        table.resolve_ocean_variant(&self.registry, base, self.registry.is_deep_ocean(o))
                    }
                    _ => base,
                };
                Target::Paint(biome)
            }
        }
    }

    /// Installs the backups read since the last call and queues their
    /// regions again. Regions without a file are queued too. Returns how many
    /// backups were installed.
    fn install_loaded(&self) -> usize {
        let loaded = self.disk.drain_loaded();
        if loaded.is_empty() {
            return 0;
        }
        let settings = self.settings();
        let painter = self.painter(&settings);
        let mut installed = 0;
        for b in loaded {
            if !self.host.is_region_loaded(b.world, b.coord) {
                continue;
            }
            if let Some(file) = &b.file {
                if painter.adopt(b.world, b.coord, file) {
                    installed += 1;
                }
            }
            self.queue.enqueue(b.world, b.coord);
        }
        installed
    }

    /// Writes the backup back into a repainted region. Returns the sample
    /// count written, or `None` when the region was not modified.
    fn revert(&self, world: WorldId, coord: RegionCoord) -> Option<usize> {
        let key = RegionKey::new(world, coord);
        self.targets.take_modified(key)?;
        self.targets.remove(key);
        let snap = self.backups.get(key)?;
        let writes = snap.apply(self.host.as_ref(), world, coord);
        self.host.refresh_region(world, coord);
        Some(writes)
    }

    /// Drops everything cached for a region whose backup file was consumed.
    fn forget_region(&self, world: WorldId, coord: RegionCoord) {
        let key = RegionKey::new(world, coord);
        self.backups.remove(key);
        self.classifier.forget(key);
        self.targets.remove(key);
        self.targets.take_modified(key);
        self.disk.forget(key);
        self.queue.remove(key);
        self.nudges.remove_region(world, coord);
    }
}

/// Seasonal biome repaint engine.
///
/// Driven by an external tick. Region work runs through a
/// [`RegionExecutor`]; backups are written on a background thread.
pub struct RepaintEngine {
    core: Arc<RepaintCore>,
    executor: Arc<dyn RegionExecutor>,
    restore: Mutex<Option<RestoreJob>>,
    host_ticks: AtomicU64,
}

impl RepaintEngine {
    /// Creates an engine writing disk backups under `config.backup_root`.
    pub fn new(
        host: Arc<dyn WorldHost>,
        calendar: Arc<dyn Calendar>,
        registry: Arc<BiomeRegistry>,
        config: RepaintConfig,
    ) -> Self {
        let disk = DiskBackupStore::open(config.backup_root.clone(), Arc::clone(&registry));
        Self::with_disk(host, calendar, registry, config, disk)
    }

    pub fn with_disk(
        host: Arc<dyn WorldHost>,
        calendar: Arc<dyn Calendar>,
        registry: Arc<BiomeRegistry>,
        config: RepaintConfig,
        disk: DiskBackupStore,
    ) -> Self {
        let settings = Settings::new(&registry, config);
        let enabled = settings.config.enabled;
        log::info!(
            target: "repaint",
            "repaint engine ready (enabled={enabled}, budget={}, backups at {})",
            settings.config.budget_per_tick,
            disk.root().display()
        );
        let core = RepaintCore {
            host,
            calendar,
            registry,
            settings: RwLock::new(Arc::new(settings)),
            enabled: AtomicBool::new(enabled),
            backups: BackupStore::new(),
            disk,
            classifier: FamilyClassifier::new(),
            cold: ColdRegions::new(),
            targets: TargetCache::new(),
            queue: WorkQueue::new(),
            offsets: OffsetCache::new(),
            nudges: NudgeQueue::new(),
            last_region: Mutex::new(HashMap::new()),
            transition_until: Mutex::new(None),
            remaining: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
            painted: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        };
        Self {
            core: Arc::new(core),
            executor: Arc::new(InlineExecutor),
            restore: Mutex::new(None),
            host_ticks: AtomicU64::new(0),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn RegionExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> RepaintConfig {
        self.core.settings().config.clone()
    }

    pub fn registry(&self) -> &Arc<BiomeRegistry> {
        &self.core.registry
    }

    /// Host tick hook. Runs [`Self::tick`] on the first host tick and then
    /// once every `tick_period_ticks` host ticks.
    pub fn on_host_tick(&self, now: Instant) -> Option<TickReport> {
        let n = self.host_ticks.fetch_add(1, Ordering::Relaxed);
        let period = u64::from(self.core.settings().config.tick_period_ticks.max(1));
        (n % period == 0).then(|| self.tick(now))
    }

    pub fn tick(&self, now: Instant) -> TickReport {
        let core = &self.core;
        let mut report = TickReport {
            disk_completed: core.disk.drain_completed(),
            resumed: core.install_loaded(),
            ..TickReport::default()
        };
        report.restored = self.drive_restore();
        if !core.enabled.load(Ordering::Acquire) {
            return report;
        }

        let settings = core.settings();
        let cfg = &settings.config;
        let state = core.calendar.state();
        let factor = blend_factor(
            state.day_in_season(),
            state.season_length,
            cfg.transition.pre_transition_days,
        );
        let in_window = {
            let mut until = core.transition_until.lock().unwrap();
            match *until {
                Some(t) if now < t => true,
                Some(_) => {
                    *until = None;
                    false
                }
                None => false,
            }
        };
        let budget = effective_budget(cfg.budget_per_tick, factor, in_window, cfg.transition.budget_multiplier);
        report.budget = budget;
        report.factor = factor;
        core.remaining.store(budget, Ordering::Release);
        let painted_before = core.painted.load(Ordering::Relaxed);

        let cap = budget.saturating_mul(cfg.dispatch_factor);
        let mut seen: HashSet<RegionKey> = HashSet::new();
        let mut deferred: Vec<PendingRegion> = Vec::new();
        while report.dispatched < cap && core.remaining.load(Ordering::Acquire) > 0 {
            let Some(item) = core.queue.pop() else {
                break;
            };
            if !seen.insert(item.key) {
                deferred.push(item);
                continue;
            }
            if !core.host.is_world_loaded(item.world) || !core.host.is_region_loaded(item.world, item.coord) {
                report.dropped += 1;
                continue;
            }
            report.dispatched += 1;
            let job_core = Arc::clone(core);
            let (world, coord) = (item.world, item.coord);
            self.executor.run_in_region(
                world,
                coord,
                Box::new(move || job_core.process_region(world, coord, state, factor, now)),
            );
        }
        for item in deferred {
            core.queue.enqueue(item.world, item.coord);
        }

        report.painted = (core.painted.load(Ordering::Relaxed) - painted_before) as usize;
        report.nudges = core.nudges.flush(core.host.as_ref(), now, &settings.nudge);
        log::trace!(
            target: "repaint",
            "tick: budget={budget} factor={factor:.2} dispatched={} dropped={} painted={} queued={}",
            report.dispatched,
            report.dropped,
            report.painted,
            core.queue.len()
        );
        report
    }

    fn drive_restore(&self) -> usize {
        let mut slot = self.restore.lock().unwrap();
        let Some(job) = slot.as_mut() else {
            return 0;
        };
        let core = &self.core;
        let fallback = core.settings().table.fallback();
        let mut restored = 0;
        let finished = job.tick(core.host.as_ref(), &core.registry, fallback, |world, coord| {
            restored += 1;
            core.forget_region(world, coord);
        });
        if finished {
            *slot = None;
        }
        restored
    }

    /// Season rolled over. Opens the transition window and queues the
    /// surroundings of every observer.
    pub fn on_season_changed(&self, state: CalendarState, now: Instant) {
        if !self.is_enabled() {
            return;
        }
        let settings = self.core.settings();
        *self.core.transition_until.lock().unwrap() = Some(now + settings.config.transition_window());
        let queued = self.core.enqueue_around_all(settings.config.event_radius_regions);
        log::info!(target: "repaint", "season is now {} (day {}), queued {queued} regions", state.season, state.day_in_season());
    }

    pub fn on_observer_joined(&self, observer: &Observer) -> usize {
        let settings = self.core.settings();
        self.core
            .last_region
            .lock()
            .unwrap()
            .insert(observer.id, RegionKey::new(observer.world, observer.region()));
        self.core
            .enqueue_around(observer, settings.config.event_radius_regions, settings.config.prioritize_view)
    }

    /// Queues work only when the observer entered a region other than the
    /// one last recorded for it.
    pub fn on_observer_moved(&self, observer: &Observer) -> usize {
        let key = RegionKey::new(observer.world, observer.region());
        let last = self.core.last_region.lock().unwrap().insert(observer.id, key);
        if last == Some(key) {
            return 0;
        }
        let settings = self.core.settings();
        self.core
            .enqueue_around(observer, settings.config.event_radius_regions, settings.config.prioritize_view)
    }

    pub fn on_observer_left(&self, observer: ObserverId) {
        self.core.last_region.lock().unwrap().remove(&observer);
    }

    /// A region became resident. Its contents come from the host's storage,
    /// so it is no longer considered modified.
    pub fn on_region_loaded(&self, world: WorldId, coord: RegionCoord) {
        self.core.targets.take_modified(RegionKey::new(world, coord));
        self.core.queue.enqueue(world, coord);
    }

    /// A region is about to be unloaded. Writes its originals back if it was
    /// repainted, then drops every per-region cache except the cold mark.
    pub fn on_region_unloaded(&self, world: WorldId, coord: RegionCoord) {
        let core = &self.core;
        let key = RegionKey::new(world, coord);
        if core.targets.take_modified(key).is_some() {
            core.backups.restore(core.host.as_ref(), world, coord);
        }
        core.backups.remove(key);
        core.classifier.forget(key);
        core.targets.remove(key);
        core.queue.remove(key);
        core.nudges.remove_region(world, coord);
    }

    pub fn enqueue_around(&self, observer: &Observer, radius: i32) -> usize {
        let prioritize = self.core.settings().config.prioritize_view;
        self.core.enqueue_around(observer, radius, prioritize)
    }

    /// Switching on queues `radius_regions` around every observer.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.core.enabled.swap(enabled, Ordering::AcqRel);
        if was == enabled {
            return;
        }
        if enabled {
            let radius = self.core.settings().config.radius_regions;
            let queued = self.core.enqueue_around_all(radius);
            log::info!(target: "repaint", "repaint enabled, queued {queued} regions");
        } else {
            log::info!(target: "repaint", "repaint disabled");
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.core.enabled.load(Ordering::Acquire)
    }

    /// Applies a new configuration. Cached families, originals and targets
    /// are recomputed; pending work is dropped and requeued around observers.
    pub fn reload_config(&self, config: RepaintConfig) {
        let core = &self.core;
        let settings = Settings::new(&core.registry, config);
        if settings.config.backup_root.as_path() != core.disk.root() {
            log::warn!(
                target: "repaint",
                "backup_root change to {} takes effect on restart",
                settings.config.backup_root.display()
            );
        }
        let enabled = settings.config.enabled;
        *core.settings.write().unwrap() = Arc::new(settings);
        core.classifier.clear();
        core.targets.clear();
        core.queue.clear();
        core.last_region.lock().unwrap().clear();
        log::info!(target: "repaint", "repaint configuration reloaded");
        if enabled && self.is_enabled() {
            let radius = core.settings().config.radius_regions;
            core.enqueue_around_all(radius);
        } else {
            self.set_enabled(enabled);
        }
    }

    /// Original biome at a block, from the region's backup.
    pub fn original_biome_approx(&self, world: WorldId, x: i32, y: i32, z: i32) -> Option<BiomeId> {
        let key = RegionKey::new(world, RegionCoord::containing(x, z));
        self.core.backups.get(key)?.sample_at(x, y, z)
    }

    /// Like [`Self::original_biome_approx`], falling back to the live biome.
    pub fn original_biome_approx_or_live(&self, world: WorldId, x: i32, y: i32, z: i32) -> Option<BiomeId> {
        self.original_biome_approx(world, x, y, z)
            .or_else(|| self.core.host.biome_at(world, x, y, z))
    }

    pub fn is_naturally_cold(&self, world: WorldId, coord: RegionCoord) -> bool {
        self.core.cold.contains(RegionKey::new(world, coord))
    }

    /// Starts restoring every backup file under the backup root. Files are
    /// restored a `budget` at a time on subsequent ticks, even while the
    /// engine is disabled. Returns `false` if a restore is already running.
    pub fn start_restore_all(&self, progress: Box<dyn RestoreProgress>, budget: usize) -> bool {
        let mut slot = self.restore.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        self.executor.flush();
        self.core.disk.flush();
        *slot = Some(RestoreJob::start(self.core.disk.root(), budget, progress));
        log::info!(target: "restore", "restore of {} started", self.core.disk.root().display());
        true
    }

    pub fn is_restoring(&self) -> bool {
        self.restore.lock().unwrap().is_some()
    }

    /// Disables the engine, writes every repainted region back to its
    /// originals and clears all state. Returns the number of regions reverted.
    pub fn shutdown(&self) -> usize {
        let core = &self.core;
        core.enabled.store(false, Ordering::Release);
        self.executor.flush();
        core.disk.shutdown();
        let mut reverted = 0;
        for (world, coord) in core.targets.modified() {
            if core.host.is_region_loaded(world, coord) && core.backups.restore(core.host.as_ref(), world, coord) {
                reverted += 1;
            }
        }
        core.targets.clear_modified();
        core.targets.clear();
        core.backups.clear();
        core.classifier.clear();
        core.cold.clear();
        core.queue.clear();
        core.nudges.clear();
        core.last_region.lock().unwrap().clear();
        self.restore.lock().unwrap().take();
        log::info!(target: "repaint", "repaint engine stopped, reverted {reverted} regions");
        reverted
    }

    /// Waits for in-flight region jobs and disk work. Backups read in the
    /// meantime are installed and their regions queued.
    pub fn flush(&self) {
        self.executor.flush();
        self.core.disk.flush();
        self.core.install_loaded();
    }

    pub fn stats(&self) -> EngineStats {
        let core = &self.core;
        EngineStats {
            enabled: self.is_enabled(),
            queued: core.queue.len(),
            loading: core.disk.loading(),
            backups: core.backups.len(),
            modified: core.targets.modified().len(),
            cold: core.cold.len(),
            processed: core.processed.load(Ordering::Relaxed),
            painted: core.painted.load(Ordering::Relaxed),
            writes: core.writes.load(Ordering::Relaxed),
            restoring: self.is_restoring(),
            disk: core.disk.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_boost_only_inside_window() {
        assert_eq!(effective_budget(16, 1.0, false, 3.0), 16);
        assert_eq!(effective_budget(16, 0.0, true, 3.0), 16);
        assert_eq!(effective_budget(16, 1.0, true, 3.0), 48);
        assert_eq!(effective_budget(16, 0.5, true, 3.0), 32);
        assert_eq!(effective_budget(0, 0.0, true, 3.0), 1);
    }
}
