use std::sync::Arc;

use solstice_backup::{BackupFile, BackupStore, DiskBackupStore, DiskLookup, RegionSnapshot};
use solstice_biomes::{BiomeId, BiomeRegistry};
use solstice_world::{RegionCoord, RegionKey, SampleGrid, WorldHost, WorldId};

use crate::cold::ColdRegions;
use crate::target_cache::TargetCache;

#[derive(Clone, Debug)]
pub struct PaintReport {
    pub writes: usize,
    /// Set on the first repaint of a region, when the originals were captured.
    pub captured: Option<Arc<RegionSnapshot>>,
}

/// Where a region's originals stand before it is painted.
#[derive(Clone, Debug)]
pub enum Resume {
    /// The in-memory backup, or `None` when the region has none anywhere.
    Ready(Option<Arc<RegionSnapshot>>),
    /// The disk store is reading the region's file.
    Loading,
}

/// Writes a target biome across a region's sample grid, capturing the
/// originals on first touch.
pub struct RegionPainter<'a> {
    pub host: &'a dyn WorldHost,
    pub registry: &'a BiomeRegistry,
    pub backups: &'a BackupStore,
    pub disk: &'a DiskBackupStore,
    pub cold: &'a ColdRegions,
    pub targets: &'a TargetCache,
    /// Substitute for palette names the registry no longer knows.
    pub fallback: BiomeId,
    pub step_xz: u8,
    pub step_y: u8,
}

impl<'a> RegionPainter<'a> {
    /// The region's backup as far as this session knows it.
    ///
    /// Without an in-memory backup the disk store is asked to read the
    /// region's file in the background. Until it answers the region is
    /// `Loading`; regions known to have no file are `Ready(None)` at once.
    pub fn resume(&self, world: WorldId, coord: RegionCoord) -> Resume {
        if let Some(snap) = self.backups.get(RegionKey::new(world, coord)) {
            return Resume::Ready(Some(snap));
        }
        match self.disk.request_load(world, coord) {
            DiskLookup::Absent => Resume::Ready(None),
            DiskLookup::Pending => Resume::Loading,
        }
    }

    /// Installs a backup read back from disk.
    ///
    /// A file on disk means the region was repainted in an earlier session,
    /// so its live biomes cannot be trusted as originals. The region is
    /// marked modified so that shutdown writes the originals back. A file
    /// that does not fit its own grid is logged and the region is treated as
    /// having no file.
    pub fn adopt(&self, world: WorldId, coord: RegionCoord, file: &BackupFile) -> bool {
        let key = RegionKey::new(world, coord);
        let snap = match file.to_snapshot(self.registry, self.fallback) {
            Ok(snap) => snap,
            Err(e) => {
                log::warn!(target: "backup", "ignoring backup for {world}/{coord}: {e}");
                self.disk.mark_unusable(key);
                return false;
            }
        };
        if snap.any(|b| self.registry.is_cold(b)) {
            self.cold.mark(key);
        }
        // A live capture may have won in the meantime; the stored one stays.
        self.backups.capture_if_absent(world, coord, snap);
        self.targets.mark_modified(world, coord);
        log::debug!(target: "backup", "resumed backup for {world}/{coord} from disk");
        true
    }

    /// Repaints the region with `target`.
    ///
    /// Returns `None` without touching the world when `target` is already
    /// the region's last applied target, and `None` after reading when every
    /// sample already equals `target`. Nothing is captured in either case.
    pub fn apply(&self, world: WorldId, coord: RegionCoord, target: BiomeId) -> Option<PaintReport> {
        let key = RegionKey::new(world, coord);
        if self.targets.get(key) == Some(target) {
            return None;
        }
        let bounds = self.host.bounds(world)?;
        let grid = SampleGrid::new(self.step_xz, self.step_y, bounds.min_y, bounds.max_y);
        let live = RegionSnapshot::capture(self.host, world, coord, grid)?;

        let (bx, bz) = coord.origin();
        let mut writes = 0;
        for (p, &current) in grid.points().zip(live.samples()) {
            if current != target {
                self.host.set_biome(world, bx + p.lx, p.y, bz + p.lz, target);
                writes += 1;
            }
        }
        if writes == 0 {
            self.targets.set(key, target);
            return None;
        }

        let captured = if self.backups.contains(key) {
            None
        } else {
            if live.any(|b| self.registry.is_cold(b)) {
                self.cold.mark(key);
            }
            let stored = self.backups.capture_if_absent(world, coord, live);
            if let Some(snap) = &stored {
                self.disk.save_first_touch(world, coord, Arc::clone(snap));
            }
            stored
        };

        self.host.refresh_region(world, coord);
        self.targets.set(key, target);
        self.targets.mark_modified(world, coord);
        log::trace!(
            target: "repaint",
            "{world}/{coord} -> {} ({writes} writes{})",
            self.registry.name_or_unknown(target),
            if captured.is_some() { ", captured" } else { "" }
        );
        Some(PaintReport { writes, captured })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solstice_world::{MemoryWorld, WorldBounds};

    const BOUNDS: WorldBounds = WorldBounds {
        min_y: 0,
        max_y: 64,
        sea_level: 32,
    };

    struct Fixture {
        mw: MemoryWorld,
        reg: BiomeRegistry,
        backups: BackupStore,
        disk: DiskBackupStore,
        cold: ColdRegions,
        targets: TargetCache,
        world: WorldId,
    }

    impl Fixture {
        fn new(fill: &str) -> Self {
            let reg = BiomeRegistry::vanilla();
            let mw = MemoryWorld::new();
            let world = WorldId::from_u128(11);
            mw.add_uniform_world(world, BOUNDS, reg.id_by_name(fill).unwrap());
            Self {
                mw,
                reg,
                backups: BackupStore::new(),
                disk: DiskBackupStore::disabled("unused"),
                cold: ColdRegions::new(),
                targets: TargetCache::new(),
                world,
            }
        }

        fn painter(&self) -> RegionPainter<'_> {
            RegionPainter {
                host: &self.mw,
                registry: &self.reg,
                backups: &self.backups,
                disk: &self.disk,
                cold: &self.cold,
                targets: &self.targets,
                fallback: BiomeId(0),
                step_xz: 4,
                step_y: 4,
            }
        }

        fn id(&self, name: &str) -> BiomeId {
            self.reg.id_by_name(name).unwrap()
        }
    }

    #[test]
    fn first_paint_captures_then_repaints_without_capture() {
        let f = Fixture::new("FOREST");
        let c = RegionCoord::new(1, 2);
        f.mw.ensure_loaded(f.world, c);
        let p = f.painter();

        let first = p.apply(f.world, c, f.id("PLAINS")).unwrap();
        assert_eq!(first.writes, 4 * 4 * 16);
        let snap = first.captured.unwrap();
        assert!(snap.samples().iter().all(|b| *b == f.id("FOREST")));
        assert!(f.targets.is_modified(RegionKey::new(f.world, c)));

        let second = p.apply(f.world, c, f.id("SNOWY_PLAINS")).unwrap();
        assert!(second.captured.is_none());
        // The original capture is kept.
        let kept = f.backups.get(RegionKey::new(f.world, c)).unwrap();
        assert!(Arc::ptr_eq(&kept, &snap));
    }

    #[test]
    fn same_target_is_a_no_op() {
        let f = Fixture::new("FOREST");
        let c = RegionCoord::new(0, 0);
        f.mw.ensure_loaded(f.world, c);
        let p = f.painter();
        p.apply(f.world, c, f.id("PLAINS")).unwrap();
        let writes = f.mw.writes();
        let refreshes = f.mw.refreshes();
        assert!(p.apply(f.world, c, f.id("PLAINS")).is_none());
        assert_eq!(f.mw.writes(), writes);
        assert_eq!(f.mw.refreshes(), refreshes);
    }

    #[test]
    fn already_at_target_captures_nothing() {
        let f = Fixture::new("PLAINS");
        let c = RegionCoord::new(0, 0);
        f.mw.ensure_loaded(f.world, c);
        assert!(f.painter().apply(f.world, c, f.id("PLAINS")).is_none());
        assert!(f.backups.is_empty());
        assert_eq!(f.targets.get(RegionKey::new(f.world, c)), Some(f.id("PLAINS")));
        assert_eq!(f.mw.refreshes(), 0);
    }

    #[test]
    fn cold_originals_are_registered_at_capture() {
        let f = Fixture::new("SNOWY_TAIGA");
        let c = RegionCoord::new(0, 0);
        f.mw.ensure_loaded(f.world, c);
        f.painter().apply(f.world, c, f.id("PLAINS")).unwrap();
        assert!(f.cold.contains(RegionKey::new(f.world, c)));
    }

    #[test]
    fn resume_reads_disk_backup_in_the_background() {
        let dir = tempfile::tempdir().unwrap();
        let reg = Arc::new(BiomeRegistry::vanilla());
        let mut f = Fixture::new("DESERT");
        f.disk = DiskBackupStore::open(dir.path(), Arc::clone(&reg));
        let (c, fresh) = (RegionCoord::new(3, 3), RegionCoord::new(4, 3));
        f.mw.ensure_loaded(f.world, c);
        let grid = SampleGrid::new(4, 4, BOUNDS.min_y, BOUNDS.max_y);
        let original = RegionSnapshot::new(grid, vec![f.id("BIRCH_FOREST"); grid.len()]);
        f.disk.save_first_touch(f.world, c, Arc::new(original.clone()));
        f.disk.flush();

        let p = f.painter();
        assert!(matches!(p.resume(f.world, c), Resume::Loading));
        assert!(matches!(p.resume(f.world, fresh), Resume::Loading));
        f.disk.flush();
        let loaded = f.disk.drain_loaded();
        assert_eq!(loaded.len(), 2);
        for b in &loaded {
            match &b.file {
                Some(file) => assert!(p.adopt(b.world, b.coord, file)),
                None => assert_eq!(b.coord, fresh),
            }
        }
        assert!(matches!(p.resume(f.world, fresh), Resume::Ready(None)));
        let Resume::Ready(Some(resumed)) = p.resume(f.world, c) else {
            panic!("backup not installed");
        };
        assert_eq!(*resumed, original);
        assert!(f.targets.is_modified(RegionKey::new(f.world, c)));
        // Painting now keeps the disk originals rather than the live desert.
        let report = p.apply(f.world, c, f.id("PLAINS")).unwrap();
        assert!(report.captured.is_none());
        f.disk.shutdown();
    }

    #[test]
    fn misfit_file_is_rejected_and_forgotten() {
        let f = Fixture::new("DESERT");
        let c = RegionCoord::new(0, 0);
        let file = BackupFile {
            grid: SampleGrid::new(4, 4, BOUNDS.min_y, BOUNDS.max_y),
            palette: vec!["PLAINS".into()],
            indices: vec![0; 3],
        };
        assert!(!f.painter().adopt(f.world, c, &file));
        assert!(f.backups.is_empty());
        assert!(!f.targets.is_modified(RegionKey::new(f.world, c)));
    }
}
