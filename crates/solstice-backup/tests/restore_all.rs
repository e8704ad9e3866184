use std::fs;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use solstice_backup::{
    BackupStore, DiskBackupStore, RegionSnapshot, RestoreJob, RestoreProgress, RestoreReport,
};
use solstice_biomes::{BiomeId, BiomeRegistry};
use solstice_world::{MemoryWorld, RegionCoord, SampleGrid, WorldBounds, WorldHost, WorldId};

const BOUNDS: WorldBounds = WorldBounds {
    min_y: -64,
    max_y: 320,
    sea_level: 63,
};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl RestoreProgress for Recorder {
    fn started(&mut self, total: usize) {
        self.0.lock().unwrap().push(format!("start {total}"));
    }

    fn finished(&mut self, report: RestoreReport) {
        self.0
            .lock()
            .unwrap()
            .push(format!("done {} {}", report.restored, report.failed));
    }
}

fn grid() -> SampleGrid {
    SampleGrid::new(4, 4, BOUNDS.min_y, BOUNDS.max_y)
}

fn run_to_end(job: &mut RestoreJob, mw: &MemoryWorld, reg: &BiomeRegistry) -> Vec<RegionCoord> {
    let mut restored = Vec::new();
    for _ in 0..10_000 {
        if job.tick(mw, reg, BiomeId(0), |_, c| restored.push(c)) {
            return restored;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("restore job did not finish");
}

#[test]
fn saved_backups_restore_and_are_consumed() {
    let dir = tempfile::tempdir().unwrap();
    let reg = Arc::new(BiomeRegistry::vanilla());
    let forest = reg.id_by_name("FOREST").unwrap();
    let snowy = reg.id_by_name("SNOWY_PLAINS").unwrap();
    let w = WorldId::from_u128(0xabc);
    let mw = MemoryWorld::new();
    mw.add_uniform_world(w, BOUNDS, forest);

    let disk = DiskBackupStore::open(dir.path(), Arc::clone(&reg));
    let coords = [RegionCoord::new(0, 0), RegionCoord::new(-3, 9), RegionCoord::new(4, -1)];
    for c in coords {
        mw.ensure_loaded(w, c);
        let snap = RegionSnapshot::capture(&mw, w, c, grid()).unwrap();
        assert!(disk.save_first_touch(w, c, Arc::new(snap)));
        mw.paint_region(w, c, snowy);
    }
    disk.shutdown();

    let log = Recorder::default();
    let mut job = RestoreJob::start(dir.path(), 2, Box::new(log.clone()));
    let mut restored = run_to_end(&mut job, &mw, &reg);
    restored.sort_by_key(|c| (c.rx, c.rz));

    assert_eq!(job.report(), RestoreReport { restored: 3, failed: 0 });
    assert_eq!(restored.len(), 3);
    for c in coords {
        assert_eq!(mw.count_cells(w, c, forest), grid().len());
        assert!(!disk.region_path(w, c).exists());
    }
    assert_eq!(*log.0.lock().unwrap(), vec!["start 3".to_string(), "done 3 0".to_string()]);
}

#[test]
fn corrupt_and_orphaned_files_fail_without_stopping_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let reg = Arc::new(BiomeRegistry::vanilla());
    let plains = reg.id_by_name("PLAINS").unwrap();
    let w = WorldId::from_u128(1);
    let ghost = WorldId::from_u128(2);
    let mw = MemoryWorld::new();
    mw.add_uniform_world(w, BOUNDS, plains);

    let disk = DiskBackupStore::open(dir.path(), Arc::clone(&reg));
    let good = RegionCoord::new(1, 1);
    mw.ensure_loaded(w, good);
    let snap = RegionSnapshot::capture(&mw, w, good, grid()).unwrap();
    disk.save_first_touch(w, good, Arc::new(snap));
    disk.shutdown();

    let corrupt = disk.region_path(w, RegionCoord::new(2, 2));
    fs::write(&corrupt, [0u8, 1, 2, 3, 4, 5]).unwrap();
    let orphan = disk.region_path(ghost, RegionCoord::new(0, 0));
    fs::create_dir_all(orphan.parent().unwrap()).unwrap();
    fs::copy(disk.region_path(w, good), &orphan).unwrap();

    let mut job = RestoreJob::start(dir.path(), 1, Box::new(Recorder::default()));
    run_to_end(&mut job, &mw, &reg);

    assert_eq!(job.report(), RestoreReport { restored: 1, failed: 2 });
    assert!(!disk.region_path(w, good).exists());
    assert!(corrupt.exists());
    assert!(orphan.exists());
}

#[test]
fn concurrent_first_touch_stores_and_saves_once() {
    let dir = tempfile::tempdir().unwrap();
    let reg = Arc::new(BiomeRegistry::vanilla());
    let memory = Arc::new(BackupStore::new());
    let disk = Arc::new(DiskBackupStore::open(dir.path(), Arc::clone(&reg)));
    let w = WorldId::from_u128(77);
    let c = RegionCoord::new(5, 5);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let memory = Arc::clone(&memory);
            let disk = Arc::clone(&disk);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let g = grid();
                let snap = RegionSnapshot::new(g, vec![BiomeId(i as u16); g.len()]);
                barrier.wait();
                match memory.capture_if_absent(w, c, snap) {
                    Some(stored) => disk.save_first_touch(w, c, stored),
                    None => false,
                }
            })
        })
        .collect();
    let saves = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|queued| *queued)
        .count();

    disk.flush();
    assert_eq!(saves, 1);
    assert_eq!(memory.len(), 1);
    assert_eq!(disk.stats().queued, 1);
    assert_eq!(disk.stats().written, 1);
    assert!(disk.exists(w, c));
    assert!(disk_copy_matches_memory(&disk, &reg, &memory, w, c));
    disk.shutdown();
}

fn disk_copy_matches_memory(
    disk: &DiskBackupStore,
    reg: &BiomeRegistry,
    memory: &BackupStore,
    w: WorldId,
    c: RegionCoord,
) -> bool {
    let on_disk = disk.load(w, c).unwrap().unwrap();
    let in_memory = memory.get(solstice_world::RegionKey::new(w, c)).unwrap();
    on_disk.to_snapshot(reg, BiomeId(0)).unwrap() == *in_memory
}

#[test]
fn restore_into_shorter_world_skips_missing_heights() {
    let dir = tempfile::tempdir().unwrap();
    let reg = Arc::new(BiomeRegistry::vanilla());
    let desert = reg.id_by_name("DESERT").unwrap();
    let w = WorldId::from_u128(9);
    let tall = MemoryWorld::new();
    tall.add_uniform_world(w, BOUNDS, desert);
    let c = RegionCoord::new(0, 0);
    tall.ensure_loaded(w, c);
    let disk = DiskBackupStore::open(dir.path(), Arc::clone(&reg));
    disk.save_first_touch(w, c, Arc::new(RegionSnapshot::capture(&tall, w, c, grid()).unwrap()));
    disk.shutdown();

    let short = MemoryWorld::new();
    short.add_uniform_world(
        w,
        WorldBounds {
            min_y: 0,
            max_y: 64,
            sea_level: 32,
        },
        BiomeId(0),
    );
    let (_, _, writes) =
        solstice_backup::restore_file(&disk.region_path(w, c), &short, &reg, BiomeId(0)).unwrap();
    assert_eq!(writes, 4 * 4 * 16);
    assert!(short.is_region_loaded(w, c));
    assert_eq!(short.count_cells(w, c, desert), 4 * 4 * 16);
}
