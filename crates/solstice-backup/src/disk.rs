use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use hashbrown::HashSet;
use solstice_biomes::BiomeRegistry;
use solstice_world::{RegionCoord, RegionKey, WorldId};

use crate::codec::BackupFile;
use crate::error::BackupError;
use crate::snapshot::RegionSnapshot;

/// `<rx>_<rz>.bin`
pub fn region_file_name(coord: RegionCoord) -> String {
    format!("{}_{}.bin", coord.rx, coord.rz)
}

/// Recovers the world and region from `<root>/<world-uuid>/<rx>_<rz>.bin`.
pub fn parse_region_path(path: &Path) -> Option<(WorldId, RegionCoord)> {
    let world = WorldId::parse(path.parent()?.file_name()?.to_str()?)?;
    let stem = path.file_name()?.to_str()?.strip_suffix(".bin")?;
    let (x, z) = stem.split_once('_')?;
    Some((world, RegionCoord::new(x.parse().ok()?, z.parse().ok()?)))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub queued: u64,
    pub written: u64,
    pub failed: u64,
    /// Backups read back from disk.
    pub loaded: u64,
    /// Files that existed but could not be read or decoded.
    pub unreadable: u64,
}

/// Answer to [`DiskBackupStore::request_load`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskLookup {
    /// No usable file exists for the region.
    Absent,
    /// A read is queued; the result arrives through
    /// [`DiskBackupStore::drain_loaded`].
    Pending,
}

/// The answer to a read queued by [`DiskBackupStore::request_load`].
#[derive(Debug)]
pub struct LoadedBackup {
    pub world: WorldId,
    pub coord: RegionCoord,
    /// `None` when the region has no file or the file could not be decoded.
    pub file: Option<BackupFile>,
}

#[derive(Default)]
struct SaveState {
    /// A file is known to exist.
    saved: HashSet<RegionKey>,
    pending: HashSet<RegionKey>,
    /// Known to have no usable file.
    absent: HashSet<RegionKey>,
    /// A file exists but cannot be used; the next save replaces it.
    damaged: HashSet<RegionKey>,
    loading: HashSet<RegionKey>,
}

struct SaveJob {
    key: RegionKey,
    path: PathBuf,
    snapshot: Arc<RegionSnapshot>,
    replace: bool,
}

struct LoadJob {
    key: RegionKey,
    world: WorldId,
    coord: RegionCoord,
    path: PathBuf,
}

enum WriterMsg {
    Save(SaveJob),
    Load(LoadJob),
    Flush(Sender<()>),
}

enum Outcome {
    Saved {
        key: RegionKey,
        result: Result<(), BackupError>,
    },
    Loaded {
        job: LoadJob,
        result: Result<BackupFile, BackupError>,
    },
}

/// Persists first-touch snapshots under `<root>/<world>/<rx>_<rz>.bin`.
///
/// Saves and reads are handed to a single writer thread and never block the
/// caller. Save completions come back over a channel and are folded in by
/// [`DiskBackupStore::drain_completed`]; decoded reads are picked up by
/// [`DiskBackupStore::drain_loaded`]. Both normally run once per engine tick.
pub struct DiskBackupStore {
    root: PathBuf,
    enabled: bool,
    state: Mutex<SaveState>,
    jobs: Mutex<Option<Sender<WriterMsg>>>,
    done_rx: Receiver<Outcome>,
    loaded: Mutex<Vec<LoadedBackup>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    queued: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
    reads: AtomicU64,
    unreadable: AtomicU64,
}

impl DiskBackupStore {
    /// Creates the root directory and starts the writer. If the directory
    /// cannot be created the store stays usable but never writes.
    pub fn open(root: impl Into<PathBuf>, registry: Arc<BiomeRegistry>) -> Self {
        let root = root.into();
        if let Err(e) = fs::create_dir_all(&root) {
            log::warn!(
                target: "backup",
                "cannot create backup root {}: {e}; disk backups disabled",
                root.display()
            );
            return Self::disabled(root);
        }
        let (job_tx, job_rx) = unbounded::<WriterMsg>();
        let (done_tx, done_rx) = unbounded::<Outcome>();
        let spawned = thread::Builder::new()
            .name("solstice-backup-writer".into())
            .spawn(move || writer_loop(job_rx, done_tx, registry));
        match spawned {
            Ok(handle) => {
                log::info!(target: "backup", "disk backups under {}", root.display());
                Self {
                    root,
                    enabled: true,
                    state: Mutex::new(SaveState::default()),
                    jobs: Mutex::new(Some(job_tx)),
                    done_rx,
                    loaded: Mutex::new(Vec::new()),
                    writer: Mutex::new(Some(handle)),
                    queued: AtomicU64::new(0),
                    written: AtomicU64::new(0),
                    failed: AtomicU64::new(0),
                    reads: AtomicU64::new(0),
                    unreadable: AtomicU64::new(0),
                }
            }
            Err(e) => {
                log::warn!(target: "backup", "cannot start backup writer: {e}; disk backups disabled");
                Self::disabled(root)
            }
        }
    }

    /// A store that keeps nothing on disk.
    pub fn disabled(root: impl Into<PathBuf>) -> Self {
        let (_, done_rx) = unbounded();
        Self {
            root: root.into(),
            enabled: false,
            state: Mutex::new(SaveState::default()),
            jobs: Mutex::new(None),
            done_rx,
            loaded: Mutex::new(Vec::new()),
            writer: Mutex::new(None),
            queued: AtomicU64::new(0),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            unreadable: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn world_dir(&self, world: WorldId) -> PathBuf {
        self.root.join(world.to_string())
    }

    pub fn region_path(&self, world: WorldId, coord: RegionCoord) -> PathBuf {
        self.world_dir(world).join(region_file_name(coord))
    }

    /// Checks the filesystem on the caller's thread.
    pub fn exists(&self, world: WorldId, coord: RegionCoord) -> bool {
        self.enabled && self.region_path(world, coord).is_file()
    }

    /// Queues `snapshot` for writing unless this region was already saved or
    /// is being saved. Returns whether a write was queued. The writer only
    /// replaces a file that was found to be unusable; finding any other
    /// existing file marks the region saved.
    pub fn save_first_touch(
        &self,
        world: WorldId,
        coord: RegionCoord,
        snapshot: Arc<RegionSnapshot>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let key = RegionKey::new(world, coord);
        let path = self.region_path(world, coord);
        let replace = {
            let mut st = self.state.lock().unwrap();
            if st.saved.contains(&key) || st.pending.contains(&key) {
                return false;
            }
            st.pending.insert(key);
            st.damaged.remove(&key)
        };
        let job = SaveJob {
            key,
            path,
            snapshot,
            replace,
        };
        let sent = self
            .jobs
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(WriterMsg::Save(job)).is_ok());
        if !sent {
            self.state.lock().unwrap().pending.remove(&key);
            return false;
        }
        self.queued.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Asks the writer thread to read the region's backup.
    ///
    /// Regions already known to have no usable file answer `Absent` without
    /// touching the disk, so repeated visits cost nothing.
    pub fn request_load(&self, world: WorldId, coord: RegionCoord) -> DiskLookup {
        if !self.enabled {
            return DiskLookup::Absent;
        }
        let key = RegionKey::new(world, coord);
        {
            let mut st = self.state.lock().unwrap();
            if st.absent.contains(&key) {
                return DiskLookup::Absent;
            }
            if st.loading.contains(&key) {
                return DiskLookup::Pending;
            }
            st.loading.insert(key);
        }
        let job = LoadJob {
            key,
            world,
            coord,
            path: self.region_path(world, coord),
        };
        let sent = self
            .jobs
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(WriterMsg::Load(job)).is_ok());
        if !sent {
            let mut st = self.state.lock().unwrap();
            st.loading.remove(&key);
            st.absent.insert(key);
            return DiskLookup::Absent;
        }
        DiskLookup::Pending
    }

    /// Records that a region's file decoded but does not fit its own grid.
    /// The region reads as absent and its next save replaces the file.
    pub fn mark_unusable(&self, key: RegionKey) {
        let mut st = self.state.lock().unwrap();
        st.saved.remove(&key);
        st.absent.insert(key);
        st.damaged.insert(key);
    }

    /// Regions whose read is still queued or whose result has not been
    /// drained yet.
    pub fn loading(&self) -> usize {
        self.state.lock().unwrap().loading.len()
    }

    /// Folds finished writes and reads into the store's bookkeeping. Returns
    /// how many saves completed; decoded reads wait for
    /// [`Self::drain_loaded`].
    pub fn drain_completed(&self) -> usize {
        let mut n = 0;
        for outcome in self.done_rx.try_iter() {
            match outcome {
                Outcome::Saved { key, result } => {
                    n += 1;
                    let mut st = self.state.lock().unwrap();
                    st.pending.remove(&key);
                    match result {
                        Ok(()) => {
                            st.saved.insert(key);
                            st.absent.remove(&key);
                            self.written.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(BackupError::AlreadyExists(_)) => {
                            st.saved.insert(key);
                        }
                        Err(e) => {
                            self.failed.fetch_add(1, Ordering::Relaxed);
                            log::warn!(target: "backup", "backup save failed: {e}");
                        }
                    }
                }
                Outcome::Loaded { job, result } => self.fold_load(job, result),
            }
        }
        n
    }

    fn fold_load(&self, job: LoadJob, result: Result<BackupFile, BackupError>) {
        let file = match result {
            Ok(file) => {
                self.reads.fetch_add(1, Ordering::Relaxed);
                self.state.lock().unwrap().saved.insert(job.key);
                Some(file)
            }
            Err(e) => {
                let mut st = self.state.lock().unwrap();
                st.absent.insert(job.key);
                if !is_not_found(&e) {
                    st.damaged.insert(job.key);
                    self.unreadable.fetch_add(1, Ordering::Relaxed);
                    log::warn!(target: "backup", "ignoring backup for {}/{}: {e}", job.world, job.coord);
                }
                None
            }
        };
        self.loaded.lock().unwrap().push(LoadedBackup {
            world: job.world,
            coord: job.coord,
            file,
        });
    }

    /// Takes every read answer that [`Self::drain_completed`] has folded in
    /// so far. A region stops counting as loading once its answer has been
    /// taken.
    pub fn drain_loaded(&self) -> Vec<LoadedBackup> {
        let taken = std::mem::take(&mut *self.loaded.lock().unwrap());
        if !taken.is_empty() {
            let mut st = self.state.lock().unwrap();
            for b in &taken {
                st.loading.remove(&RegionKey::new(b.world, b.coord));
            }
        }
        taken
    }

    /// Blocks until every save and read queued so far has finished, then
    /// folds them in.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = bounded::<()>(1);
        let sent = self
            .jobs
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(WriterMsg::Flush(ack_tx)).is_ok());
        if sent {
            let _ = ack_rx.recv();
        }
        self.drain_completed();
    }

    /// Flushes outstanding saves and stops the writer thread.
    pub fn shutdown(&self) {
        self.flush();
        self.jobs.lock().unwrap().take();
        if let Some(handle) = self.writer.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    pub fn is_saved(&self, key: RegionKey) -> bool {
        self.state.lock().unwrap().saved.contains(&key)
    }

    /// Forgets a region whose file was consumed, so a later first touch saves
    /// it again.
    pub fn forget(&self, key: RegionKey) {
        let mut st = self.state.lock().unwrap();
        st.saved.remove(&key);
        st.absent.insert(key);
    }

    /// Reads the persisted backup for a region on the caller's thread.
    pub fn load(&self, world: WorldId, coord: RegionCoord) -> Result<Option<BackupFile>, BackupError> {
        if !self.enabled {
            return Ok(None);
        }
        match read_backup(&self.region_path(world, coord)) {
            Ok(file) => Ok(Some(file)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn stats(&self) -> DiskStats {
        DiskStats {
            queued: self.queued.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            loaded: self.reads.load(Ordering::Relaxed),
            unreadable: self.unreadable.load(Ordering::Relaxed),
        }
    }
}

/// Reads and decodes one backup file.
pub(crate) fn read_backup(path: &Path) -> Result<BackupFile, BackupError> {
    let bytes = fs::read(path).map_err(|e| BackupError::io(path, e))?;
    BackupFile::decode(&bytes).map_err(|e| BackupError::format(path, e))
}

fn is_not_found(e: &BackupError) -> bool {
    matches!(e, BackupError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
}

fn writer_loop(rx: Receiver<WriterMsg>, done_tx: Sender<Outcome>, registry: Arc<BiomeRegistry>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            WriterMsg::Save(job) => {
                let result = write_backup(&job.path, &registry, &job.snapshot, job.replace);
                if let Err(e) = &result {
                    log::debug!(target: "backup", "write {} failed: {e}", job.path.display());
                }
                let _ = done_tx.send(Outcome::Saved {
                    key: job.key,
                    result,
                });
            }
            WriterMsg::Load(job) => {
                let result = read_backup(&job.path);
                let _ = done_tx.send(Outcome::Loaded { job, result });
            }
            WriterMsg::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// Encodes and writes a snapshot. An existing file is only overwritten when
/// `replace` is set.
fn write_backup(
    path: &Path,
    registry: &BiomeRegistry,
    snapshot: &RegionSnapshot,
    replace: bool,
) -> Result<(), BackupError> {
    let bytes = BackupFile::from_snapshot(registry, snapshot)
        .and_then(|f| f.encode())
        .map_err(|e| BackupError::format(path, e))?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| BackupError::io(dir, e))?;
    }
    let mut options = OpenOptions::new();
    if replace {
        options.write(true).create(true).truncate(true);
    } else {
        options.write(true).create_new(true);
    }
    let mut file = match options.open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(BackupError::AlreadyExists(path.to_path_buf()));
        }
        Err(e) => return Err(BackupError::io(path, e)),
    };
    file.write_all(&bytes)
        .and_then(|_| file.flush())
        .map_err(|e| BackupError::io(path, e))
}
