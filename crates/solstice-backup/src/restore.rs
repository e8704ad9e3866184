use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use solstice_biomes::{BiomeId, BiomeRegistry};
use solstice_world::{RegionCoord, WorldHost, WorldId};

use crate::codec::BackupFile;
use crate::disk::{parse_region_path, read_backup};
use crate::error::BackupError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub failed: usize,
}

/// Receives progress from a [`RestoreJob`].
pub trait RestoreProgress: Send {
    fn started(&mut self, _total: usize) {}
    fn finished(&mut self, report: RestoreReport);
}

/// Reports progress through the `log` facade.
pub struct LogProgress;

impl RestoreProgress for LogProgress {
    fn started(&mut self, total: usize) {
        if total == 0 {
            log::info!(target: "restore", "no backups to restore");
        } else {
            log::info!(target: "restore", "restoring {total} regions");
        }
    }

    fn finished(&mut self, report: RestoreReport) {
        log::info!(
            target: "restore",
            "restore finished: ok={} failed={}",
            report.restored,
            report.failed
        );
    }
}

/// Reads one backup file and writes it into the live world on the caller's
/// thread. Returns the restored region and the number of samples written.
/// The file is left in place.
pub fn restore_file(
    path: &Path,
    host: &dyn WorldHost,
    reg: &BiomeRegistry,
    fallback: BiomeId,
) -> Result<(WorldId, RegionCoord, usize), BackupError> {
    let (world, coord, file) = read_region_file(path)?;
    let writes = apply_backup(&file, host, reg, fallback, world, coord)?;
    Ok((world, coord, writes))
}

/// Decodes a backup file together with the region its path names.
fn read_region_file(path: &Path) -> Result<(WorldId, RegionCoord, BackupFile), BackupError> {
    let (world, coord) =
        parse_region_path(path).ok_or_else(|| BackupError::BadPath(path.to_path_buf()))?;
    let file = read_backup(path)?;
    Ok((world, coord, file))
}

/// Writes a decoded backup into a loaded world, loading the region on
/// demand.
fn apply_backup(
    file: &BackupFile,
    host: &dyn WorldHost,
    reg: &BiomeRegistry,
    fallback: BiomeId,
    world: WorldId,
    coord: RegionCoord,
) -> Result<usize, BackupError> {
    if !host.is_world_loaded(world) {
        return Err(BackupError::WorldNotLoaded(world));
    }
    host.load_region(world, coord);
    let writes = file.apply(reg, fallback, host, world, coord);
    host.refresh_region(world, coord);
    Ok(writes)
}

/// A backup file read by the scan thread.
struct ScannedFile {
    path: PathBuf,
    result: Result<(WorldId, RegionCoord, BackupFile), BackupError>,
}

enum ScanMsg {
    Found(usize),
    File(ScannedFile),
}

struct Deleted {
    path: PathBuf,
    result: std::io::Result<()>,
}

/// Bulk restore of every backup under a root directory.
///
/// A background thread enumerates the root, reads and decodes each file and
/// hands it over a bounded channel. [`RestoreJob::tick`] applies at most
/// `budget` of them per call on the caller's thread and sends every restored
/// path back for deletion; the job finishes once all deletions are
/// acknowledged. Failures are counted and the file is kept.
pub struct RestoreJob {
    scan_rx: Receiver<ScanMsg>,
    delete_tx: Option<Sender<PathBuf>>,
    deleted_rx: Receiver<Deleted>,
    budget: usize,
    total: Option<usize>,
    received: usize,
    pending_deletes: usize,
    scan_done: bool,
    report: RestoreReport,
    progress: Box<dyn RestoreProgress>,
    finished: bool,
}

impl RestoreJob {
    pub fn start(root: impl Into<PathBuf>, budget: usize, progress: Box<dyn RestoreProgress>) -> Self {
        let root = root.into();
        let budget = budget.max(1);
        let (scan_tx, scan_rx) = bounded::<ScanMsg>(budget * 2);
        let (delete_tx, delete_rx) = unbounded::<PathBuf>();
        let (deleted_tx, deleted_rx) = unbounded::<Deleted>();
        let spawned = thread::Builder::new()
            .name("solstice-restore-scan".into())
            .spawn(move || reader_loop(&root, scan_tx, delete_rx, deleted_tx));
        if let Err(e) = spawned {
            log::warn!(target: "restore", "cannot start backup scan: {e}");
        }
        Self {
            scan_rx,
            delete_tx: Some(delete_tx),
            deleted_rx,
            budget,
            total: None,
            received: 0,
            pending_deletes: 0,
            scan_done: false,
            report: RestoreReport::default(),
            progress,
            finished: false,
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn report(&self) -> RestoreReport {
        self.report
    }

    /// Files still waiting, or `None` while the scan is running.
    pub fn remaining(&self) -> Option<usize> {
        self.total.map(|t| t.saturating_sub(self.received))
    }

    /// Advances the job by one step without blocking. `on_restored` runs for
    /// every region restored this call. Returns `true` once the job has
    /// finished.
    pub fn tick(
        &mut self,
        host: &dyn WorldHost,
        reg: &BiomeRegistry,
        fallback: BiomeId,
        mut on_restored: impl FnMut(WorldId, RegionCoord),
    ) -> bool {
        if self.finished {
            return true;
        }
        for deleted in self.deleted_rx.try_iter() {
            self.pending_deletes = self.pending_deletes.saturating_sub(1);
            if let Err(e) = deleted.result {
                log::warn!(target: "restore", "cannot delete {}: {e}", deleted.path.display());
            }
        }

        let mut done = 0;
        while !self.scan_done && done < self.budget {
            match self.scan_rx.try_recv() {
                Ok(ScanMsg::Found(total)) => {
                    self.total = Some(total);
                    self.progress.started(total);
                }
                Ok(ScanMsg::File(scanned)) => {
                    done += 1;
                    self.received += 1;
                    self.restore_one(scanned, host, reg, fallback, &mut on_restored);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.scan_done = true;
                    if self.total.is_none() {
                        self.total = Some(0);
                        self.progress.started(0);
                    }
                }
            }
        }

        if self.scan_done && self.pending_deletes == 0 {
            self.finished = true;
            self.delete_tx = None;
            self.progress.finished(self.report);
        }
        self.finished
    }

    fn restore_one(
        &mut self,
        scanned: ScannedFile,
        host: &dyn WorldHost,
        reg: &BiomeRegistry,
        fallback: BiomeId,
        on_restored: &mut impl FnMut(WorldId, RegionCoord),
    ) {
        let restored = scanned.result.and_then(|(world, coord, file)| {
            apply_backup(&file, host, reg, fallback, world, coord).map(|w| (world, coord, w))
        });
        match restored {
            Ok((world, coord, writes)) => {
                self.report.restored += 1;
                log::debug!(target: "restore", "restored {world}/{coord} ({writes} samples)");
                let queued = self
                    .delete_tx
                    .as_ref()
                    .is_some_and(|tx| tx.send(scanned.path.clone()).is_ok());
                if queued {
                    self.pending_deletes += 1;
                } else {
                    log::warn!(target: "restore", "cannot delete {}: scan thread gone", scanned.path.display());
                }
                on_restored(world, coord);
            }
            Err(e) => {
                self.report.failed += 1;
                log::warn!(target: "restore", "restore failed: {e}");
            }
        }
    }
}

/// Scan thread: reads every backup in order, then deletes the files the job
/// restored until the job drops its sender.
fn reader_loop(
    root: &Path,
    scan_tx: Sender<ScanMsg>,
    delete_rx: Receiver<PathBuf>,
    deleted_tx: Sender<Deleted>,
) {
    let files = scan_backups(root);
    if scan_tx.send(ScanMsg::Found(files.len())).is_err() {
        return;
    }
    for path in files {
        while let Ok(done) = delete_rx.try_recv() {
            delete(done, &deleted_tx);
        }
        let result = read_region_file(&path);
        if scan_tx.send(ScanMsg::File(ScannedFile { path, result })).is_err() {
            return;
        }
    }
    drop(scan_tx);
    while let Ok(done) = delete_rx.recv() {
        delete(done, &deleted_tx);
    }
}

fn delete(path: PathBuf, deleted_tx: &Sender<Deleted>) {
    let result = fs::remove_file(&path);
    let _ = deleted_tx.send(Deleted { path, result });
}

/// Every `.bin` file below `root`, sorted for a stable restore order.
fn scan_backups(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                if dir != root || e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!(target: "restore", "cannot read {}: {e}", dir.display());
                }
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|x| x == "bin") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_nested_bins_only() {
        let dir = tempfile::tempdir().unwrap();
        let w = dir.path().join(WorldId::from_u128(1).to_string());
        fs::create_dir_all(&w).unwrap();
        fs::write(w.join("0_0.bin"), b"").unwrap();
        fs::write(w.join("1_0.bin"), b"").unwrap();
        fs::write(w.join("notes.txt"), b"").unwrap();
        let files = scan_backups(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0] < files[1]);
        assert!(scan_backups(&dir.path().join("missing")).is_empty());
    }
}
