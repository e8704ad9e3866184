use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Sender, bounded, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use solstice_world::{RegionCoord, RegionKey, WorldId};

pub type RegionJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs work on the thread that owns a region.
///
/// Hosts with a single world thread use [`InlineExecutor`]; hosts that
/// partition the world by region use a region-affine pool such as
/// [`ShardedExecutor`].
pub trait RegionExecutor: Send + Sync {
    fn run_in_region(&self, world: WorldId, coord: RegionCoord, job: RegionJob);

    /// Blocks until every job submitted so far has run.
    fn flush(&self) {}
}

/// Runs each job immediately on the caller's thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl RegionExecutor for InlineExecutor {
    #[inline]
    fn run_in_region(&self, _world: WorldId, _coord: RegionCoord, job: RegionJob) {
        job();
    }
}

enum ShardMsg {
    Run(RegionJob),
    Barrier(Sender<()>),
}

/// Fixed pool of workers, each owning the regions whose key hashes to it.
/// Jobs for one region always run in submission order on the same worker.
pub struct ShardedExecutor {
    shards: Vec<Sender<ShardMsg>>,
    queued: Arc<AtomicUsize>,
    _pool: ThreadPool,
}

impl ShardedExecutor {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("solstice-region-{i}"))
            .build()
            .expect("region pool");
        let queued = Arc::new(AtomicUsize::new(0));
        let mut shards = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = unbounded::<ShardMsg>();
            let queued = queued.clone();
            pool.spawn(move || {
                while let Ok(msg) = rx.recv() {
                    match msg {
                        ShardMsg::Run(job) => {
                            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                                log::warn!(target: "repaint", "region job panicked");
                            }
                            queued.fetch_sub(1, Ordering::Relaxed);
                        }
                        ShardMsg::Barrier(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            });
            shards.push(tx);
        }
        log::debug!(target: "repaint", "region executor started with {workers} workers");
        Self {
            shards,
            queued,
            _pool: pool,
        }
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.shards.len()
    }

    /// Jobs submitted but not yet finished.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    fn shard_of(&self, key: RegionKey) -> usize {
        let h = key.raw().wrapping_mul(0x9E37_79B9_7F4A_7C15);
        ((h >> 32) % self.shards.len() as u64) as usize
    }
}

impl RegionExecutor for ShardedExecutor {
    fn run_in_region(&self, world: WorldId, coord: RegionCoord, job: RegionJob) {
        let shard = self.shard_of(RegionKey::new(world, coord));
        self.queued.fetch_add(1, Ordering::Relaxed);
        if self.shards[shard].send(ShardMsg::Run(job)).is_err() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            log::warn!(target: "repaint", "region worker {shard} is gone; dropped job for {world}/{coord}");
        }
    }

    fn flush(&self) {
        let (ack_tx, ack_rx) = bounded::<()>(self.shards.len());
        let sent = self
            .shards
            .iter()
            .filter(|tx| tx.send(ShardMsg::Barrier(ack_tx.clone())).is_ok())
            .count();
        drop(ack_tx);
        for _ in 0..sent {
            if ack_rx.recv().is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn inline_runs_immediately() {
        let hit = Arc::new(AtomicUsize::new(0));
        let h = hit.clone();
        InlineExecutor.run_in_region(
            WorldId::from_u128(1),
            RegionCoord::new(0, 0),
            Box::new(move || {
                h.fetch_add(1, Ordering::Relaxed);
            }),
        );
        assert_eq!(hit.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn same_region_jobs_keep_order_and_flush_waits() {
        let exec = ShardedExecutor::new(4);
        let w = WorldId::from_u128(2);
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let log = log.clone();
            exec.run_in_region(
                w,
                RegionCoord::new(3, -7),
                Box::new(move || log.lock().unwrap().push(i)),
            );
        }
        for rx in 0..20 {
            exec.run_in_region(w, RegionCoord::new(rx, 0), Box::new(|| {}));
        }
        exec.flush();
        assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());
        assert_eq!(exec.queued(), 0);
    }

    #[test]
    fn panicking_job_does_not_kill_the_worker() {
        let exec = ShardedExecutor::new(1);
        let w = WorldId::from_u128(3);
        let c = RegionCoord::new(0, 0);
        exec.run_in_region(w, c, Box::new(|| panic!("boom")));
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        exec.run_in_region(
            w,
            c,
            Box::new(move || {
                r.fetch_add(1, Ordering::Relaxed);
            }),
        );
        exec.flush();
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }
}
