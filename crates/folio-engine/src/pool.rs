//! Bounded solver pool.
//!
//! Solves are CPU-bound and blocking, so they run on a dedicated `rayon`
//! pool rather than on the async runtime. Results come back over a
//! `oneshot` channel. Jobs that are accepted but not yet running count
//! against `max_queue_depth`; once the limit is reached new jobs are
//! rejected with `OVER_CAPACITY` instead of queuing without bound.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use folio_portfolio::{OptimizerError, OptimizerResult};

/// Fixed-size worker pool with admission control.
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
    max_queue_depth: usize,
    queued: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
    skipped: Arc<AtomicU64>,
}

/// Handle to a job accepted by the pool.
///
/// Dropping it before the job starts cancels the job.
#[derive(Debug)]
#[must_use = "dropping a pending job cancels it"]
pub struct PendingJob<T> {
    rx: oneshot::Receiver<OptimizerResult<T>>,
}

impl<T> PendingJob<T> {
    /// Waits for the job's result.
    pub async fn wait(self) -> OptimizerResult<T> {
        self.rx.await.map_err(|_| {
            OptimizerError::optimization_failed(
                "worker",
                "worker_panicked",
                "job ended without producing a result",
            )
        })?
    }
}

impl WorkerPool {
    /// Creates a pool with `threads` workers.
    pub fn new(threads: usize, max_queue_depth: usize) -> OptimizerResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("folio-worker-{}", i))
            .panic_handler(|_| error!("solver job panicked"))
            .build()
            .map_err(|e| {
                OptimizerError::invalid_request(format!("cannot start worker pool: {}", e))
            })?;

        Ok(Self {
            pool,
            threads,
            max_queue_depth,
            queued: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Accepts `job` or rejects it with `OVER_CAPACITY`.
    pub fn submit<T, F>(&self, job: F) -> OptimizerResult<PendingJob<T>>
    where
        F: FnOnce() -> OptimizerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let queued = self.queued.fetch_add(1, Ordering::SeqCst);
        if queued >= self.max_queue_depth {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            warn!(queued, limit = self.max_queue_depth, "worker pool over capacity");
            return Err(OptimizerError::OverCapacity {
                queued,
                limit: self.max_queue_depth,
            });
        }

        let (tx, rx) = oneshot::channel();
        let queued = Arc::clone(&self.queued);
        let running = Arc::clone(&self.running);
        let skipped = Arc::clone(&self.skipped);

        self.pool.spawn(move || {
            queued.fetch_sub(1, Ordering::SeqCst);
            if tx.is_closed() {
                skipped.fetch_add(1, Ordering::Relaxed);
                debug!("skipping job abandoned before start");
                return;
            }
            running.fetch_add(1, Ordering::SeqCst);
            let _running = RunningGuard(&running);
            let _ = tx.send(job());
        });

        Ok(PendingJob { rx })
    }

    /// Runs `job` on the pool and waits for its result.
    pub async fn run<T, F>(&self, job: F) -> OptimizerResult<T>
    where
        F: FnOnce() -> OptimizerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(job)?.wait().await
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queue limit.
    pub fn max_queue_depth(&self) -> usize {
        self.max_queue_depth
    }

    /// Jobs accepted but not yet started.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Jobs currently executing.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Jobs dropped because their caller went away before they started.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("max_queue_depth", &self.max_queue_depth)
            .field("queued", &self.queued())
            .field("running", &self.running())
            .finish()
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
