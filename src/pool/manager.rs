//! Bounded pool of rendering workers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{PoolError, PoolResult};
use super::handle::PooledWorker;
use super::slot::{Counters, Slot, Tracked};
use super::PoolStats;
use crate::config::PoolConfig;
use crate::engine::{RenderError, RenderWorker, WorkerLauncher};

/// Fallback re-check interval for waiters that missed a wake-up.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A bounded pool of rendering workers.
///
/// Cloning is cheap; all clones share the same workers.
pub struct WorkerPool<L: WorkerLauncher> {
    inner: Arc<PoolInner<L>>,
}

pub(crate) struct PoolInner<L: WorkerLauncher> {
    launcher: L,
    capacity: usize,
    acquire_timeout: Option<Duration>,
    /// Idle workers, used as a stack (last released, first served).
    idle: Mutex<Vec<Tracked<L::Worker>>>,
    /// Signalled on release and on shutdown.
    available: Notify,
    pub(crate) counters: Arc<Counters>,
    next_id: AtomicU64,
    initialized: AtomicBool,
    shutdown: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
}

impl<L: WorkerLauncher> Clone for WorkerPool<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: WorkerLauncher> WorkerPool<L> {
    /// Create an empty pool. No worker is launched until [`initialize`](Self::initialize).
    pub fn new(launcher: L, config: &PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                launcher,
                capacity: config.capacity(),
                acquire_timeout: config.acquire_timeout,
                idle: Mutex::new(Vec::with_capacity(config.capacity())),
                available: Notify::new(),
                counters: Arc::new(Counters::default()),
                next_id: AtomicU64::new(0),
                initialized: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                init_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Launch `capacity` workers concurrently.
    ///
    /// Idempotent: returns immediately once the pool is filled. If any launch
    /// fails, the workers that did start are closed and the pool stays empty.
    pub async fn initialize(&self) -> PoolResult<()> {
        let inner = &self.inner;
        let _guard = inner.init_lock.lock().await;

        if inner.is_shutdown() {
            return Err(PoolError::Shutdown);
        }
        if inner.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let start = Instant::now();
        let slots: Vec<Slot> = (0..inner.capacity)
            .filter_map(|_| inner.counters.reserve(inner.capacity))
            .collect();
        let results = join_all(slots.into_iter().map(|slot| inner.launch(slot))).await;

        let mut workers = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(worker) => workers.push(worker),
                Err(e) => failures.push(e),
            }
        }

        if let Some(source) = failures.first().cloned() {
            warn!(
                engine = inner.launcher.name(),
                capacity = inner.capacity,
                failed = failures.len(),
                error = %source,
                "pool init failed, closing launched workers"
            );
            for mut worker in workers {
                worker.close().await;
            }
            return Err(PoolError::InitFailure {
                capacity: inner.capacity,
                failed: failures.len(),
                source,
            });
        }

        for worker in workers {
            if let Err(mut rejected) = inner.push_idle(worker) {
                rejected.close().await;
            }
        }
        inner.initialized.store(true, Ordering::Release);
        inner.available.notify_waiters();

        info!(
            engine = inner.launcher.name(),
            capacity = inner.capacity,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "worker pool ready"
        );

        Ok(())
    }

    /// Borrow an idle, live worker, waiting until one is available.
    ///
    /// A dead worker found on the idle stack is closed and replaced before
    /// being handed out; the caller never receives a dead worker.
    pub async fn acquire(&self) -> PoolResult<PooledWorker<L>> {
        match self.inner.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, self.checkout())
                .await
                .map_err(|_| PoolError::AcquireTimeout(limit))?,
            None => self.checkout().await,
        }
    }

    async fn checkout(&self) -> PoolResult<PooledWorker<L>> {
        if !self.inner.initialized.load(Ordering::Acquire) && !self.inner.is_shutdown() {
            return Err(PoolError::NotInitialized);
        }

        loop {
            // Register before checking so a release in between is not missed
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.is_shutdown() {
                return Err(PoolError::Shutdown);
            }

            if let Some(worker) = self.inner.pop_idle() {
                let mut borrowed = PooledWorker::new(worker, Arc::clone(&self.inner));
                if borrowed.is_live().await {
                    return Ok(borrowed);
                }
                if let Some(dead) = borrowed.take() {
                    drop(borrowed);
                    // The replacement lands on the idle stack, popped on the next pass
                    if let Err(e) = self.inner.spawn_replace(dead, "acquire").await {
                        warn!(error = %e, "worker replacement task failed");
                    }
                }
                continue;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }

    /// Return a borrowed worker. Equivalent to [`PooledWorker::release`].
    pub async fn release(&self, worker: PooledWorker<L>) {
        worker.release().await;
    }

    /// Close every idle worker and fail all current and future waiters.
    ///
    /// Borrowed workers are closed when their holder returns them.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.available.notify_waiters();

        let drained = std::mem::take(&mut *inner.lock_idle());
        let count = drained.len();
        for mut worker in drained {
            worker.close().await;
        }

        info!(
            closed = count,
            borrowed = inner.counters.borrowed.load(Ordering::Acquire),
            "worker pool shut down"
        );
    }

    /// Launch workers until the tracked count is back at capacity.
    ///
    /// Returns the number of workers added. Stops at the first launch failure.
    pub async fn top_up(&self) -> usize {
        let inner = &self.inner;
        if inner.is_shutdown() || !inner.initialized.load(Ordering::Acquire) {
            return 0;
        }

        let mut added = 0;
        while let Some(slot) = inner.counters.reserve(inner.capacity) {
            match inner.launch(slot).await {
                Ok(worker) => match inner.push_idle(worker) {
                    Ok(()) => {
                        added += 1;
                        inner.available.notify_one();
                    }
                    Err(mut rejected) => {
                        rejected.close().await;
                        break;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "pool top-up launch failed");
                    break;
                }
            }
        }

        if added > 0 {
            info!(added, tracked = inner.tracked(), "worker pool topped up");
        }
        added
    }

    /// Snapshot of pool counters.
    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        let counters = &inner.counters;
        PoolStats {
            capacity: inner.capacity,
            tracked: counters.tracked.load(Ordering::Acquire),
            idle: inner.lock_idle().len(),
            borrowed: counters.borrowed.load(Ordering::Acquire),
            launches: counters.launches.load(Ordering::Relaxed),
            replacements: counters.replacements.load(Ordering::Relaxed),
            replacement_failures: counters.replacement_failures.load(Ordering::Relaxed),
            initialized: inner.initialized.load(Ordering::Acquire),
            shutdown: inner.is_shutdown(),
        }
    }

    /// Target capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of workers currently borrowed.
    #[inline]
    pub fn borrowed(&self) -> usize {
        self.inner.counters.borrowed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// Engine name for logging.
    pub fn engine(&self) -> &'static str {
        self.inner.launcher.name()
    }
}

impl<L: WorkerLauncher> PoolInner<L> {
    #[inline]
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    #[inline]
    fn tracked(&self) -> usize {
        self.counters.tracked.load(Ordering::Acquire)
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Tracked<L::Worker>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_idle(&self) -> Option<Tracked<L::Worker>> {
        self.lock_idle().pop()
    }

    /// Push a worker onto the idle stack unless the pool is shut down.
    ///
    /// The shutdown flag is read under the idle lock, so a worker can never
    /// land on the stack after `shutdown()` drained it.
    fn push_idle(&self, worker: Tracked<L::Worker>) -> Result<(), Tracked<L::Worker>> {
        let mut idle = self.lock_idle();
        if self.is_shutdown() {
            return Err(worker);
        }
        idle.push(worker);
        Ok(())
    }

    async fn launch(&self, slot: Slot) -> Result<Tracked<L::Worker>, RenderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let worker = self.launcher.launch(id).await?;
        self.counters.launches.fetch_add(1, Ordering::Relaxed);
        debug!(
            worker = id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "worker launched"
        );
        Ok(slot.fill(worker))
    }

    /// Close a dead worker and launch one replacement in its place.
    ///
    /// Returns `None` when the replacement could not be launched; the pool
    /// then runs one worker short.
    pub(crate) async fn replace_dead(
        &self,
        mut dead: Tracked<L::Worker>,
        stage: &'static str,
    ) -> Option<Tracked<L::Worker>> {
        let id = dead.id();
        warn!(worker = id, stage, "worker is dead, replacing");
        dead.close().await;
        drop(dead);

        if self.is_shutdown() {
            return None;
        }
        let slot = self.counters.reserve(self.capacity)?;

        match self.launch(slot).await {
            Ok(fresh) => {
                self.counters.replacements.fetch_add(1, Ordering::Relaxed);
                info!(old = id, new = fresh.id(), stage, "worker replaced");
                Some(fresh)
            }
            Err(e) => {
                self.counters
                    .replacement_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker = id,
                    stage,
                    error = %e,
                    tracked = self.tracked(),
                    capacity = self.capacity,
                    "worker replacement failed, pool capacity degraded"
                );
                None
            }
        }
    }

    /// Close and replace a dead worker on its own task.
    ///
    /// The task runs to completion even if the caller is cancelled, so a
    /// replacement is always either pushed onto the idle stack or counted as
    /// a failure.
    pub(crate) fn spawn_replace(
        self: &Arc<Self>,
        dead: Tracked<L::Worker>,
        stage: &'static str,
    ) -> JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(fresh) = pool.replace_dead(dead, stage).await {
                pool.restore(fresh).await;
            }
        })
    }

    /// Take a worker back from a borrower.
    ///
    /// Callers run this on a spawned task (see [`PooledWorker`]) so that a
    /// cancelled borrower cannot strand the worker halfway through.
    pub(crate) async fn give_back(&self, mut worker: Tracked<L::Worker>) {
        if self.is_shutdown() {
            worker.close().await;
            return;
        }

        let worker = if worker.is_live().await {
            worker
        } else {
            match self.replace_dead(worker, "release").await {
                Some(fresh) => fresh,
                None => return,
            }
        };

        self.restore(worker).await;
    }

    async fn restore(&self, worker: Tracked<L::Worker>) {
        match self.push_idle(worker) {
            Ok(()) => self.available.notify_one(),
            Err(mut rejected) => rejected.close().await,
        }
    }
}
