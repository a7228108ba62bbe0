//! Process-wide startup and teardown of the worker pool.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::WorkerLauncher;
use crate::health::HealthChecker;
use crate::pool::{PoolResult, WorkerPool, POLL_INTERVAL};

/// Drives the pool from empty to warm and back to closed.
pub struct Lifecycle<L: WorkerLauncher> {
    pool: WorkerPool<L>,
    health: Arc<HealthChecker>,
    repair_interval: Option<Duration>,
    drain_timeout: Duration,
    repair_task: Mutex<Option<JoinHandle<()>>>,
}

impl<L: WorkerLauncher> Lifecycle<L> {
    pub fn new(pool: WorkerPool<L>, health: Arc<HealthChecker>, drain_timeout: Duration) -> Self {
        Self {
            pool,
            health,
            repair_interval: None,
            drain_timeout,
            repair_task: Mutex::new(None),
        }
    }

    /// Periodically top the pool back up to capacity after startup.
    pub fn with_repair_interval(mut self, interval: Option<Duration>) -> Self {
        self.repair_interval = interval;
        self
    }

    pub fn pool(&self) -> &WorkerPool<L> {
        &self.pool
    }

    /// Pre-warm the pool to capacity and start accepting work.
    ///
    /// A launch failure here is fatal for the caller; no partial pool is kept.
    pub async fn startup(&self) -> PoolResult<()> {
        self.pool.initialize().await?;

        if let Some(interval) = self.repair_interval {
            let pool = self.pool.clone();
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if pool.is_shutdown() {
                        break;
                    }
                    pool.top_up().await;
                }
            });
            *self.lock_repair() = Some(handle);
            debug!(interval_ms = interval.as_millis() as u64, "pool repair task started");
        }

        self.health.mark_startup_complete();
        info!(
            engine = self.pool.engine(),
            capacity = self.pool.capacity(),
            "startup complete"
        );
        Ok(())
    }

    /// Stop taking work, wait for borrowed workers, then close the pool.
    ///
    /// Returns `true` if every borrowed worker came back before the drain
    /// timeout. The pool is shut down either way.
    pub async fn shutdown(&self) -> bool {
        self.health.mark_draining();

        if let Some(handle) = self.lock_repair().take() {
            handle.abort();
        }

        let drained = self.wait_for_drain().await;
        if !drained {
            warn!(
                borrowed = self.pool.borrowed(),
                timeout_secs = self.drain_timeout.as_secs(),
                "drain timeout reached, closing pool with workers still borrowed"
            );
        }

        self.pool.shutdown().await;
        drained
    }

    async fn wait_for_drain(&self) -> bool {
        let deadline = tokio::time::Instant::now() + self.drain_timeout;
        loop {
            let borrowed = self.pool.borrowed();
            if borrowed == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            debug!(borrowed, "waiting for borrowed workers to return");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn lock_repair(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.repair_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: WorkerLauncher> Drop for Lifecycle<L> {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_repair().take() {
            handle.abort();
        }
    }
}
