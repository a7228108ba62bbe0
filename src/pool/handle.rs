//! Borrowed worker handle.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use super::manager::PoolInner;
use super::slot::Tracked;
use crate::engine::{RenderError, RenderPage, RenderWorker, WorkerLauncher};

/// A worker borrowed from a [`WorkerPool`](super::WorkerPool).
///
/// Exclusively owned by one caller until [`release`](Self::release). If it is
/// dropped instead (for example because the caller was cancelled), the worker
/// is returned to the pool on a background task.
pub struct PooledWorker<L: WorkerLauncher> {
    id: u64,
    worker: Option<Tracked<L::Worker>>,
    pool: Arc<PoolInner<L>>,
}

impl<L: WorkerLauncher> PooledWorker<L> {
    pub(crate) fn new(worker: Tracked<L::Worker>, pool: Arc<PoolInner<L>>) -> Self {
        pool.counters.borrowed.fetch_add(1, Ordering::AcqRel);
        Self {
            id: worker.id(),
            worker: Some(worker),
            pool,
        }
    }

    /// Identity of the underlying worker.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Liveness of the underlying worker.
    pub async fn is_live(&self) -> bool {
        match self.worker.as_ref() {
            Some(worker) => worker.is_live().await,
            None => false,
        }
    }

    /// Render one page on the borrowed worker.
    pub async fn render(&mut self, page: &RenderPage) -> Result<Bytes, RenderError> {
        match self.worker.as_mut() {
            Some(worker) => worker.render(page).await,
            None => Err(RenderError::Closed),
        }
    }

    /// Give the worker back to the pool.
    ///
    /// The pool re-checks liveness and replaces the worker if it died. The
    /// hand-back runs on its own task and completes even if this future is
    /// dropped.
    pub async fn release(mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let pool = Arc::clone(&self.pool);
        let returned = tokio::spawn(async move {
            pool.give_back(worker).await;
        });
        if let Err(e) = returned.await {
            warn!(worker = self.id, error = %e, "worker hand-back task failed");
        }
    }

    pub(crate) fn take(&mut self) -> Option<Tracked<L::Worker>> {
        self.worker.take()
    }
}

impl<L: WorkerLauncher> Drop for PooledWorker<L> {
    fn drop(&mut self) {
        self.pool.counters.borrowed.fetch_sub(1, Ordering::AcqRel);

        let Some(worker) = self.worker.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let pool = Arc::clone(&self.pool);
                runtime.spawn(async move {
                    pool.give_back(worker).await;
                });
            }
            Err(_) => {
                debug!(worker = self.id, "no runtime, dropping abandoned worker");
            }
        }
    }
}

impl<L: WorkerLauncher> std::fmt::Debug for PooledWorker<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledWorker")
            .field("id", &self.id)
            .field("held", &self.worker.is_some())
            .finish()
    }
}
