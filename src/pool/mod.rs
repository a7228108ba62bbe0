//! Rendering worker pool.
//!
//! A small, fixed set of expensive engine instances shared by many
//! concurrent generations. Each worker is borrowed by exactly one caller at
//! a time and re-validated every time it comes back.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      WorkerPool                            │
//! ├────────────────────────────────────────────────────────────┤
//! │   acquire() ──▶ ┌────────────────┐ ──▶ is_live? ──▶ caller │
//! │                 │  idle (stack)  │        │ no              │
//! │   release() ──▶ └────────────────┘     close + launch      │
//! │       │                 ▲                                  │
//! │       └── is_live? ─────┘ (dead: close + launch)           │
//! │                                                            │
//! │   tracked = idle + borrowed + launching  ≤ capacity        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Waiters sleep on a [`tokio::sync::Notify`] signalled by every release,
//! with a [`POLL_INTERVAL`] re-check as a fallback. Shutdown wakes all
//! waiters with [`PoolError::Shutdown`].

mod error;
mod handle;
mod manager;
mod slot;

pub use error::{PoolError, PoolResult};
pub use handle::PooledWorker;
pub use manager::{WorkerPool, POLL_INTERVAL};

use serde::Serialize;

/// Statistics about pool state.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    /// Target number of workers.
    pub capacity: usize,
    /// Workers counted against capacity (idle + borrowed + launching).
    pub tracked: usize,
    /// Workers waiting on the idle stack.
    pub idle: usize,
    /// Workers currently lent out.
    pub borrowed: usize,
    /// Successful engine launches since creation.
    pub launches: u64,
    /// Dead workers replaced successfully.
    pub replacements: u64,
    /// Dead workers that could not be replaced.
    pub replacement_failures: u64,
    pub initialized: bool,
    pub shutdown: bool,
}

impl PoolStats {
    /// Workers missing compared to capacity.
    #[inline]
    pub fn degraded_by(&self) -> usize {
        self.capacity.saturating_sub(self.tracked)
    }
}
