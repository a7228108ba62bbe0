//! Capacity accounting.
//!
//! Every worker the pool knows about is wrapped in a [`Tracked`], and every
//! launch in flight holds a [`Slot`]. Both decrement the tracked count when
//! dropped, so the count stays correct on every exit path, including
//! cancelled futures.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counters, readable without locking.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub tracked: AtomicUsize,
    pub borrowed: AtomicUsize,
    pub launches: AtomicU64,
    pub replacements: AtomicU64,
    pub replacement_failures: AtomicU64,
}

impl Counters {
    /// Reserve one unit of capacity, if any is left.
    pub fn reserve(self: &Arc<Self>, capacity: usize) -> Option<Slot> {
        self.tracked
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .ok()
            .map(|_| Slot {
                counters: Arc::clone(self),
                filled: false,
            })
    }
}

/// Capacity reserved for a worker that is being launched.
pub(crate) struct Slot {
    counters: Arc<Counters>,
    filled: bool,
}

impl Slot {
    /// Hand the reservation over to a launched worker.
    pub fn fill<W>(mut self, worker: W) -> Tracked<W> {
        self.filled = true;
        Tracked {
            worker,
            counters: Arc::clone(&self.counters),
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if !self.filled {
            self.counters.tracked.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// A worker counted against pool capacity.
pub(crate) struct Tracked<W> {
    worker: W,
    counters: Arc<Counters>,
}

impl<W> Deref for Tracked<W> {
    type Target = W;

    fn deref(&self) -> &W {
        &self.worker
    }
}

impl<W> DerefMut for Tracked<W> {
    fn deref_mut(&mut self) -> &mut W {
        &mut self.worker
    }
}

impl<W> Drop for Tracked<W> {
    fn drop(&mut self) {
        self.counters.tracked.fetch_sub(1, Ordering::AcqRel);
    }
}
