//! Bounded memory accounting for buffers in flight

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Usage statistics for a memory pool
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total bytes reserved over the pool's lifetime
    pub total_reserved: usize,

    /// Peak concurrent usage in bytes
    pub peak_usage: usize,

    /// Number of live reservations
    pub live_reservations: usize,

    /// Total number of reservations performed
    pub total_reservations: usize,
}

/// Bounded reservation budget shared by every buffer a pipeline allocates
///
/// The pool never blocks: a reservation that would exceed the budget fails
/// immediately with [`Error::AllocationFailed`]. Buffers release their
/// reservation when dropped, so the pool's usage tracks live payload bytes.
pub struct MemoryPool {
    /// The total budget in bytes
    budget: usize,

    /// Current usage in bytes
    current_usage: AtomicUsize,

    /// Usage statistics
    stats: RwLock<PoolStats>,
}

impl MemoryPool {
    /// Create a pool with the given budget in bytes
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            current_usage: AtomicUsize::new(0),
            stats: RwLock::new(PoolStats::default()),
        }
    }

    /// Create a pool with no effective bound
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Try to reserve `bytes`, returning false if it would exceed the budget
    pub fn try_reserve(&self, bytes: usize) -> bool {
        let mut current = self.current_usage.load(Ordering::SeqCst);

        loop {
            let Some(next) = current.checked_add(bytes) else {
                return false;
            };
            if next > self.budget {
                return false;
            }

            match self.current_usage.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    let mut stats = self.stats.write().unwrap();
                    stats.total_reserved += bytes;
                    stats.peak_usage = stats.peak_usage.max(next);
                    stats.live_reservations += 1;
                    stats.total_reservations += 1;

                    return true;
                }
                Err(actual) => {
                    current = actual;
                }
            }
        }
    }

    /// Reserve `bytes`, failing with [`Error::AllocationFailed`] if it
    /// would exceed the budget
    pub fn reserve(&self, bytes: usize) -> Result<()> {
        if self.try_reserve(bytes) {
            Ok(())
        } else {
            Err(Error::AllocationFailed {
                requested: bytes,
                available: self.available(),
            })
        }
    }

    /// Release a previous reservation of `bytes`
    pub fn release(&self, bytes: usize) {
        let prev = self.current_usage.fetch_sub(bytes, Ordering::SeqCst);

        if prev < bytes {
            // Accounting bug in the caller; clamp rather than wrap.
            tracing::warn!(released = bytes, held = prev, "released more than reserved");
            self.current_usage.store(0, Ordering::SeqCst);
        }

        let mut stats = self.stats.write().unwrap();
        stats.live_reservations = stats.live_reservations.saturating_sub(1);
    }

    /// Current usage in bytes
    pub fn usage(&self) -> usize {
        self.current_usage.load(Ordering::SeqCst)
    }

    /// Remaining capacity in bytes
    pub fn available(&self) -> usize {
        self.budget.saturating_sub(self.usage())
    }

    /// The total budget in bytes
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Snapshot of usage statistics
    pub fn stats(&self) -> PoolStats {
        self.stats.read().unwrap().clone()
    }
}
