//! Index manager statistics.
//!
//! ```rust,ignore
//! let manager = IndexManager::new(IndexConfig::default());
//! // ... route inserts and lookups through the manager ...
//! let stats = manager.stats();
//! println!("lookups: {}", stats.lookups());
//! println!("rejected writes: {}", stats.rejected_writes());
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Manager-wide counters.
///
/// All counters are atomic and monotonically increasing; they can be read
/// while operations are in progress.
#[derive(Debug, Default)]
pub struct IndexStats {
    /// Lookups served (equality, range, term, bitmap).
    lookups: AtomicU64,
    /// Inserts and deletes applied.
    updates: AtomicU64,
    /// Inserts and deletes rejected by a constraint or a missing entry.
    rejected_writes: AtomicU64,
    /// Indexes repopulated from the heap.
    rebuilds: AtomicU64,
    /// Indexes marked unusable after a corruption was detected.
    corruptions: AtomicU64,
}

impl IndexStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_write(&self) {
        self.rejected_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_corruption(&self) {
        self.corruptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of lookups served.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Returns the number of applied inserts and deletes.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Returns the number of rejected inserts and deletes.
    pub fn rejected_writes(&self) -> u64 {
        self.rejected_writes.load(Ordering::Relaxed)
    }

    /// Returns the number of rebuilds from the heap.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Returns the number of indexes marked unusable.
    pub fn corruptions(&self) -> u64 {
        self.corruptions.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lookups: self.lookups(),
            updates: self.updates(),
            rejected_writes: self.rejected_writes(),
            rebuilds: self.rebuilds(),
            corruptions: self.corruptions(),
        }
    }
}

/// A copy of [`IndexStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Lookups served.
    pub lookups: u64,
    /// Applied inserts and deletes.
    pub updates: u64,
    /// Rejected inserts and deletes.
    pub rejected_writes: u64,
    /// Rebuilds from the heap.
    pub rebuilds: u64,
    /// Indexes marked unusable.
    pub corruptions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = IndexStats::new();
        stats.record_lookup();
        stats.record_lookup();
        stats.record_update();
        stats.record_rejected_write();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.lookups, 2);
        assert_eq!(snapshot.updates, 1);
        assert_eq!(snapshot.rejected_writes, 1);
        assert_eq!(snapshot.rebuilds, 0);
    }
}
