//! Operation counters for a sliding-window store.
//!
//! Counters are relaxed atomics: they are monotone tallies, not a
//! synchronization mechanism, and never order store operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Running statistics for one store instance.
#[derive(Debug)]
pub struct StoreStats {
    /// Number of accepted record calls
    records: AtomicU64,
    /// Number of query calls, including queries on absent keys
    queries: AtomicU64,
    /// Number of timestamps evicted across all keys
    evictions: AtomicU64,
    /// Number of late records inserted ahead of newer entries
    reordered: AtomicU64,
    /// Number of record calls rejected as out of order
    rejected: AtomicU64,
    /// Number of directory entries removed because their log emptied
    keys_reclaimed: AtomicU64,
    /// When the store was created
    started_at: DateTime<Utc>,
}

impl StoreStats {
    pub fn new() -> Self {
        Self {
            records: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            reordered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            keys_reclaimed: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_accepted(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Add evicted entries. Zero is a no-op.
    pub fn record_evictions(&self, count: usize) {
        if count > 0 {
            self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_reordered(&self) {
        self.reordered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_key_reclaimed(&self) {
        self.keys_reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot.
    ///
    /// `tracked_keys` is supplied by the owning store since the counters do
    /// not see the key directory.
    pub fn snapshot(&self, tracked_keys: usize) -> StatsSnapshot {
        StatsSnapshot {
            records: self.records.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            reordered: self.reordered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            keys_reclaimed: self.keys_reclaimed.load(Ordering::Relaxed),
            tracked_keys: tracked_keys as u64,
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }
}

impl Default for StoreStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub records: u64,
    pub queries: u64,
    pub evictions: u64,
    pub reordered: u64,
    pub rejected: u64,
    pub keys_reclaimed: u64,
    pub tracked_keys: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    /// Render the snapshot for terminal display.
    pub fn summary(&self) -> String {
        format!(
            "Store Statistics:\n\
             - Events recorded: {}\n\
             - Queries served: {}\n\
             - Timestamps evicted: {}\n\
             - Late events reordered: {}\n\
             - Out-of-order events rejected: {}\n\
             - Keys reclaimed: {}\n\
             - Keys tracked: {}\n\
             - Uptime: {} seconds",
            self.records,
            self.queries,
            self.evictions,
            self.reordered,
            self.rejected,
            self.keys_reclaimed,
            self.tracked_keys,
            self.uptime_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = StoreStats::new();

        stats.record_accepted();
        stats.record_accepted();
        stats.record_query();
        stats.record_evictions(3);
        stats.record_evictions(0);
        stats.record_rejected();
        stats.record_reordered();

        let snapshot = stats.snapshot(7);
        assert_eq!(snapshot.records, 2);
        assert_eq!(snapshot.queries, 1);
        assert_eq!(snapshot.evictions, 3);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.reordered, 1);
        assert_eq!(snapshot.keys_reclaimed, 0);
        assert_eq!(snapshot.tracked_keys, 7);
    }

    #[test]
    fn test_summary_format() {
        let summary = StoreStats::new().snapshot(2).summary();

        assert!(summary.contains("Events recorded: 0"));
        assert!(summary.contains("Keys tracked: 2"));
        assert!(summary.contains("Uptime"));
    }
}
