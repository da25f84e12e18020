//! The sliding-window store: a key directory of independently locked logs.
//!
//! The directory is a sharded concurrent map whose shard locks are held only
//! long enough to look up or insert one key's log handle. Each log sits behind
//! its own mutex, so operations on different keys never wait on each other
//! while operations on the same key are serialized in lock order.

use crate::core::event_log::EventLog;
use crate::telemetry::{StatsSnapshot, StoreStats};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

type SharedLog = Arc<Mutex<EventLog>>;

/// What to do with a record whose timestamp is earlier than the latest one
/// already recorded for its key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingPolicy {
    /// Insert at the ordered position so the log stays sorted.
    ///
    /// Late events that are already stale go out with the next eviction pass.
    /// Counts returned before the late event arrived are not revised.
    #[default]
    Reorder,
    /// Append at the back regardless of order. A late entry queued behind a
    /// newer one is evicted only together with it, so counts for that key
    /// may be too high afterwards.
    Permissive,
    /// Fail with [`StoreError::OutOfOrderEvent`] without touching the log.
    Reject,
}

/// What to do with a key whose log has been evicted down to nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyKeyPolicy {
    /// Keep the directory entry; directory size is bounded by distinct keys.
    #[default]
    Retain,
    /// Remove the directory entry once no operation is using it.
    ///
    /// Not applied under [`OrderingPolicy::Reject`], which needs the latest
    /// recorded timestamp of every key it has seen.
    Reclaim,
}

/// Construction options beyond the window itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    pub ordering: OrderingPolicy,
    pub empty_keys: EmptyKeyPolicy,
    /// Directory shard count; must be a power of two greater than one.
    pub shard_amount: Option<usize>,
}

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be built with the given settings
    InvalidConfiguration(String),
    /// A record arrived earlier than the key's latest recorded timestamp
    OutOfOrderEvent {
        latest: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::InvalidConfiguration(e) => write!(f, "Invalid configuration: {e}"),
            StoreError::OutOfOrderEvent { latest, attempted } => write!(
                f,
                "Out-of-order event: {} is earlier than latest recorded {}",
                attempted.to_rfc3339(),
                latest.to_rfc3339()
            ),
        }
    }
}

impl std::error::Error for StoreError {}

/// Per-key sliding-window event counter.
///
/// Both [`record`](Self::record) and [`query`](Self::query) mutate the
/// key's log (a query evicts stale entries), so both take the key's exclusive
/// lock. There is no shared-read path.
pub struct SlidingWindowStore<K = String> {
    window: Duration,
    options: StoreOptions,
    logs: DashMap<K, SharedLog>,
    stats: StoreStats,
}

impl<K> SlidingWindowStore<K>
where
    K: Eq + Hash + Clone,
{
    /// Create a store with default options.
    pub fn new(window: Duration) -> Result<Self, StoreError> {
        Self::with_options(window, StoreOptions::default())
    }

    /// Create a store with explicit options.
    pub fn with_options(window: Duration, options: StoreOptions) -> Result<Self, StoreError> {
        if window <= Duration::zero() {
            return Err(StoreError::InvalidConfiguration(format!(
                "window must be positive, got {window}"
            )));
        }

        let logs = match options.shard_amount {
            Some(shards) if shards <= 1 || !shards.is_power_of_two() => {
                return Err(StoreError::InvalidConfiguration(format!(
                    "shard amount must be a power of two greater than one, got {shards}"
                )));
            }
            Some(shards) => DashMap::with_shard_amount(shards),
            None => DashMap::new(),
        };

        tracing::debug!(
            window_secs = window.num_seconds(),
            ordering = ?options.ordering,
            empty_keys = ?options.empty_keys,
            "Created sliding-window store"
        );

        Ok(Self {
            window,
            options,
            logs,
            stats: StoreStats::new(),
        })
    }

    /// Record an event for `key` at `timestamp`.
    ///
    /// Adds the timestamp to the key's log, then evicts every entry of that
    /// key strictly older than `timestamp - window`. Timestamps are expected
    /// in non-decreasing order per key; a late one is handled according to
    /// the store's [`OrderingPolicy`].
    pub fn record(&self, key: K, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
        let log = self.log_for(key);
        let mut guard = log.lock();

        match self.options.ordering {
            OrderingPolicy::Reorder => {
                if guard.insert_ordered(timestamp) {
                    self.stats.record_reordered();
                }
            }
            OrderingPolicy::Permissive => guard.push(timestamp),
            OrderingPolicy::Reject => {
                if let Some(latest) = guard.last_recorded().filter(|latest| timestamp < *latest) {
                    self.stats.record_rejected();
                    tracing::debug!(
                        latest = %latest,
                        attempted = %timestamp,
                        "Rejected out-of-order event"
                    );
                    return Err(StoreError::OutOfOrderEvent {
                        latest,
                        attempted: timestamp,
                    });
                }
                guard.push(timestamp);
            }
        }

        let evicted = guard.evict_expired(timestamp, self.window);
        self.stats.record_accepted();
        self.stats.record_evictions(evicted);
        if evicted > 0 {
            tracing::trace!(evicted, retained = guard.len(), "Evicted on record");
        }
        Ok(())
    }

    /// Count events for `key` within the window ending at `as_of`.
    ///
    /// Evicts every entry strictly older than `as_of - window` and returns how
    /// many remain. An unknown key yields 0 and is not added to the
    /// directory. Takes the key's exclusive lock like [`record`](Self::record).
    pub fn query<Q>(&self, key: &Q, as_of: DateTime<Utc>) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.stats.record_query();

        let Some(log) = self.logs.get(key).map(|entry| Arc::clone(entry.value())) else {
            return 0;
        };

        let (count, now_empty) = {
            let mut guard = log.lock();
            let evicted = guard.evict_expired(as_of, self.window);
            self.stats.record_evictions(evicted);
            if evicted > 0 {
                tracing::trace!(evicted, retained = guard.len(), "Evicted on query");
            }
            (guard.len(), guard.is_empty())
        };
        drop(log);

        if now_empty {
            self.reclaim(key);
        }
        count
    }

    /// The window this store was built with.
    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Number of keys in the directory, including keys with empty logs.
    pub fn tracked_keys(&self) -> usize {
        self.logs.len()
    }

    /// Check if the directory holds an entry for `key`. Does not evict.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.logs.contains_key(key)
    }

    /// Snapshot of this store's operation counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.tracked_keys())
    }

    /// Fetch the log handle for `key`, creating an empty log on first use.
    fn log_for(&self, key: K) -> SharedLog {
        if let Some(entry) = self.logs.get(&key) {
            return Arc::clone(entry.value());
        }
        Arc::clone(self.logs.entry(key).or_default().value())
    }

    /// Drop the directory entry for `key` if its log is empty and unused.
    ///
    /// Runs under the shard write lock, so no other caller can obtain the log
    /// handle while the check is made. A handle held elsewhere keeps the entry.
    fn reclaim<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.options.empty_keys != EmptyKeyPolicy::Reclaim
            || self.options.ordering == OrderingPolicy::Reject
        {
            return;
        }

        let removed = self
            .logs
            .remove_if(key, |_, log| Arc::strong_count(log) == 1 && log.lock().is_empty());
        if removed.is_some() {
            self.stats.record_key_reclaimed();
            tracing::debug!("Reclaimed empty key");
        }
    }
}

impl<K> std::fmt::Debug for SlidingWindowStore<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowStore")
            .field("window", &self.window)
            .field("options", &self.options)
            .field("tracked_keys", &self.logs.len())
            .finish()
    }
}
