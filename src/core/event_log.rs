//! Per-key event logs and the shared eviction procedure.
//!
//! A log is an append-at-back, evict-from-front queue of timestamps. As long
//! as the queue is in non-decreasing order, every stale entry sits in a prefix
//! and eviction never has to look past the first retained entry.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Compute the eviction cutoff for a reference instant.
///
/// Entries strictly older than the cutoff are stale. Returns `None` when
/// `reference - window` falls outside the representable range, in which case
/// nothing can be stale.
pub fn eviction_cutoff(reference: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    reference.checked_sub_signed(window)
}

/// Ordered timestamps recorded for a single key.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Retained timestamps, oldest at the front
    timestamps: VecDeque<DateTime<Utc>>,
    /// Latest timestamp ever appended, survives eviction
    last_recorded: Option<DateTime<Utc>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a timestamp at the back of the log.
    ///
    /// Does not evict; callers follow up with [`EventLog::evict_expired`].
    pub fn push(&mut self, timestamp: DateTime<Utc>) {
        self.timestamps.push_back(timestamp);
        self.last_recorded = Some(match self.last_recorded {
            Some(latest) if latest > timestamp => latest,
            _ => timestamp,
        });
    }

    /// Insert a timestamp at its ordered position.
    ///
    /// Equal timestamps go after existing ones. Returns `true` when the
    /// timestamp did not belong at the back. In-order input costs the same as
    /// [`EventLog::push`].
    pub fn insert_ordered(&mut self, timestamp: DateTime<Utc>) -> bool {
        match self.timestamps.back() {
            Some(newest) if *newest > timestamp => {
                let index = self.timestamps.partition_point(|t| *t <= timestamp);
                self.timestamps.insert(index, timestamp);
                true
            }
            _ => {
                self.push(timestamp);
                false
            }
        }
    }

    /// Remove every entry strictly older than `reference - window`.
    ///
    /// Returns the number of evicted entries. An entry exactly at the cutoff
    /// is retained.
    pub fn evict_expired(&mut self, reference: DateTime<Utc>, window: Duration) -> usize {
        let Some(cutoff) = eviction_cutoff(reference, window) else {
            return 0;
        };

        let mut evicted = 0;
        while let Some(front) = self.timestamps.front() {
            if *front < cutoff {
                self.timestamps.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }
        evicted
    }

    /// Number of retained timestamps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if no timestamps are retained.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Latest timestamp ever appended to this log, including evicted ones.
    pub fn last_recorded(&self) -> Option<DateTime<Utc>> {
        self.last_recorded
    }
}
