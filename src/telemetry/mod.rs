//! Operational telemetry for the feature store.
//!
//! Tracks what the store has done (records, queries, evictions) without
//! retaining any keys or timestamps.

pub mod stats;

pub use stats::{StatsSnapshot, StoreStats};
