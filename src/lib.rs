//! Click Feature Store - sliding-window event counts for feature serving.
//!
//! This library answers "how many events did this key produce within the last
//! W time units?" at any query instant, with bounded memory per key.
//!
//! # Guarantees
//!
//! - **Inclusive window**: an event exactly `window` old is still counted
//! - **Amortized O(1)**: each timestamp is appended once and evicted at most once
//! - **Key isolation**: operations on one key never change another key's count
//! - **No global state**: every store is an explicit, independently configured instance
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SlidingWindowStore                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────┐   │
//! │  │ Key Directory │──▶│ Per-Key Mutex │──▶│   EventLog    │   │
//! │  │   (DashMap)   │   │ (one per key) │   │  (VecDeque)   │   │
//! │  └───────────────┘   └───────────────┘   └───────────────┘   │
//! │          │                                       │           │
//! │          ▼                                       ▼           │
//! │  ┌───────────────┐                       ┌───────────────┐   │
//! │  │  StoreStats   │                       │   Eviction    │   │
//! │  │  (counters)   │                       │ (front prefix)│   │
//! │  └───────────────┘                       └───────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`pipeline`] module holds the batch cleaning and metric stages that
//! run over static ad-event tables; they share no state with the store.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use click_feature_store::SlidingWindowStore;
//!
//! let store = SlidingWindowStore::new(Duration::days(30)).unwrap();
//! let now = Utc.with_ymd_and_hms(2025, 12, 13, 0, 0, 0).unwrap();
//!
//! store.record("user1".to_string(), now - Duration::days(1)).unwrap();
//! store.record("user1".to_string(), now - Duration::days(31)).unwrap();
//!
//! assert_eq!(store.query("user1", now), 1);
//! assert_eq!(store.query("user2", now), 0);
//! ```

pub mod config;
pub mod core;
pub mod pipeline;
pub mod telemetry;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use self::core::{
    EmptyKeyPolicy, EventLog, OrderingPolicy, SlidingWindowStore, StoreError, StoreOptions,
};
pub use pipeline::PipelineError;
pub use telemetry::{StatsSnapshot, StoreStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
