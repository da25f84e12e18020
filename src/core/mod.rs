//! Core functionality for the click feature store.
//!
//! This module contains:
//! - Per-key event logs and the eviction procedure
//! - The concurrent sliding-window store built on top of them

pub mod event_log;
pub mod store;

// Re-export commonly used types
pub use event_log::{eviction_cutoff, EventLog};
pub use store::{EmptyKeyPolicy, OrderingPolicy, SlidingWindowStore, StoreError, StoreOptions};
