//! Batch stages that run beside the feature store.
//!
//! Both stages work on static CSV tables and never read from or write to a
//! [`SlidingWindowStore`](crate::core::SlidingWindowStore):
//! - cleaning raw ad events into a validated table with derived indicators
//! - aggregating cleaned events into per-ad metrics

pub mod cleaning;
pub mod io;
pub mod metrics;
pub mod records;

pub use cleaning::{clean_ad_events, CleaningReport};
pub use io::{read_csv, read_rows, write_csv, write_rows, PipelineError};
pub use metrics::compute_ad_metrics;
pub use records::{parse_timestamp, AdEvent, AdMetrics, CleanedEvent, KeyedEvent};
