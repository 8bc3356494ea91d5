//! Business logic services for Pricewatch
//!
//! Persists price snapshots in SQLite, serves aggregate views over them, and
//! keeps them fresh on a fixed schedule.

pub mod aggregation_service;
pub mod refresh_scheduler;
pub mod snapshot_storage;

#[cfg(test)]
mod test_support;

pub use aggregation_service::{AggregationConfig, AggregationService};
pub use refresh_scheduler::{
    RefreshOutcome, RefreshScheduler, RefreshSchedulerConfig, RefreshStatus,
    DEFAULT_REFRESH_INTERVAL_SECS,
};
pub use snapshot_storage::{SnapshotStorage, SnapshotStorageError};
