//! Refresh Scheduler
//!
//! Drives `AggregationService::refresh` on a fixed period. At most one
//! refresh runs at a time; a tick or manual trigger that arrives while one is
//! in flight is skipped rather than queued.

use crate::aggregation_service::AggregationService;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pricewatch_core::PricewatchError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default refresh period (5 minutes)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Configuration for the refresh scheduler
#[derive(Debug, Clone)]
pub struct RefreshSchedulerConfig {
    /// Seconds between refresh cycles
    pub interval_secs: u64,
}

impl Default for RefreshSchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

/// How a single refresh attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshOutcome {
    Completed,
    /// Refresh ran and returned an error (including partial failures)
    Failed,
    /// Another refresh was still running
    Skipped,
    Cancelled,
}

/// Snapshot of scheduler activity, served by the health endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStatus {
    pub running: bool,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub cycles_skipped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<RefreshOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub struct RefreshScheduler {
    service: Arc<AggregationService>,
    config: RefreshSchedulerConfig,
    running: AtomicBool,
    status: RwLock<RefreshStatus>,
}

impl RefreshScheduler {
    pub fn new(service: Arc<AggregationService>, config: RefreshSchedulerConfig) -> Self {
        Self {
            service,
            config,
            running: AtomicBool::new(false),
            status: RwLock::new(RefreshStatus::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn status(&self) -> RefreshStatus {
        let mut status = self.status.read().clone();
        status.running = self.is_running();
        status
    }

    /// Run one refresh now unless one is already in flight
    pub async fn trigger(&self, cancel: &CancellationToken) -> RefreshOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            debug!("Refresh already in progress, skipping");
            self.status.write().cycles_skipped += 1;
            return RefreshOutcome::Skipped;
        };

        let result = self.service.refresh(cancel).await;

        let mut status = self.status.write();
        let outcome = match result {
            Ok(()) => {
                status.cycles_completed += 1;
                status.last_error = None;
                RefreshOutcome::Completed
            }
            Err(PricewatchError::Cancelled) => {
                warn!("Refresh cancelled");
                RefreshOutcome::Cancelled
            }
            Err(e) => {
                error!("Refresh failed: {}", e);
                status.cycles_failed += 1;
                status.last_error = Some(e.to_string());
                RefreshOutcome::Failed
            }
        };
        status.last_outcome = Some(outcome);
        status.last_finished_at = Some(Utc::now());

        outcome
    }

    /// Refresh on every tick until `cancel` fires.
    ///
    /// The first tick is immediate. Each cycle runs in its own task so a slow
    /// quote source never delays the clock.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        info!("Starting refresh scheduler with {}s interval", period.as_secs());

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Refresh scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let scheduler = Arc::clone(&self);
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        scheduler.trigger(&cancel).await;
                    });
                }
            }
        }
    }
}

/// Holds the single-flight flag; releases it on drop
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
