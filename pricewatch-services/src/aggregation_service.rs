//! Aggregation Service
//!
//! Orchestrates refresh cycles, reconciles requested tickers against the
//! tracked set, and serves last/avg/min/max views over the snapshot history.

use chrono::{DateTime, Utc};
use pricewatch_core::{
    find_ticker, is_tracked, same_ticker, Aggregate, AggregateView, BatchFailure, PriceSnapshot,
    PricewatchError, PricewatchResult, QuoteSource, Quotes, SnapshotStore,
};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the aggregation service
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// Currency every quote is requested in
    pub currency: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
        }
    }
}

/// Ingestion and aggregation over the snapshot store.
///
/// Holds no durable state of its own; every call works on the tracked list
/// and quotes it fetched itself.
pub struct AggregationService {
    store: Arc<dyn SnapshotStore>,
    quotes: Arc<dyn QuoteSource>,
    currency: String,
    /// Serializes on-demand registration so concurrent lookups of one new
    /// ticker write a single snapshot
    registering: Mutex<()>,
}

impl AggregationService {
    /// Create a new AggregationService
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        quotes: Arc<dyn QuoteSource>,
        config: AggregationConfig,
    ) -> PricewatchResult<Self> {
        let currency = config.currency.trim().to_uppercase();
        if currency.is_empty() || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PricewatchError::invalid_param(format!(
                "quote currency must be alphabetic, got {:?}",
                config.currency
            )));
        }

        Ok(Self {
            store,
            quotes,
            currency,
            registering: Mutex::new(()),
        })
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Fetch current prices for every tracked ticker and store them.
    ///
    /// Tickers whose price cannot be turned into a snapshot, or whose row
    /// fails to write, are reported together in a `PartialFailure` after the
    /// rest have been written.
    #[instrument(skip(self, cancel))]
    pub async fn refresh(&self, cancel: &CancellationToken) -> PricewatchResult<()> {
        let tickers = self.tracked(cancel).await?;
        if tickers.is_empty() {
            debug!("No tracked tickers, skipping refresh");
            return Ok(());
        }

        let quotes = cancellable(cancel, self.quotes.fetch_all(&tickers, &self.currency))
            .await
            .map_err(|e| {
                let err = PricewatchError::wrap_internal("fetch current quotes", e);
                error!("{}", err);
                err
            })?;

        debug!("Quote source priced {}/{} tickers", quotes.len(), tickers.len());

        let (snapshots, mut failures) = build_snapshots(quotes, Utc::now());
        let mut written = snapshots.len();

        if !snapshots.is_empty() {
            match cancellable(cancel, self.store.write_snapshots(&snapshots)).await {
                Ok(()) => {}
                Err(PricewatchError::PartialFailure(batch)) => {
                    written = written.saturating_sub(batch.len());
                    failures.failures.extend(batch.failures);
                }
                Err(PricewatchError::Cancelled) => return Err(PricewatchError::Cancelled),
                Err(e) => {
                    for failure in &failures.failures {
                        warn!("Skipped ticker {}", failure);
                    }
                    let err = PricewatchError::wrap_internal("write snapshots", e);
                    error!("{}", err);
                    return Err(err);
                }
            }
        }

        if failures.is_empty() {
            info!("Refresh stored {} snapshots", written);
            Ok(())
        } else {
            let err = PricewatchError::PartialFailure(failures);
            error!("Refresh stored {} snapshots with failures: {}", written, err);
            Err(err)
        }
    }

    /// Latest snapshot for `title`, registering it on demand.
    ///
    /// A tracked ticker with history is answered from the store. Anything
    /// else (untracked, or seeded but never priced) is priced once, stored,
    /// and returned; from then on it has history.
    #[instrument(skip(self, cancel))]
    pub async fn get_ticker(
        &self,
        cancel: &CancellationToken,
        title: &str,
    ) -> PricewatchResult<PriceSnapshot> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PricewatchError::invalid_param("ticker must not be empty"));
        }

        let tracked = self.tracked(cancel).await?;

        if let Some(idx) = find_ticker(title, &tracked) {
            let ticker = &tracked[idx];
            if let Some(snapshot) = self.latest_snapshot(cancel, ticker).await? {
                return Ok(snapshot);
            }
            debug!("Ticker {} is tracked but has not been priced yet", ticker);
        }

        self.register_missing_ticker(cancel, title).await
    }

    /// Latest stored snapshot, `None` when the ticker has no history
    async fn latest_snapshot(
        &self,
        cancel: &CancellationToken,
        ticker: &str,
    ) -> PricewatchResult<Option<PriceSnapshot>> {
        match cancellable(cancel, self.store.query_single_last(ticker)).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(PricewatchError::NotFound(_)) => Ok(None),
            Err(e) => Err(PricewatchError::wrap_internal(
                format!("get last snapshot for {}", ticker),
                e,
            )),
        }
    }

    async fn register_missing_ticker(
        &self,
        cancel: &CancellationToken,
        title: &str,
    ) -> PricewatchResult<PriceSnapshot> {
        let _registering = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PricewatchError::Cancelled),
            guard = self.registering.lock() => guard,
        };

        // Another lookup may have stored it while this one waited.
        if let Some(snapshot) = self.latest_snapshot(cancel, title).await? {
            return Ok(snapshot);
        }

        debug!("Ticker {} has no history, fetching a quote", title);

        let quotes = cancellable(cancel, self.quotes.fetch_one(title, &self.currency))
            .await
            .map_err(|e| PricewatchError::wrap_internal(format!("fetch quote for {}", title), e))?;

        let (symbol, cost) = quotes
            .into_iter()
            .find(|(symbol, _)| same_ticker(symbol, title))
            .ok_or_else(|| {
                PricewatchError::not_found(format!(
                    "no {} price available for ticker {}",
                    self.currency, title
                ))
            })?;

        let snapshot = PriceSnapshot::new(symbol, cost, Utc::now())?;

        cancellable(
            cancel,
            self.store.write_snapshots(std::slice::from_ref(&snapshot)),
        )
        .await
        .map_err(|e| {
            PricewatchError::wrap_internal(format!("write snapshot for {}", snapshot.short_title), e)
        })?;

        info!("Now tracking ticker {} at {}", snapshot.short_title, snapshot.cost);
        Ok(snapshot)
    }

    /// Most recent snapshot per tracked ticker
    pub async fn get_last(&self, cancel: &CancellationToken) -> PricewatchResult<Vec<AggregateView>> {
        self.get_aggregate(cancel, Aggregate::Last).await
    }

    /// Mean cost per tracked ticker over its full history
    pub async fn get_average(
        &self,
        cancel: &CancellationToken,
    ) -> PricewatchResult<Vec<AggregateView>> {
        self.get_aggregate(cancel, Aggregate::Average).await
    }

    pub async fn get_min(&self, cancel: &CancellationToken) -> PricewatchResult<Vec<AggregateView>> {
        self.get_aggregate(cancel, Aggregate::Min).await
    }

    pub async fn get_max(&self, cancel: &CancellationToken) -> PricewatchResult<Vec<AggregateView>> {
        self.get_aggregate(cancel, Aggregate::Max).await
    }

    /// Reduce the history of every tracked ticker.
    ///
    /// At most one view per ticker comes back, and only for tickers in the
    /// tracked set; tickers without history are absent.
    #[instrument(skip(self, cancel))]
    pub async fn get_aggregate(
        &self,
        cancel: &CancellationToken,
        aggregate: Aggregate,
    ) -> PricewatchResult<Vec<AggregateView>> {
        let tracked = self.tracked(cancel).await?;
        if tracked.is_empty() {
            return Ok(Vec::new());
        }

        let query = match aggregate {
            Aggregate::Last => self.store.query_last(&tracked),
            Aggregate::Average => self.store.query_average(&tracked),
            Aggregate::Min => self.store.query_min(&tracked),
            Aggregate::Max => self.store.query_max(&tracked),
        };

        let views = cancellable(cancel, query).await.map_err(|e| {
            let err = PricewatchError::wrap_internal(format!("query {} prices", aggregate), e);
            error!("{}", err);
            err
        })?;

        Ok(reconcile_views(views, &tracked))
    }

    /// Every tracked ticker
    pub async fn tracked_tickers(&self, cancel: &CancellationToken) -> PricewatchResult<Vec<String>> {
        self.tracked(cancel).await
    }

    /// Add tickers to the tracked set without pricing them; the next refresh
    /// cycle picks them up. Returns how many were new.
    pub async fn track(&self, cancel: &CancellationToken, tickers: &[String]) -> PricewatchResult<usize> {
        let mut added = 0;
        for ticker in tickers {
            let ticker = ticker.trim();
            if ticker.is_empty() {
                continue;
            }

            let registered = cancellable(cancel, self.store.register_or_noop(ticker))
                .await
                .map_err(|e| PricewatchError::wrap_internal(format!("register ticker {}", ticker), e))?;

            if registered {
                info!("Registered ticker {}", ticker);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn tracked(&self, cancel: &CancellationToken) -> PricewatchResult<Vec<String>> {
        cancellable(cancel, self.store.list_tracked_tickers())
            .await
            .map_err(|e| {
                let err = PricewatchError::wrap_internal("list tracked tickers", e);
                error!("{}", err);
                err
            })
    }
}

/// Race a collaborator call against cancellation
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> PricewatchResult<T>
where
    F: Future<Output = PricewatchResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PricewatchError::Cancelled),
        result = fut => result,
    }
}

/// Turn fetched quotes into snapshots, in ticker order.
///
/// Quotes that do not make a valid snapshot are collected as failures.
fn build_snapshots(quotes: Quotes, observed_at: DateTime<Utc>) -> (Vec<PriceSnapshot>, BatchFailure) {
    let mut quotes: Vec<_> = quotes.into_iter().collect();
    quotes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut snapshots = Vec::with_capacity(quotes.len());
    let mut failures = BatchFailure::new();

    for (ticker, cost) in quotes {
        match PriceSnapshot::new(ticker.clone(), cost, observed_at) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => {
                warn!("Rejected quote for {}: {}", ticker, e);
                failures.push(ticker, e);
            }
        }
    }

    (snapshots, failures)
}

/// Keep the first view per ticker, and only for tracked tickers
fn reconcile_views(views: Vec<AggregateView>, tracked: &[String]) -> Vec<AggregateView> {
    let mut seen = HashSet::new();
    views
        .into_iter()
        .filter(|view| is_tracked(&view.short_title, tracked))
        .filter(|view| seen.insert(view.short_title.to_ascii_uppercase()))
        .collect()
}
