//! In-memory collaborators for service tests

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use pricewatch_core::{
    find_ticker, same_ticker, Aggregate, AggregateView, BatchFailure, PriceSnapshot,
    PricewatchError, PricewatchResult, QuoteSource, Quotes, SnapshotStore,
};
use std::collections::HashMap;
use tokio::sync::Notify;

pub fn quotes(pairs: &[(&str, f64)]) -> Quotes {
    pairs
        .iter()
        .map(|(ticker, cost)| (ticker.to_string(), *cost))
        .collect()
}

pub fn view(ticker: &str, aggregate: Aggregate, value: f64) -> AggregateView {
    AggregateView {
        short_title: ticker.to_string(),
        title: None,
        aggregate,
        value,
        samples: 1,
        observed_at: Utc::now(),
    }
}

pub enum WriteBehaviour {
    Succeed,
    FailTickers(Vec<String>),
    Fail,
}

/// Records every call; answers from canned data
pub struct FakeStore {
    tracked: Mutex<Option<Vec<String>>>,
    write: WriteBehaviour,
    last: Mutex<Vec<PriceSnapshot>>,
    views: HashMap<Aggregate, Vec<AggregateView>>,
    writes: Mutex<Vec<Vec<PriceSnapshot>>>,
    single_last_calls: Mutex<Vec<String>>,
    aggregate_calls: Mutex<Vec<(Aggregate, Vec<String>)>>,
}

impl FakeStore {
    pub fn with_tracked(tickers: &[&str]) -> Self {
        Self {
            tracked: Mutex::new(Some(tickers.iter().map(|t| t.to_string()).collect())),
            write: WriteBehaviour::Succeed,
            last: Mutex::new(Vec::new()),
            views: HashMap::new(),
            writes: Mutex::new(Vec::new()),
            single_last_calls: Mutex::new(Vec::new()),
            aggregate_calls: Mutex::new(Vec::new()),
        }
    }

    /// A store whose tracked-ticker listing always fails
    pub fn failing_list() -> Self {
        let store = Self::with_tracked(&[]);
        *store.tracked.lock() = None;
        store
    }

    pub fn with_write(mut self, write: WriteBehaviour) -> Self {
        self.write = write;
        self
    }

    pub fn with_last(self, snapshot: PriceSnapshot) -> Self {
        self.remember(snapshot);
        self
    }

    pub fn with_views(mut self, aggregate: Aggregate, views: Vec<AggregateView>) -> Self {
        self.views.insert(aggregate, views);
        self
    }

    pub fn tracked(&self) -> Vec<String> {
        self.tracked.lock().clone().unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<Vec<PriceSnapshot>> {
        self.writes.lock().clone()
    }

    pub fn single_last_calls(&self) -> Vec<String> {
        self.single_last_calls.lock().clone()
    }

    pub fn aggregate_calls(&self) -> Vec<(Aggregate, Vec<String>)> {
        self.aggregate_calls.lock().clone()
    }

    /// Track the ticker and keep the snapshot as its latest
    fn remember(&self, snapshot: PriceSnapshot) {
        self.track(&snapshot.short_title);
        let mut last = self.last.lock();
        last.retain(|s| !same_ticker(&s.short_title, &snapshot.short_title));
        last.push(snapshot);
    }

    fn track(&self, ticker: &str) -> bool {
        let mut tracked = self.tracked.lock();
        let tracked = tracked.get_or_insert_with(Vec::new);
        if find_ticker(ticker, tracked).is_some() {
            return false;
        }
        tracked.push(ticker.to_string());
        true
    }
}

#[async_trait]
impl SnapshotStore for FakeStore {
    async fn list_tracked_tickers(&self) -> PricewatchResult<Vec<String>> {
        self.tracked
            .lock()
            .clone()
            .ok_or_else(|| PricewatchError::database("tickers table is locked"))
    }

    async fn write_snapshots(&self, snapshots: &[PriceSnapshot]) -> PricewatchResult<()> {
        self.writes.lock().push(snapshots.to_vec());

        match &self.write {
            WriteBehaviour::Fail => Err(PricewatchError::database("disk I/O error")),
            WriteBehaviour::Succeed => {
                for snapshot in snapshots {
                    self.remember(snapshot.clone());
                }
                Ok(())
            }
            WriteBehaviour::FailTickers(failing) => {
                let mut failures = BatchFailure::new();
                for snapshot in snapshots {
                    if failing.iter().any(|t| same_ticker(t, &snapshot.short_title)) {
                        failures.push(
                            snapshot.short_title.clone(),
                            PricewatchError::database("constraint failed"),
                        );
                    } else {
                        self.remember(snapshot.clone());
                    }
                }
                failures.into_result()
            }
        }
    }

    async fn query_aggregate(
        &self,
        aggregate: Aggregate,
        tickers: &[String],
    ) -> PricewatchResult<Vec<AggregateView>> {
        self.aggregate_calls.lock().push((aggregate, tickers.to_vec()));
        self.views
            .get(&aggregate)
            .cloned()
            .ok_or_else(|| PricewatchError::database(format!("no {} data", aggregate)))
    }

    async fn query_single_last(&self, ticker: &str) -> PricewatchResult<PriceSnapshot> {
        self.single_last_calls.lock().push(ticker.to_string());
        self.last
            .lock()
            .iter()
            .find(|s| same_ticker(&s.short_title, ticker))
            .cloned()
            .ok_or_else(|| PricewatchError::not_found(format!("no snapshot for {}", ticker)))
    }

    async fn register_or_noop(&self, ticker: &str) -> PricewatchResult<bool> {
        Ok(self.track(ticker))
    }
}

/// Canned quote source. A gated source parks `fetch_all` until released.
pub struct FakeQuotes {
    quotes: Option<Quotes>,
    gated: bool,
    pub entered: Notify,
    pub release: Notify,
    fetch_all_calls: Mutex<Vec<Vec<String>>>,
    fetch_one_calls: Mutex<Vec<String>>,
}

impl FakeQuotes {
    pub fn returning(quotes: Quotes) -> Self {
        Self {
            quotes: Some(quotes),
            gated: false,
            entered: Notify::new(),
            release: Notify::new(),
            fetch_all_calls: Mutex::new(Vec::new()),
            fetch_one_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            quotes: None,
            ..Self::returning(Quotes::new())
        }
    }

    pub fn gated(quotes: Quotes) -> Self {
        Self {
            gated: true,
            ..Self::returning(quotes)
        }
    }

    pub fn fetch_all_calls(&self) -> Vec<Vec<String>> {
        self.fetch_all_calls.lock().clone()
    }

    pub fn fetch_one_calls(&self) -> Vec<String> {
        self.fetch_one_calls.lock().clone()
    }

    fn answer(&self) -> PricewatchResult<Quotes> {
        self.quotes
            .clone()
            .ok_or_else(|| PricewatchError::network("connection reset"))
    }
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn fetch_all(&self, tickers: &[String], _currency: &str) -> PricewatchResult<Quotes> {
        self.fetch_all_calls.lock().push(tickers.to_vec());
        if self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.answer()
    }

    async fn fetch_one(&self, ticker: &str, _currency: &str) -> PricewatchResult<Quotes> {
        self.fetch_one_calls.lock().push(ticker.to_string());
        self.answer()
    }
}
