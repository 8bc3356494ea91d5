//! End-to-end refresh and aggregation over an in-memory SQLite store

use async_trait::async_trait;
use parking_lot::Mutex;
use pricewatch_core::{ErrorKind, PricewatchResult, QuoteSource, Quotes, SnapshotStore};
use pricewatch_services::{
    AggregationConfig, AggregationService, RefreshOutcome, RefreshScheduler,
    RefreshSchedulerConfig, SnapshotStorage,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Serves one scripted set of prices per call, repeating the last
struct ScriptedQuotes {
    rounds: Mutex<Vec<Vec<(&'static str, f64)>>>,
}

impl ScriptedQuotes {
    fn new(mut rounds: Vec<Vec<(&'static str, f64)>>) -> Self {
        rounds.reverse();
        Self {
            rounds: Mutex::new(rounds),
        }
    }

    fn next(&self) -> Quotes {
        let mut rounds = self.rounds.lock();
        let round = if rounds.len() > 1 {
            rounds.pop().unwrap_or_default()
        } else {
            rounds.last().cloned().unwrap_or_default()
        };
        round.into_iter().map(|(t, c)| (t.to_string(), c)).collect()
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuotes {
    async fn fetch_all(&self, tickers: &[String], _currency: &str) -> PricewatchResult<Quotes> {
        Ok(self
            .next()
            .into_iter()
            .filter(|(t, _)| tickers.iter().any(|r| r.eq_ignore_ascii_case(t)))
            .collect())
    }

    async fn fetch_one(&self, ticker: &str, _currency: &str) -> PricewatchResult<Quotes> {
        // Let concurrent lookups interleave around the quote request.
        tokio::task::yield_now().await;
        Ok(self
            .next()
            .into_iter()
            .filter(|(t, _)| t.eq_ignore_ascii_case(ticker))
            .collect())
    }
}

fn setup(
    rounds: Vec<Vec<(&'static str, f64)>>,
) -> (Arc<SnapshotStorage>, Arc<AggregationService>) {
    let storage = Arc::new(SnapshotStorage::new_in_memory().unwrap());
    let quotes = Arc::new(ScriptedQuotes::new(rounds));
    let service = AggregationService::new(
        storage.clone(),
        quotes,
        AggregationConfig::default(),
    )
    .unwrap();
    (storage, Arc::new(service))
}

#[tokio::test]
async fn test_refresh_cycles_build_history() {
    let (storage, service) = setup(vec![
        vec![("BTC", 10.0), ("ETH", 1.0)],
        vec![("BTC", 30.0), ("ETH", 3.0)],
        vec![("BTC", 20.0), ("ETH", 2.0)],
    ]);
    let cancel = CancellationToken::new();

    service
        .track(&cancel, &["BTC".to_string(), "ETH".to_string()])
        .await
        .unwrap();

    for _ in 0..3 {
        service.refresh(&cancel).await.unwrap();
    }

    assert_eq!(storage.get_snapshot_count("BTC").unwrap(), 3);
    assert_eq!(storage.get_snapshot_count("ETH").unwrap(), 3);

    let last = service.get_last(&cancel).await.unwrap();
    let values: Vec<_> = last.iter().map(|v| (v.short_title.as_str(), v.value)).collect();
    assert_eq!(values, vec![("BTC", 20.0), ("ETH", 2.0)]);

    let avg = service.get_average(&cancel).await.unwrap();
    assert_eq!(avg[0].value, 20.0);
    assert_eq!(avg[0].samples, 3);

    let min = service.get_min(&cancel).await.unwrap();
    assert_eq!(min[0].value, 10.0);
    assert_eq!(min[1].value, 1.0);

    let max = service.get_max(&cancel).await.unwrap();
    assert_eq!(max[0].value, 30.0);
    assert_eq!(max[1].value, 3.0);
}

#[tokio::test]
async fn test_get_ticker_registers_then_reads_back() {
    let (storage, service) = setup(vec![vec![("ADA", 0.45)]]);
    let cancel = CancellationToken::new();

    let created = service.get_ticker(&cancel, "ada").await.unwrap();
    assert_eq!(created.short_title, "ADA");

    assert_eq!(
        storage.list_tracked_tickers().await.unwrap(),
        vec!["ADA".to_string()]
    );

    let again = service.get_ticker(&cancel, "Ada").await.unwrap();
    assert_eq!(again.cost, 0.45);
    assert_eq!(storage.get_snapshot_count("ADA").unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_ticker_is_not_tracked() {
    let (storage, service) = setup(vec![vec![("BTC", 1.0)]]);
    let cancel = CancellationToken::new();

    let err = service.get_ticker(&cancel, "NOPE").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(storage.list_tracked_tickers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_seeded_ticker_the_source_never_prices() {
    let (storage, service) = setup(vec![vec![("BTC", 65000.0)]]);
    let cancel = CancellationToken::new();

    service
        .track(&cancel, &["BTC".to_string(), "BTCC".to_string()])
        .await
        .unwrap();
    service.refresh(&cancel).await.unwrap();
    service.refresh(&cancel).await.unwrap();

    let seeded = service.get_ticker(&cancel, "BTCC").await.unwrap_err();
    let unknown = service.get_ticker(&cancel, "NOPE").await.unwrap_err();

    assert_eq!(seeded.kind(), ErrorKind::NotFound);
    assert_eq!(unknown.kind(), ErrorKind::NotFound);
    assert_eq!(storage.get_snapshot_count("BTCC").unwrap(), 0);
    assert_eq!(storage.get_snapshot_count("BTC").unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_lookups_of_new_ticker_write_once() {
    let (storage, service) = setup(vec![vec![("ADA", 0.45)]]);
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(
        service.get_ticker(&cancel, "ADA"),
        service.get_ticker(&cancel, "ada"),
    );

    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.short_title, second.short_title);
    assert_eq!(first.cost, second.cost);
    assert_eq!(storage.get_snapshot_count("ADA").unwrap(), 1);
}

#[tokio::test]
async fn test_tracked_ticker_without_price_is_absent_from_views() {
    let (_storage, service) = setup(vec![vec![("BTC", 1.0)]]);
    let cancel = CancellationToken::new();

    service
        .track(&cancel, &["BTC".to_string(), "ADA".to_string()])
        .await
        .unwrap();
    service.refresh(&cancel).await.unwrap();

    let last = service.get_last(&cancel).await.unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].short_title, "BTC");
}

#[tokio::test]
async fn test_scheduler_trigger_against_sqlite() {
    let (storage, service) = setup(vec![vec![("BTC", 1.0)]]);
    let cancel = CancellationToken::new();
    service.track(&cancel, &["BTC".to_string()]).await.unwrap();

    let scheduler = RefreshScheduler::new(service, RefreshSchedulerConfig::default());

    assert_eq!(scheduler.trigger(&cancel).await, RefreshOutcome::Completed);
    assert_eq!(scheduler.trigger(&cancel).await, RefreshOutcome::Completed);
    assert_eq!(storage.get_snapshot_count("BTC").unwrap(), 2);
    assert_eq!(scheduler.status().cycles_completed, 2);
}
