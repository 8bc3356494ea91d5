//! Snapshot store abstraction

use async_trait::async_trait;

use crate::error::PricewatchResult;
use crate::snapshot::{Aggregate, AggregateView, PriceSnapshot};

/// Append-only persistence of price snapshots and owner of the tracked
/// ticker set.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Every tracked ticker
    async fn list_tracked_tickers(&self) -> PricewatchResult<Vec<String>>;

    /// Append snapshots, registering their tickers as tracked.
    ///
    /// Rows are written independently. Rows that fail are reported together
    /// as a `PartialFailure`; rows already written stay written.
    async fn write_snapshots(&self, snapshots: &[PriceSnapshot]) -> PricewatchResult<()>;

    /// Reduce the full history of each ticker in `tickers`.
    ///
    /// Tickers without snapshots are absent from the result.
    async fn query_aggregate(
        &self,
        aggregate: Aggregate,
        tickers: &[String],
    ) -> PricewatchResult<Vec<AggregateView>>;

    /// Latest snapshot for `ticker`, or `NotFound`
    async fn query_single_last(&self, ticker: &str) -> PricewatchResult<PriceSnapshot>;

    /// Track `ticker` without writing a snapshot. Returns `true` when it was
    /// not tracked before.
    async fn register_or_noop(&self, ticker: &str) -> PricewatchResult<bool>;

    async fn query_last(&self, tickers: &[String]) -> PricewatchResult<Vec<AggregateView>> {
        self.query_aggregate(Aggregate::Last, tickers).await
    }

    async fn query_average(&self, tickers: &[String]) -> PricewatchResult<Vec<AggregateView>> {
        self.query_aggregate(Aggregate::Average, tickers).await
    }

    async fn query_min(&self, tickers: &[String]) -> PricewatchResult<Vec<AggregateView>> {
        self.query_aggregate(Aggregate::Min, tickers).await
    }

    async fn query_max(&self, tickers: &[String]) -> PricewatchResult<Vec<AggregateView>> {
        self.query_aggregate(Aggregate::Max, tickers).await
    }
}
