//! Quote source abstraction

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::PricewatchResult;

/// Prices keyed by ticker, in the requested currency
pub type Quotes = HashMap<String, f64>;

/// A provider of current spot prices.
///
/// Implementations may leave out tickers they cannot price. They return an
/// error only when the request itself fails (transport or protocol).
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Current prices for every ticker in `tickers` the source knows about
    async fn fetch_all(&self, tickers: &[String], currency: &str) -> PricewatchResult<Quotes>;

    /// Current price for a single ticker
    async fn fetch_one(&self, ticker: &str, currency: &str) -> PricewatchResult<Quotes>;
}
