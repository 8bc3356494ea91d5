//! CryptoCompare API client
//!
//! Fetches spot prices from the CryptoCompare REST API.

use async_trait::async_trait;
use pricewatch_core::{PricewatchError, PricewatchResult, QuoteSource, Quotes};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::types::parse_price_multi;

/// Base URL for the CryptoCompare data API
pub const CRYPTOCOMPARE_API_BASE: &str = "https://min-api.cryptocompare.com/data";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// CryptoCompare API client
#[derive(Clone)]
pub struct CryptoCompareClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CryptoCompareClient {
    /// Create a client for the public API
    pub fn new() -> PricewatchResult<Self> {
        Self::with_base_url(CRYPTOCOMPARE_API_BASE)
    }

    /// Create a client against another base URL (a proxy or a test server)
    pub fn with_base_url(base_url: &str) -> PricewatchResult<Self> {
        Url::parse(base_url).map_err(|e| {
            PricewatchError::invalid_param(format!("Invalid CryptoCompare base URL {}: {}", base_url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PricewatchError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Send the API key with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Prices for several symbols in one currency
    #[instrument(skip(self))]
    pub async fn price_multi(&self, symbols: &[String], currency: &str) -> PricewatchResult<Quotes> {
        if symbols.is_empty() {
            return Ok(Quotes::new());
        }

        let url = format!("{}/pricemulti", self.base_url);
        let fsyms = symbols.join(",");

        debug!("Fetching CryptoCompare prices for {} in {}", fsyms, currency);

        let mut request = self
            .client
            .get(&url)
            .query(&[("fsyms", fsyms.as_str()), ("tsyms", currency)]);

        if let Some(ref key) = self.api_key {
            request = request.header("authorization", format!("Apikey {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PricewatchError::network(format!("Failed to fetch prices: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PricewatchError::network(format!("Failed to read prices response: {}", e)))?;

        if !status.is_success() {
            return Err(PricewatchError::api(
                status.as_u16(),
                format!("CryptoCompare API error: {}", body),
            ));
        }

        let quotes = parse_price_multi(&body, currency, status.as_u16())?;
        debug!("CryptoCompare returned {} of {} prices", quotes.len(), symbols.len());

        Ok(quotes)
    }
}

#[async_trait]
impl QuoteSource for CryptoCompareClient {
    async fn fetch_all(&self, tickers: &[String], currency: &str) -> PricewatchResult<Quotes> {
        self.price_multi(tickers, currency).await
    }

    async fn fetch_one(&self, ticker: &str, currency: &str) -> PricewatchResult<Quotes> {
        self.price_multi(&[ticker.to_string()], currency).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_validated() {
        assert!(CryptoCompareClient::with_base_url("not a url").is_err());

        let client = CryptoCompareClient::with_base_url("http://localhost:9000/data/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000/data");
    }

    #[tokio::test]
    async fn test_empty_symbol_list_skips_request() {
        // Unroutable base URL: any request would fail with a network error.
        let client = CryptoCompareClient::with_base_url("http://127.0.0.1:9").unwrap();
        let quotes = client.fetch_all(&[], "USD").await.unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = CryptoCompareClient::with_base_url("http://127.0.0.1:9").unwrap();
        let err = client.fetch_one("BTC", "USD").await.unwrap_err();
        assert!(matches!(err, PricewatchError::Network(_)));
    }
}
