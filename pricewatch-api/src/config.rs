//! Server configuration
//!
//! Read from environment variables once at startup; `main` loads `.env`
//! first so a local file can supply them.

use pricewatch_cryptocompare::CRYPTOCOMPARE_API_BASE;
use pricewatch_services::DEFAULT_REFRESH_INTERVAL_SECS;
use std::env;

const DEFAULT_DB_PATH: &str = "data/prices.db";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CURRENCY: &str = "USD";

/// Configuration for the API server
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// SQLite file holding tickers and snapshots
    pub db_path: String,
    pub port: u16,
    /// Seconds between scheduled refreshes
    pub refresh_interval_secs: u64,
    /// Currency all prices are quoted in
    pub quote_currency: String,
    /// Tickers registered at startup, before the first refresh
    pub tracked_tickers: Vec<String>,
    pub cryptocompare_base_url: String,
    pub cryptocompare_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            port: DEFAULT_PORT,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            quote_currency: DEFAULT_CURRENCY.to_string(),
            tracked_tickers: Vec::new(),
            cryptocompare_base_url: CRYPTOCOMPARE_API_BASE.to_string(),
            cryptocompare_api_key: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - PRICEWATCH_DB_PATH
    /// - SERVER_PORT
    /// - REFRESH_INTERVAL_SECS
    /// - QUOTE_CURRENCY
    /// - TRACKED_TICKERS: comma-separated symbols
    /// - CRYPTOCOMPARE_BASE_URL
    /// - CRYPTOCOMPARE_API_KEY
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match var("SERVER_PORT") {
            Some(raw) => parse_number("SERVER_PORT", &raw)?,
            None => defaults.port,
        };

        let refresh_interval_secs = match var("REFRESH_INTERVAL_SECS") {
            Some(raw) => parse_number("REFRESH_INTERVAL_SECS", &raw)?,
            None => defaults.refresh_interval_secs,
        };
        if refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "REFRESH_INTERVAL_SECS",
                error: "must be greater than zero".to_string(),
            });
        }

        let quote_currency = match var("QUOTE_CURRENCY") {
            Some(raw) => parse_currency(&raw)?,
            None => defaults.quote_currency,
        };

        let tracked_tickers = var("TRACKED_TICKERS")
            .map(|raw| parse_tickers(&raw))
            .unwrap_or_default();

        Ok(Self {
            db_path: var("PRICEWATCH_DB_PATH").unwrap_or(defaults.db_path),
            port,
            refresh_interval_secs,
            quote_currency,
            tracked_tickers,
            cryptocompare_base_url: var("CRYPTOCOMPARE_BASE_URL")
                .unwrap_or(defaults.cryptocompare_base_url),
            cryptocompare_api_key: var("CRYPTOCOMPARE_API_KEY"),
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        error: format!("{:?}: {}", raw, e),
    })
}

fn parse_currency(raw: &str) -> Result<String, ConfigError> {
    let valid = (2..=10).contains(&raw.len()) && raw.chars().all(|c| c.is_ascii_alphabetic());
    if !valid {
        return Err(ConfigError::Invalid {
            field: "QUOTE_CURRENCY",
            error: format!("{:?} is not a currency code", raw),
        });
    }
    Ok(raw.to_ascii_uppercase())
}

/// Split a comma-separated ticker list, dropping blanks and case-insensitive
/// repeats
fn parse_tickers(raw: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for ticker in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tickers.iter().any(|t| t.eq_ignore_ascii_case(ticker)) {
            tickers.push(ticker.to_ascii_uppercase());
        }
    }
    tickers
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {error}")]
    Invalid { field: &'static str, error: String },
}
