//! CryptoCompare API response types
//!
//! `pricemulti` answers with a map of symbol to a map of currency to price,
//! or with an error envelope carrying `"Response": "Error"`.

use pricewatch_core::{PricewatchError, Quotes};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Error envelope returned with HTTP 200 when a request is rejected
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "Response")]
    pub response: String,

    #[serde(rename = "Message", default)]
    pub message: String,
}

impl ErrorEnvelope {
    pub fn is_error(&self) -> bool {
        self.response.eq_ignore_ascii_case("error")
    }
}

/// Raw response from GET /pricemulti
pub type PriceMultiResponse = HashMap<String, HashMap<String, Value>>;

/// Parse a `pricemulti` body into prices quoted in `currency`.
///
/// A symbol without a price in `currency` is left out. A price that is not
/// a number fails the whole response.
pub fn parse_price_multi(body: &str, currency: &str, status: u16) -> Result<Quotes, PricewatchError> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if envelope.is_error() {
            return Err(PricewatchError::api(status, envelope.message));
        }
    }

    let raw: PriceMultiResponse = serde_json::from_str(body)
        .map_err(|e| PricewatchError::parse(format!("Failed to parse pricemulti response: {}", e)))?;

    let mut quotes = Quotes::with_capacity(raw.len());
    for (symbol, prices) in raw {
        let Some(price) = prices
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(currency))
            .map(|(_, price)| price)
        else {
            continue;
        };

        let cost = price.as_f64().ok_or_else(|| {
            PricewatchError::parse(format!(
                "Price for {} in {} is not a number: {}",
                symbol, currency, price
            ))
        })?;

        quotes.insert(symbol, cost);
    }

    Ok(quotes)
}
