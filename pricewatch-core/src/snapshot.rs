//! Price snapshots and the aggregate views derived from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PricewatchError, PricewatchResult};

/// One immutable price observation for a ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Long asset name (e.g., "Bitcoin"), when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Ticker symbol (e.g., "BTC")
    pub short_title: String,

    /// Price in the configured quote currency
    pub cost: f64,

    /// When the price was observed
    pub observed_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Create a snapshot, rejecting an empty ticker and negative or
    /// non-finite prices.
    pub fn new(
        short_title: impl Into<String>,
        cost: f64,
        observed_at: DateTime<Utc>,
    ) -> PricewatchResult<Self> {
        let short_title = short_title.into();

        if short_title.trim().is_empty() {
            return Err(PricewatchError::invalid_param("ticker must not be empty"));
        }

        if !cost.is_finite() || cost < 0.0 {
            return Err(PricewatchError::invalid_param(format!(
                "cost for {} must be a non-negative number, got {}",
                short_title, cost
            )));
        }

        Ok(Self {
            title: None,
            short_title,
            cost,
            observed_at,
        })
    }

    /// Attach the long asset name
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Reduction applied over a ticker's snapshot history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    /// Snapshot with the greatest `observed_at`
    Last,
    /// Arithmetic mean of all costs
    #[serde(rename = "avg")]
    Average,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Last => "last",
            Aggregate::Average => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last" => Ok(Aggregate::Last),
            "avg" | "average" => Ok(Aggregate::Average),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            _ => Err(format!("Unknown aggregate: {}", s)),
        }
    }
}

/// A read-only projection of one ticker's history, computed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateView {
    pub short_title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub aggregate: Aggregate,

    /// Reduced cost
    pub value: f64,

    /// Number of snapshots the value was computed from
    pub samples: u64,

    /// Time of the selected snapshot for `Last`, otherwise of the newest
    /// snapshot considered
    pub observed_at: DateTime<Utc>,
}
