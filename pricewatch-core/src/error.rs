//! Error types for pricewatch

use std::fmt;

use thiserror::Error;

/// Coarse classification of a [`PricewatchError`], used by the HTTP boundary
/// to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParam,
    NotFound,
    Internal,
    Cancelled,
}

/// Pricewatch-wide error type
#[derive(Error, Debug)]
pub enum PricewatchError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Partial failure: {0}")]
    PartialFailure(BatchFailure),

    #[error("Operation cancelled")]
    Cancelled,
}

impl PricewatchError {
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        PricewatchError::InvalidParam(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        PricewatchError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PricewatchError::Internal(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        PricewatchError::Network(msg.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        PricewatchError::Api {
            status,
            message: message.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        PricewatchError::Parse(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        PricewatchError::Database(msg.into())
    }

    /// Wrap a downstream failure as `Internal`, keeping its message.
    ///
    /// `Cancelled` passes through untouched so callers can still tell a
    /// cancelled operation from a failed one.
    pub fn wrap_internal(context: impl fmt::Display, err: PricewatchError) -> Self {
        match err {
            PricewatchError::Cancelled => PricewatchError::Cancelled,
            other => PricewatchError::Internal(format!("{}: {}", context, other)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PricewatchError::InvalidParam(_) => ErrorKind::InvalidParam,
            PricewatchError::NotFound(_) => ErrorKind::NotFound,
            PricewatchError::Cancelled => ErrorKind::Cancelled,
            PricewatchError::Internal(_)
            | PricewatchError::Network(_)
            | PricewatchError::Api { .. }
            | PricewatchError::Parse(_)
            | PricewatchError::Database(_)
            | PricewatchError::PartialFailure(_) => ErrorKind::Internal,
        }
    }

    /// Per-ticker causes when this is a partial batch failure.
    pub fn failures(&self) -> &[TickerFailure] {
        match self {
            PricewatchError::PartialFailure(batch) => &batch.failures,
            _ => &[],
        }
    }
}

/// One ticker that could not be converted or written within a batch.
#[derive(Debug)]
pub struct TickerFailure {
    pub ticker: String,
    pub error: PricewatchError,
}

impl fmt::Display for TickerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.ticker, self.error)
    }
}

/// Failures collected while processing a batch of tickers.
///
/// The tickers that succeeded are not listed here; they were processed
/// normally.
#[derive(Debug, Default)]
pub struct BatchFailure {
    pub failures: Vec<TickerFailure>,
}

impl BatchFailure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ticker: impl Into<String>, error: PricewatchError) {
        self.failures.push(TickerFailure {
            ticker: ticker.into(),
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.ticker.as_str())
    }

    /// `Ok(())` when nothing failed, otherwise a `PartialFailure`.
    pub fn into_result(self) -> PricewatchResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PricewatchError::PartialFailure(self))
        }
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

/// Result type alias for pricewatch operations
pub type PricewatchResult<T> = Result<T, PricewatchError>;
