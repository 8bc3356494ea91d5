//! Ticker symbol helpers

/// Case-insensitive ticker comparison.
///
/// Tickers are ASCII symbols, and the SQLite store compares with `NOCASE`,
/// which folds ASCII only; both sides must agree.
pub fn same_ticker(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Position of `ticker` in `tracked`, ignoring case
pub fn find_ticker(ticker: &str, tracked: &[String]) -> Option<usize> {
    tracked.iter().position(|t| same_ticker(ticker, t))
}

pub fn is_tracked(ticker: &str, tracked: &[String]) -> bool {
    find_ticker(ticker, tracked).is_some()
}
