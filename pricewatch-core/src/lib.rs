//! Core types for Pricewatch
//!
//! This crate defines the shared data structures and the collaborator
//! traits used across the workspace: price snapshots, aggregate views,
//! the error type, and the quote source and snapshot store abstractions.

pub mod error;
pub mod quote;
pub mod snapshot;
pub mod store;
pub mod ticker;

pub use error::{BatchFailure, ErrorKind, PricewatchError, PricewatchResult, TickerFailure};
pub use quote::{QuoteSource, Quotes};
pub use snapshot::{Aggregate, AggregateView, PriceSnapshot};
pub use store::SnapshotStore;
pub use ticker::{find_ticker, is_tracked, same_ticker};
