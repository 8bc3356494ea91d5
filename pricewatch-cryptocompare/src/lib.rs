//! CryptoCompare integration for Pricewatch
//!
//! This crate provides a client for the CryptoCompare `pricemulti` REST
//! endpoint and implements the `QuoteSource` trait on top of it.

pub mod client;
pub mod types;

pub use client::{CryptoCompareClient, CRYPTOCOMPARE_API_BASE};
