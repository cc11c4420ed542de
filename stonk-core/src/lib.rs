//! Stonk Core: price-series retrieval for equity tickers.
//!
//! This crate contains:
//! - Domain types (price rows, periodicity, date intervals, ticker identity)
//! - The Stooq quote provider and the local flat-file archive reader
//! - The per-ticker series cache and range ledger
//! - The `Stonk` entity whose resolver picks cache, archive or remote per request
//! - A quota-gated EODHD fundamentals client
//! - A directory inventory scanner

pub mod clock;
pub mod config;
pub mod data;
pub mod domain;
pub mod fundamentals;
pub mod inventory;
pub mod stonk;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, FundamentalsConfig, StonkConfig};
pub use data::{DataError, DataSource, QuoteProvider};
pub use domain::{Interval, Periodicity, PriceRow, TickerId};
pub use stonk::{EntityState, Market, Resolution, Stonk};
