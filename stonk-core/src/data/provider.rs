//! Quote provider trait and structured error types.
//!
//! The QuoteProvider trait abstracts over the remote quote source so the
//! resolver can be driven by a mock in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{Interval, Periodicity, PriceRow, TickerId};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no local data for {ticker}")]
    NotFound { ticker: String },

    #[error("archive file {} unreadable: {reason}", path.display())]
    ArchiveUnreadable { path: PathBuf, reason: String },

    #[error("ticker {ticker}.{country} is not in the ticker index")]
    TickerNotIndexed { ticker: String, country: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} fetching {ticker}")]
    HttpStatus { status: u16, ticker: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("no trading day within {searched_days} days of {from}")]
    NoTradingDay { from: NaiveDate, searched_days: i64 },

    #[error("I/O error: {0}")]
    Io(String),
}

impl DataError {
    /// Local-data failures that the resolver treats as "no archive available".
    pub fn is_local_miss(&self) -> bool {
        matches!(
            self,
            DataError::NotFound { .. }
                | DataError::ArchiveUnreadable { .. }
                | DataError::TickerNotIndexed { .. }
        )
    }
}

/// Where a batch of rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Archive,
    Remote,
}

/// Result of a successful remote fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub ticker: TickerId,
    pub rows: Vec<PriceRow>,
    pub source: DataSource,
}

/// Trait for remote quote providers.
///
/// Providers return rows for exactly the requested window and periodicity,
/// tagged with that periodicity. They know nothing about the series cache.
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch OHLCV rows for a ticker over an inclusive window.
    fn fetch(
        &self,
        ticker: &TickerId,
        window: Interval,
        periodicity: Periodicity,
    ) -> Result<FetchResult, DataError>;
}
