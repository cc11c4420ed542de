//! EODHD fundamentals client gated by a persisted daily call quota.
//!
//! Independent of the price-series resolver. The only hard error a caller is
//! expected to handle is [`FundamentalsError::QuotaExceeded`].

pub mod client;
pub mod quota;

use std::path::PathBuf;

use thiserror::Error;

pub use client::FundamentalsClient;
pub use quota::{DaySource, QuotaTracker};

#[derive(Debug, Error)]
pub enum FundamentalsError {
    #[error("daily API call limit of {limit} reached, resets at midnight UTC-5")]
    QuotaExceeded { limit: u32 },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching fundamentals for {ticker}")]
    Status { status: u16, ticker: String },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("EODHD API key is empty")]
    MissingApiKey,
}

impl FundamentalsError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
