//! PriceRow: one trading period of OHLCV data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a row aggregates one trading day or one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    Daily,
    Monthly,
}

impl Periodicity {
    pub const ALL: [Periodicity; 2] = [Periodicity::Daily, Periodicity::Monthly];

    /// Interval code used by the quote provider (`i=` query parameter).
    pub fn provider_code(self) -> &'static str {
        match self {
            Periodicity::Daily => "d",
            Periodicity::Monthly => "m",
        }
    }

    /// Parse the `PER` marker of an archive file (`D` / `M`).
    pub fn from_archive_marker(marker: &str) -> Option<Self> {
        match marker.trim().to_ascii_uppercase().as_str() {
            "D" => Some(Periodicity::Daily),
            "M" => Some(Periodicity::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Periodicity::Daily => write!(f, "daily"),
            Periodicity::Monthly => write!(f, "monthly"),
        }
    }
}

/// OHLCV record for a single period of one ticker.
///
/// Price ordering (`low <= open, close <= high`) is trusted from the source and
/// not checked here. Uniqueness of `date` is a property of the series that holds
/// the row, see [`crate::data::series::SeriesCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Zero when the provider omits volume (indices, illiquid months).
    pub volume: u64,
    pub periodicity: Periodicity,
}

impl PriceRow {
    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }
}
