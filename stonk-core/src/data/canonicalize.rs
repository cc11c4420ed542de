//! Column canonicalization shared by the archive reader and the remote fetcher.
//!
//! Both sources deliver CSV-like tables with slightly different headers
//! (`<DATE>` vs `Date`, `<VOL>` vs `Volume`). Headers are stripped of their
//! decoration, upper-cased and mapped onto one canonical column set.

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::domain::{Periodicity, PriceRow};

pub const DATE: &str = "DATE";
pub const OPEN: &str = "OPEN";
pub const HIGH: &str = "HIGH";
pub const LOW: &str = "LOW";
pub const CLOSE: &str = "CLOSE";
pub const VOLUME: &str = "VOLUME";
pub const PER: &str = "PER";

/// Canonical name for a raw column header.
pub fn normalize_column(raw: &str) -> String {
    let stripped: String = raw
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .collect();
    let upper = stripped.trim().to_ascii_uppercase();
    match upper.as_str() {
        "VOL" => VOLUME.to_string(),
        _ => upper,
    }
}

/// Positions of the canonical columns within a header row.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    per: Option<usize>,
}

impl ColumnIndex {
    /// Resolve canonical columns from a raw header. Fails naming the first missing column.
    pub fn from_headers(headers: &StringRecord) -> Result<Self, String> {
        let names: Vec<String> = headers.iter().map(normalize_column).collect();
        let find = |name: &str| names.iter().position(|n| n == name);
        let require = |name: &str| find(name).ok_or_else(|| format!("missing column '{name}'"));

        Ok(Self {
            date: require(DATE)?,
            open: require(OPEN)?,
            high: require(HIGH)?,
            low: require(LOW)?,
            close: require(CLOSE)?,
            volume: find(VOLUME),
            per: find(PER),
        })
    }

    /// Periodicity marker of a record, when the table carries a `PER` column.
    pub fn periodicity(&self, record: &StringRecord) -> Option<Periodicity> {
        self.per
            .and_then(|i| record.get(i))
            .and_then(Periodicity::from_archive_marker)
    }

    /// Convert one record into a row. Rows without a parsable date are rejected.
    pub fn row(&self, record: &StringRecord, periodicity: Periodicity) -> Result<PriceRow, String> {
        let field = |i: usize| record.get(i).unwrap_or("");
        let raw_date = field(self.date);
        let date = parse_date(raw_date).ok_or_else(|| format!("unparsable date '{raw_date}'"))?;

        Ok(PriceRow {
            date,
            open: parse_price(field(self.open)),
            high: parse_price(field(self.high)),
            low: parse_price(field(self.low)),
            close: parse_price(field(self.close)),
            volume: self.volume.map(|i| parse_volume(field(i))).unwrap_or(0),
            periodicity,
        })
    }
}

/// Parse `YYYYMMDD`, `YYYY-MM-DD`, or a `YYYY-MM-DD HH:MM:SS` timestamp down to its day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Coerce a price cell; anything unparsable becomes NaN.
pub fn parse_price(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Coerce a volume cell; empty or unparsable cells become zero.
pub fn parse_volume(raw: &str) -> u64 {
    let raw = raw.trim();
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
        .unwrap_or(0)
}
