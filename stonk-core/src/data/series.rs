//! In-memory price series for one ticker, one table per periodicity.
//!
//! Tables are only mutated through [`SeriesCache::merge`], which keeps them
//! sorted ascending by date with at most one row per date.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use crate::domain::{Interval, Periodicity, PriceRow};

#[derive(Debug, Clone, Default)]
pub struct SeriesCache {
    tables: BTreeMap<Periodicity, Vec<PriceRow>>,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `rows` to the table, re-sort by date and drop duplicate dates.
    ///
    /// Existing rows are placed before the batch and the sort is stable, so when
    /// a date is already present the resident row wins over the incoming one.
    /// Incoming rows are re-tagged with `periodicity`. Returns how many rows the
    /// table grew by.
    pub fn merge(&mut self, rows: &[PriceRow], periodicity: Periodicity) -> usize {
        let table = self.tables.entry(periodicity).or_default();
        let before = table.len();

        table.extend(rows.iter().cloned().map(|mut row| {
            row.periodicity = periodicity;
            row
        }));
        table.sort_by_key(|r| r.date);
        table.dedup_by_key(|r| r.date);

        table.len() - before
    }

    /// Rows with `start <= date <= end`.
    pub fn slice(&self, window: Interval, periodicity: Periodicity) -> Vec<PriceRow> {
        let table = self.rows(periodicity);
        let lo = table.partition_point(|r| r.date < window.start());
        let hi = table.partition_point(|r| r.date <= window.end());
        if lo >= hi {
            return Vec::new();
        }
        table[lo..hi].to_vec()
    }

    /// The full table for a periodicity (empty if nothing was merged yet).
    pub fn rows(&self, periodicity: Periodicity) -> &[PriceRow] {
        self.tables
            .get(&periodicity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self, periodicity: Periodicity) -> usize {
        self.rows(periodicity).len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(Vec::is_empty)
    }

    /// Date span of a table.
    pub fn span(&self, periodicity: Periodicity) -> Option<Interval> {
        let rows = self.rows(periodicity);
        match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => Some(Interval::new(first.date, last.date)),
            _ => None,
        }
    }

    /// Write one table as `Date,Open,High,Low,Close,Volume` CSV.
    pub fn export_csv<W: Write>(&self, periodicity: Periodicity, out: W) -> csv::Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(["Date", "Open", "High", "Low", "Close", "Volume"])?;
        for row in self.rows(periodicity) {
            writer.write_record([
                row.date.format("%Y-%m-%d").to_string(),
                row.open.to_string(),
                row.high.to_string(),
                row.low.to_string(),
                row.close.to_string(),
                row.volume.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for SeriesCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for periodicity in Periodicity::ALL {
            let rows = self.rows(periodicity);
            writeln!(f, "{periodicity} ({} rows)", rows.len())?;
            writeln!(
                f,
                "{:<12} {:>12} {:>12} {:>12} {:>12} {:>14}",
                "Date", "Open", "High", "Low", "Close", "Volume"
            )?;
            for row in rows {
                writeln!(
                    f,
                    "{:<12} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>14}",
                    row.date.format("%Y-%m-%d"),
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    row.volume
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn row(day: u32, close: f64) -> PriceRow {
        PriceRow {
            date: d(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
            periodicity: Periodicity::Daily,
        }
    }

    #[test]
    fn merge_sorts_and_dedups() {
        let mut cache = SeriesCache::new();
        let added = cache.merge(&[row(5, 1.0), row(2, 2.0), row(5, 3.0)], Periodicity::Daily);

        assert_eq!(added, 2);
        let rows = cache.rows(Periodicity::Daily);
        assert_eq!(rows[0].date, d(2));
        assert_eq!(rows[1].date, d(5));
        // first occurrence within the batch wins
        assert_eq!(rows[1].close, 1.0);
    }

    #[test]
    fn resident_row_wins_over_incoming_duplicate() {
        let mut cache = SeriesCache::new();
        cache.merge(&[row(3, 10.0)], Periodicity::Daily);
        let added = cache.merge(&[row(3, 99.0), row(4, 11.0)], Periodicity::Daily);

        assert_eq!(added, 1);
        assert_eq!(cache.rows(Periodicity::Daily)[0].close, 10.0);
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![row(1, 1.0), row(2, 2.0), row(3, 3.0)];
        let mut cache = SeriesCache::new();
        cache.merge(&batch, Periodicity::Daily);
        let once = cache.rows(Periodicity::Daily).to_vec();
        assert_eq!(cache.merge(&batch, Periodicity::Daily), 0);
        assert_eq!(cache.rows(Periodicity::Daily), once.as_slice());
    }

    #[test]
    fn tables_are_separate_per_periodicity() {
        let mut cache = SeriesCache::new();
        cache.merge(&[row(1, 1.0)], Periodicity::Monthly);

        assert_eq!(cache.len(Periodicity::Daily), 0);
        assert_eq!(cache.len(Periodicity::Monthly), 1);
        assert_eq!(cache.rows(Periodicity::Monthly)[0].periodicity, Periodicity::Monthly);
    }

    #[test]
    fn slice_is_inclusive() {
        let mut cache = SeriesCache::new();
        cache.merge(&[row(1, 1.0), row(2, 2.0), row(3, 3.0), row(4, 4.0)], Periodicity::Daily);

        let slice = cache.slice(Interval::new(d(2), d(3)), Periodicity::Daily);
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[0].date, d(2));
        assert_eq!(slice[1].date, d(3));

        assert!(cache
            .slice(Interval::new(d(10), d(20)), Periodicity::Daily)
            .is_empty());
    }

    #[test]
    fn slice_of_gap_or_deserialized_window_does_not_panic() {
        let mut cache = SeriesCache::new();
        cache.merge(&[row(1, 1.0), row(8, 8.0), row(20, 20.0)], Periodicity::Daily);

        assert!(cache
            .slice(Interval::new(d(2), d(7)), Periodicity::Daily)
            .is_empty());

        let reversed: Interval =
            serde_json::from_str(r#"{"start":"2024-01-20","end":"2024-01-05"}"#).unwrap();
        let slice = cache.slice(reversed, Periodicity::Daily);
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[0].date, d(8));
        assert_eq!(slice[1].date, d(20));
    }

    #[test]
    fn span_and_emptiness() {
        let mut cache = SeriesCache::new();
        assert!(cache.is_empty());
        assert!(cache.span(Periodicity::Daily).is_none());

        cache.merge(&[row(9, 1.0), row(4, 1.0)], Periodicity::Daily);
        assert!(!cache.is_empty());
        assert_eq!(cache.span(Periodicity::Daily), Some(Interval::new(d(4), d(9))));
    }

    #[test]
    fn export_writes_canonical_header() {
        let mut cache = SeriesCache::new();
        cache.merge(&[row(2, 1.5)], Periodicity::Daily);

        let mut buf = Vec::new();
        cache.export_csv(Periodicity::Daily, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("Date,Open,High,Low,Close,Volume\n"));
        assert!(text.contains("2024-01-02,1.5,1.5,1.5,1.5,100"));
    }
}
