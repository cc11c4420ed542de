//! Range ledger: which windows have been retrieved and merged into the series cache.
//!
//! Intervals are appended as-is. There is no coalescing, so a request that
//! spans two adjacent recorded intervals is not covered.

use std::collections::BTreeMap;

use crate::domain::{Interval, Periodicity, PriceRow};

#[derive(Debug, Clone, Default)]
pub struct RangeLedger {
    recorded: BTreeMap<Periodicity, Vec<Interval>>,
}

impl RangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff a single recorded interval contains `window`.
    pub fn is_covered(&self, window: Interval, periodicity: Periodicity) -> bool {
        self.intervals(periodicity)
            .iter()
            .any(|recorded| recorded.contains(&window))
    }

    /// Record a covered window. Duplicates and overlaps are kept.
    pub fn record_covered(&mut self, window: Interval, periodicity: Periodicity) {
        self.recorded.entry(periodicity).or_default().push(window);
    }

    /// Record the date span of a just-merged batch. Empty batches record nothing.
    pub fn record_batch(&mut self, rows: &[PriceRow], periodicity: Periodicity) -> Option<Interval> {
        let span = Interval::spanning(rows)?;
        self.record_covered(span, periodicity);
        Some(span)
    }

    pub fn intervals(&self, periodicity: Periodicity) -> &[Interval] {
        self.recorded
            .get(&periodicity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn empty_ledger_covers_nothing() {
        let ledger = RangeLedger::new();
        assert!(ledger.is_empty());
        assert!(!ledger.is_covered(Interval::day(d(1)), Periodicity::Daily));
    }

    #[test]
    fn recorded_interval_covers_itself_and_subintervals() {
        let mut ledger = RangeLedger::new();
        ledger.record_covered(Interval::new(d(1), d(20)), Periodicity::Daily);

        assert!(ledger.is_covered(Interval::new(d(1), d(20)), Periodicity::Daily));
        assert!(ledger.is_covered(Interval::new(d(5), d(6)), Periodicity::Daily));
        assert!(!ledger.is_covered(Interval::new(d(5), d(21)), Periodicity::Daily));
        assert!(!ledger.is_covered(Interval::new(d(5), d(6)), Periodicity::Monthly));
    }

    #[test]
    fn adjacent_intervals_are_not_unioned() {
        let mut ledger = RangeLedger::new();
        ledger.record_covered(Interval::new(d(1), d(10)), Periodicity::Daily);
        ledger.record_covered(Interval::new(d(11), d(20)), Periodicity::Daily);

        assert!(!ledger.is_covered(Interval::new(d(5), d(15)), Periodicity::Daily));
    }

    #[test]
    fn redundant_records_are_kept() {
        let mut ledger = RangeLedger::new();
        ledger.record_covered(Interval::new(d(1), d(10)), Periodicity::Daily);
        ledger.record_covered(Interval::new(d(1), d(10)), Periodicity::Daily);
        assert_eq!(ledger.intervals(Periodicity::Daily).len(), 2);
    }

    #[test]
    fn batch_span_is_recorded() {
        let row = |date| PriceRow {
            date,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0,
            periodicity: Periodicity::Monthly,
        };
        let mut ledger = RangeLedger::new();

        assert_eq!(ledger.record_batch(&[], Periodicity::Monthly), None);
        let span = ledger.record_batch(&[row(d(31)), row(d(1))], Periodicity::Monthly);

        assert_eq!(span, Some(Interval::new(d(1), d(31))));
        assert!(ledger.is_covered(Interval::new(d(2), d(30)), Periodicity::Monthly));
    }
}
