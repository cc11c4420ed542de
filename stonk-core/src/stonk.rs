//! The ticker entity and its source resolver.
//!
//! A [`Stonk`] owns the series cache and range ledger for one ticker and
//! answers `(start, end, periodicity)` requests from one of three tiers:
//!
//! 1. the in-memory series cache, when the ledger covers the window;
//! 2. the local archive, for daily windows ending on or before the archive's
//!    last-updated date;
//! 3. the remote quote provider, for exactly the requested window.
//!
//! Rows obtained from tiers 2 and 3 are merged back into the cache (and their
//! span recorded in the ledger) when the caller asks to persist them.
//! Unavailable data never surfaces as an error: future windows, archive misses
//! and fetch failures all end in an empty or fallen-through result.
//!
//! Mutation goes through `&mut self`, so a `Stonk` has one logical owner. Share
//! one across threads only behind a lock held for the whole `get_range` call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::StonkConfig;
use crate::data::{
    ArchiveReader, DataError, DataSource, QuoteProvider, RangeLedger, SeriesCache, StooqProvider,
    TickerSource,
};
use crate::domain::{Interval, Periodicity, PriceRow, TickerId};

/// Days searched by the first `next_trading_day` probe.
const NEXT_DAY_WINDOW: i64 = 7;
/// Days searched by the widened probe.
const NEXT_DAY_WIDE_WINDOW: i64 = 21;

/// Rows returned by the resolver and the tier that produced them.
///
/// `source` is `None` when the window was rejected before any tier was consulted.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub rows: Vec<PriceRow>,
    pub source: Option<DataSource>,
}

impl Resolution {
    fn rejected() -> Self {
        Self {
            rows: Vec::new(),
            source: None,
        }
    }
}

/// Lifecycle of a ticker entity. Coverage only ever grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityState {
    /// Nothing merged yet.
    Empty,
    /// Coverage recorded for one periodicity only.
    PartiallyLoaded { periodicity: Periodicity, intervals: Vec<Interval> },
    /// Coverage recorded for both periodicities.
    HasCoverage { daily: Vec<Interval>, monthly: Vec<Interval> },
}

/// Price history of a single ticker.
pub struct Stonk {
    ticker: TickerId,
    series: SeriesCache,
    ledger: RangeLedger,
    provider: Arc<dyn QuoteProvider>,
    archive: Option<ArchiveReader>,
    archive_updated: Option<NaiveDate>,
    clock: Arc<dyn Clock>,
}

impl Stonk {
    pub fn new(ticker: TickerId, provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            ticker,
            series: SeriesCache::new(),
            ledger: RangeLedger::new(),
            provider,
            archive: None,
            archive_updated: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Enable the archive tier for windows ending on or before `updated`.
    pub fn with_archive(mut self, archive: ArchiveReader, updated: NaiveDate) -> Self {
        self.archive = Some(archive);
        self.archive_updated = Some(updated);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ticker(&self) -> &TickerId {
        &self.ticker
    }

    pub fn series(&self) -> &SeriesCache {
        &self.series
    }

    pub fn ledger(&self) -> &RangeLedger {
        &self.ledger
    }

    /// Rows for `[start, end]` at `periodicity`. Never fails; unavailable data is empty.
    pub fn get_range(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        periodicity: Periodicity,
        persist: bool,
    ) -> Vec<PriceRow> {
        self.resolve(start, end, periodicity, persist).rows
    }

    /// Date-only form of [`Stonk::get_range`].
    pub fn get_dates(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        periodicity: Periodicity,
        persist: bool,
    ) -> Vec<PriceRow> {
        self.get_range(
            start.and_time(NaiveTime::MIN),
            end.and_time(NaiveTime::MIN),
            periodicity,
            persist,
        )
    }

    /// Run the three-tier policy and report which tier answered.
    pub fn resolve(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        periodicity: Periodicity,
        persist: bool,
    ) -> Resolution {
        let Some(window) = self.normalize(start, end) else {
            return Resolution::rejected();
        };

        if self.ledger.is_covered(window, periodicity) {
            let rows = self.series.slice(window, periodicity);
            debug!(ticker = %self.ticker, %window, %periodicity, rows = rows.len(), "served from cache");
            return Resolution {
                rows,
                source: Some(DataSource::Cache),
            };
        }

        if periodicity == Periodicity::Daily {
            if let Some(rows) = self.from_archive(window) {
                if persist {
                    self.absorb(&rows, periodicity);
                }
                return Resolution {
                    rows,
                    source: Some(DataSource::Archive),
                };
            }
        }

        let rows = self.from_remote(window, periodicity);
        if persist {
            self.absorb(&rows, periodicity);
        }
        Resolution {
            rows,
            source: Some(DataSource::Remote),
        }
    }

    /// First trading day strictly after `date`.
    ///
    /// Probes a 7-day daily window, then a 21-day one. Rows found are persisted.
    pub fn next_trading_day(&mut self, date: NaiveDate) -> Result<NaiveDate, DataError> {
        let from = date + Duration::days(1);
        for days in [NEXT_DAY_WINDOW, NEXT_DAY_WIDE_WINDOW] {
            let to = date + Duration::days(days);
            if let Some(first) = self.get_dates(from, to, Periodicity::Daily, true).first() {
                return Ok(first.date);
            }
            debug!(ticker = %self.ticker, %date, days, "no trading day found, widening");
        }

        warn!(ticker = %self.ticker, %date, "no trading day within {NEXT_DAY_WIDE_WINDOW} days");
        Err(DataError::NoTradingDay {
            from: date,
            searched_days: NEXT_DAY_WIDE_WINDOW,
        })
    }

    /// Dump both cache tables to stdout.
    pub fn print(&self) {
        print!("{self}");
    }

    /// Coverage state derived from the ledger.
    pub fn state(&self) -> EntityState {
        let daily = self.ledger.intervals(Periodicity::Daily).to_vec();
        let monthly = self.ledger.intervals(Periodicity::Monthly).to_vec();
        match (daily.is_empty(), monthly.is_empty()) {
            (true, true) => EntityState::Empty,
            (false, true) => EntityState::PartiallyLoaded {
                periodicity: Periodicity::Daily,
                intervals: daily,
            },
            (true, false) => EntityState::PartiallyLoaded {
                periodicity: Periodicity::Monthly,
                intervals: monthly,
            },
            (false, false) => EntityState::HasCoverage { daily, monthly },
        }
    }

    /// Swap reversed bounds, reject future windows, clamp `end` to now, and
    /// widen to whole days.
    fn normalize(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<Interval> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let now = self.clock.now();

        if start > now {
            warn!(
                ticker = %self.ticker,
                start = %start.date(),
                end = %end.date(),
                "requested window lies in the future"
            );
            return None;
        }
        let end = end.min(now);

        Some(Interval::new(start.date(), end.date()))
    }

    fn from_archive(&self, window: Interval) -> Option<Vec<PriceRow>> {
        let archive = self.archive.as_ref()?;
        let updated = self.archive_updated?;
        if window.end() > updated {
            debug!(ticker = %self.ticker, %window, %updated, "window newer than archive");
            return None;
        }

        match archive.load(&self.ticker) {
            Ok(all) => {
                let rows: Vec<PriceRow> = all
                    .into_iter()
                    .filter(|r| r.periodicity == Periodicity::Daily && window.contains_date(r.date))
                    .collect();
                debug!(ticker = %self.ticker, %window, rows = rows.len(), "served from archive");
                Some(rows)
            }
            Err(e) => {
                if e.is_local_miss() {
                    debug!(ticker = %self.ticker, %window, error = %e, "no archive data, falling back to remote");
                } else {
                    warn!(ticker = %self.ticker, %window, error = %e, "archive read failed, falling back to remote");
                }
                None
            }
        }
    }

    fn from_remote(&self, window: Interval, periodicity: Periodicity) -> Vec<PriceRow> {
        match self.provider.fetch(&self.ticker, window, periodicity) {
            Ok(result) => {
                debug!(
                    ticker = %self.ticker,
                    %window,
                    %periodicity,
                    provider = self.provider.name(),
                    rows = result.rows.len(),
                    "served from remote"
                );
                result.rows
            }
            Err(e) => {
                warn!(
                    ticker = %self.ticker,
                    start = %window.start(),
                    end = %window.end(),
                    %periodicity,
                    error = %e,
                    "fetch failed, returning no rows"
                );
                Vec::new()
            }
        }
    }

    fn absorb(&mut self, rows: &[PriceRow], periodicity: Periodicity) {
        let added = self.series.merge(rows, periodicity);
        if let Some(span) = self.ledger.record_batch(rows, periodicity) {
            debug!(ticker = %self.ticker, %span, %periodicity, added, "recorded coverage");
        }
    }
}

impl fmt::Display for Stonk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trades for {}", self.ticker)?;
        write!(f, "{}", self.series)
    }
}

impl fmt::Debug for Stonk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stonk")
            .field("ticker", &self.ticker)
            .field("provider", &self.provider.name())
            .field("archive_updated", &self.archive_updated)
            .field("daily_rows", &self.series.len(Periodicity::Daily))
            .field("monthly_rows", &self.series.len(Periodicity::Monthly))
            .finish()
    }
}

/// Ticker entities keyed by identity, created on first request and sharing
/// one provider, archive index and clock.
pub struct Market {
    provider: Arc<dyn QuoteProvider>,
    archive: Option<(ArchiveReader, NaiveDate)>,
    clock: Arc<dyn Clock>,
    stonks: HashMap<TickerId, Stonk>,
}

impl Market {
    pub fn new(provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            provider,
            archive: None,
            clock: Arc::new(SystemClock),
            stonks: HashMap::new(),
        }
    }

    pub fn with_archive(mut self, index: Arc<TickerSource>, updated: NaiveDate) -> Self {
        self.archive = Some((ArchiveReader::new(index), updated));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wire Stooq and, when configured and loadable, the local archive.
    pub fn from_config(config: &StonkConfig) -> Result<Self, DataError> {
        let provider = StooqProvider::new(config.quote_base_url.clone(), config.request_timeout())?;
        let market = Self::new(Arc::new(provider));

        let Some(updated) = config.archive_updated else {
            info!("archive_updated not set, archive tier disabled");
            return Ok(market);
        };

        match TickerSource::load(&config.ticker_index, config.archive_root.clone()) {
            Ok(index) => Ok(market.with_archive(Arc::new(index), updated)),
            Err(e) => {
                warn!(error = %e, "ticker index unavailable, archive tier disabled");
                Ok(market)
            }
        }
    }

    /// The entity for `ticker`, created empty on first use.
    pub fn stonk(&mut self, ticker: &TickerId) -> &mut Stonk {
        let provider = &self.provider;
        let archive = &self.archive;
        let clock = &self.clock;
        self.stonks.entry(ticker.clone()).or_insert_with(|| {
            let stonk = Stonk::new(ticker.clone(), Arc::clone(provider)).with_clock(Arc::clone(clock));
            match archive {
                Some((reader, updated)) => stonk.with_archive(reader.clone(), *updated),
                None => stonk,
            }
        })
    }

    pub fn get(&self, ticker: &TickerId) -> Option<&Stonk> {
        self.stonks.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.stonks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stonks.is_empty()
    }
}
