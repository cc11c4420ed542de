//! Per-day API call counter persisted as JSON.
//!
//! File layout (`daily_fields.json`):
//!
//! ```json
//! { "2025-01-06": { "eodhd_calls": 3 } }
//! ```
//!
//! Days roll over at midnight of a fixed UTC-5 offset. Daylight saving is ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::FundamentalsError;

pub const QUOTA_FILE: &str = "daily_fields.json";

const EASTERN_OFFSET_SECS: i32 = 5 * 3600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DayFields {
    #[serde(default)]
    eodhd_calls: u32,
    /// Other per-day fields written by other tools are kept untouched.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

type DailyFields = BTreeMap<String, DayFields>;

/// Today's date at UTC-5.
pub fn eastern_today() -> NaiveDate {
    match FixedOffset::west_opt(EASTERN_OFFSET_SECS) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Yields the day calls are currently counted against.
pub type DaySource = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct QuotaTracker {
    path: PathBuf,
    daily_limit: u32,
    /// Day that `calls` was loaded for.
    day: NaiveDate,
    calls: u32,
    today: DaySource,
}

impl QuotaTracker {
    /// Open (creating if needed) the counter file in `log_dir`, counting UTC-5 days.
    pub fn open(log_dir: &Path, daily_limit: u32) -> Result<Self, FundamentalsError> {
        Self::open_with(log_dir, daily_limit, Arc::new(eastern_today))
    }

    /// Like [`QuotaTracker::open`] but counting against a fixed day.
    pub fn open_for_day(
        log_dir: &Path,
        daily_limit: u32,
        day: NaiveDate,
    ) -> Result<Self, FundamentalsError> {
        Self::open_with(log_dir, daily_limit, Arc::new(move || day))
    }

    /// Open with a custom source for the current day.
    pub fn open_with(
        log_dir: &Path,
        daily_limit: u32,
        today: DaySource,
    ) -> Result<Self, FundamentalsError> {
        std::fs::create_dir_all(log_dir).map_err(FundamentalsError::io(log_dir))?;

        let day = today();
        let mut tracker = Self {
            path: log_dir.join(QUOTA_FILE),
            daily_limit,
            day,
            calls: 0,
            today,
        };
        tracker.load_day(day)?;

        info!(
            day = %tracker.day,
            calls = tracker.calls,
            limit = daily_limit,
            "fundamentals quota loaded"
        );
        Ok(tracker)
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Calls counted for the current day. Zero until the cached day's count is
    /// reloaded after a rollover.
    pub fn calls_today(&self) -> u32 {
        if (self.today)() == self.day {
            self.calls
        } else {
            0
        }
    }

    pub fn remaining_calls(&self) -> u32 {
        self.daily_limit.saturating_sub(self.calls_today())
    }

    pub fn is_exhausted(&self) -> bool {
        self.calls_today() >= self.daily_limit
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload the persisted count if the day has changed since it was last read.
    /// Returns whether a rollover happened.
    pub fn refresh(&mut self) -> Result<bool, FundamentalsError> {
        let today = (self.today)();
        if today == self.day {
            return Ok(false);
        }
        let previous = self.day;
        self.load_day(today)?;
        info!(from = %previous, to = %today, calls = self.calls, "fundamentals quota day rolled over");
        Ok(true)
    }

    /// Count one call and persist it. Returns the new count for today.
    pub fn increment(&mut self) -> Result<u32, FundamentalsError> {
        let today = (self.today)();
        let key = day_key(today);
        let mut fields = self.read()?;
        let entry = fields.entry(key.clone()).or_default();
        entry.eodhd_calls += 1;
        self.day = today;
        self.calls = entry.eodhd_calls;
        self.write(&fields)?;

        debug!(day = %key, calls = self.calls, "fundamentals call counted");
        Ok(self.calls)
    }

    /// Read `day`'s count, creating a zeroed entry for it if absent.
    fn load_day(&mut self, day: NaiveDate) -> Result<(), FundamentalsError> {
        let mut fields = self.read()?;
        let key = day_key(day);
        if !fields.contains_key(&key) {
            fields.insert(key.clone(), DayFields::default());
            self.write(&fields)?;
        }
        self.day = day;
        self.calls = fields.get(&key).map_or(0, |entry| entry.eodhd_calls);
        Ok(())
    }

    fn read(&self) -> Result<DailyFields, FundamentalsError> {
        if !self.path.exists() {
            return Ok(DailyFields::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(FundamentalsError::io(&self.path))?;
        if content.trim().is_empty() {
            return Ok(DailyFields::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, fields: &DailyFields) -> Result<(), FundamentalsError> {
        let json = serde_json::to_string_pretty(fields)?;
        std::fs::write(&self.path, json).map_err(FundamentalsError::io(&self.path))
    }
}

impl fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaTracker")
            .field("path", &self.path)
            .field("daily_limit", &self.daily_limit)
            .field("day", &self.day)
            .field("calls", &self.calls)
            .finish()
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
