//! Local archive reader for Stooq bulk-download files.
//!
//! Layout of one file (one ticker, full history):
//!
//! ```text
//! <TICKER>,<PER>,<DATE>,<TIME>,<OPEN>,<HIGH>,<LOW>,<CLOSE>,<VOL>,<OPENINT>
//! NVDA.US,D,19990122,000000,0.0406,0.0448,0.0356,0.0376,2714688000,0
//! ```
//!
//! The archive is read-only from this crate's point of view.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::canonicalize::ColumnIndex;
use super::provider::DataError;
use super::ticker_source::TickerSource;
use crate::domain::{Periodicity, PriceRow, TickerId};

/// Reads a ticker's full archived history through the shared ticker index.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    index: Arc<TickerSource>,
}

impl ArchiveReader {
    pub fn new(index: Arc<TickerSource>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &TickerSource {
        &self.index
    }

    /// Load every archived row for a ticker, sorted by date ascending.
    pub fn load(&self, ticker: &TickerId) -> Result<Vec<PriceRow>, DataError> {
        let path = self.index.lookup(ticker.symbol(), ticker.country())?;
        load_file(&path, ticker)
    }
}

/// Parse one archive file. Rows default to daily when the file has no `PER` column.
pub fn load_file(path: &Path, ticker: &TickerId) -> Result<Vec<PriceRow>, DataError> {
    if !path.is_file() {
        return Err(DataError::NotFound {
            ticker: ticker.key(),
        });
    }

    let unreadable = |reason: String| DataError::ArchiveUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|e| unreadable(format!("read: {e}")))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| unreadable(format!("header: {e}")))?
        .clone();
    let index = ColumnIndex::from_headers(&headers).map_err(unreadable)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| unreadable(format!("line {}: {e}", i + 2)))?;
        let periodicity = index.periodicity(&record).unwrap_or(Periodicity::Daily);
        let row = index
            .row(&record, periodicity)
            .map_err(|e| unreadable(format!("line {}: {e}", i + 2)))?;
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(DataError::NotFound {
            ticker: ticker.key(),
        });
    }

    rows.sort_by_key(|r| r.date);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    const SAMPLE: &str = "<TICKER>,<PER>,<DATE>,<TIME>,<OPEN>,<HIGH>,<LOW>,<CLOSE>,<VOL>,<OPENINT>\n\
        NVDA.US,D,20240103,000000,47.5,48.2,47.3,47.6,411254000,0\n\
        NVDA.US,D,20240102,000000,49.2,49.3,47.6,48.2,411254000,0\n";

    fn write_sample(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("nvda.us.txt");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_and_sorts_archive_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), SAMPLE);

        let rows = load_file(&path, &TickerId::new("NVDA", "US")).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(rows[0].open, 49.2);
        assert_eq!(rows[1].volume, 411_254_000);
        assert!(rows.iter().all(|r| r.periodicity == Periodicity::Daily));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("absent.txt"), &TickerId::new("X", "US")).unwrap_err();
        assert!(matches!(err, DataError::NotFound { .. }));
    }

    #[test]
    fn malformed_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "just,some,garbage\n1,2,3\n");
        let err = load_file(&path, &TickerId::new("NVDA", "US")).unwrap_err();
        assert!(matches!(err, DataError::ArchiveUnreadable { .. }));
        assert!(err.is_local_miss());
    }

    #[test]
    fn header_only_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(
            dir.path(),
            "<TICKER>,<PER>,<DATE>,<TIME>,<OPEN>,<HIGH>,<LOW>,<CLOSE>,<VOL>,<OPENINT>\n",
        );
        let err = load_file(&path, &TickerId::new("NVDA", "US")).unwrap_err();
        assert!(matches!(err, DataError::NotFound { .. }));
    }

    #[test]
    fn reader_resolves_through_index() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("us/nasdaq stocks/1");
        fs::create_dir_all(&sub).unwrap();
        write_sample(&sub, SAMPLE);

        let index = TickerSource::from_listing(
            "./us/nasdaq stocks/1/nvda.us.txt\n",
            dir.path(),
        );
        let reader = ArchiveReader::new(Arc::new(index));

        let rows = reader.load(&TickerId::new("nvda", "us")).unwrap();
        assert_eq!(rows.len(), 2);

        let err = reader.load(&TickerId::new("AAPL", "US")).unwrap_err();
        assert!(matches!(err, DataError::TickerNotIndexed { .. }));
    }
}
