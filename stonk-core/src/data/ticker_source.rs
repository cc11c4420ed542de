//! Reverse index from `(ticker, country)` to an archive file path.
//!
//! Built once from a `find .` listing of the archive root, saved as
//! `TICKER,COUNTRY,EXCHANGE,FILEPATH` CSV, then loaded at startup and shared
//! read-only (`Arc<TickerSource>`) by every ticker entity.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::provider::DataError;

/// One indexed archive file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEntry {
    #[serde(rename = "TICKER")]
    pub ticker: String,
    #[serde(rename = "COUNTRY")]
    pub country: String,
    #[serde(rename = "EXCHANGE")]
    pub exchange: String,
    /// Relative to the archive root.
    #[serde(rename = "FILEPATH")]
    pub filepath: String,
}

impl TickerEntry {
    /// Parse one `find .` line, e.g. `./us/nasdaq stocks/1/nvda.us.txt`.
    ///
    /// Returns `None` for directories and anything that is not a `.txt` file
    /// at least two levels below the root.
    pub fn from_listing_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let path = line.strip_prefix("./").unwrap_or(line);
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() < 3 {
            return None;
        }

        let file_name = parts[parts.len() - 1];
        if !file_name.ends_with(".txt") {
            return None;
        }
        let ticker = file_name.split('.').next().filter(|t| !t.is_empty())?;

        Some(Self {
            ticker: ticker.to_string(),
            country: parts[0].to_string(),
            exchange: parts[1].to_string(),
            filepath: path.to_string(),
        })
    }

    fn matches(&self, ticker: &str, country: &str) -> bool {
        self.ticker.eq_ignore_ascii_case(ticker) && self.country.eq_ignore_ascii_case(country)
    }
}

/// The loaded reverse index.
#[derive(Debug, Clone, Default)]
pub struct TickerSource {
    root: PathBuf,
    entries: Vec<TickerEntry>,
}

impl TickerSource {
    pub fn new(root: impl Into<PathBuf>, entries: Vec<TickerEntry>) -> Self {
        Self {
            root: root.into(),
            entries,
        }
    }

    /// Build the index from raw `find .` output run inside `root`.
    pub fn from_listing(listing: &str, root: impl Into<PathBuf>) -> Self {
        let mut entries = Vec::new();
        for line in listing.lines() {
            match TickerEntry::from_listing_line(line) {
                Some(entry) => entries.push(entry),
                None => debug!(line, "no ticker in listing line"),
            }
        }
        Self::new(root, entries)
    }

    /// Load a formatted index CSV.
    pub fn load(index_path: &Path, root: impl Into<PathBuf>) -> Result<Self, DataError> {
        let content = fs::read_to_string(index_path)
            .map_err(|e| DataError::Io(format!("ticker index {}: {e}", index_path.display())))?;
        let mut reader = csv::Reader::from_reader(content.as_bytes());

        let mut entries = Vec::new();
        for record in reader.deserialize::<TickerEntry>() {
            let entry = record
                .map_err(|e| DataError::Io(format!("ticker index {}: {e}", index_path.display())))?;
            entries.push(entry);
        }

        info!(path = %index_path.display(), entries = entries.len(), "loaded ticker index");
        Ok(Self::new(root, entries))
    }

    /// Write the index as CSV, creating parent directories if needed.
    pub fn write_formatted(&self, index_path: &Path) -> Result<(), DataError> {
        if let Some(parent) = index_path.parent() {
            fs::create_dir_all(parent).map_err(|e| DataError::Io(format!("create dir: {e}")))?;
        }
        let mut writer = csv::Writer::from_path(index_path)
            .map_err(|e| DataError::Io(format!("open {}: {e}", index_path.display())))?;
        for entry in &self.entries {
            writer
                .serialize(entry)
                .map_err(|e| DataError::Io(format!("write entry: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| DataError::Io(format!("flush: {e}")))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[TickerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive path for a ticker. Case-insensitive; the first indexed entry wins.
    pub fn lookup(&self, ticker: &str, country: &str) -> Result<PathBuf, DataError> {
        match self.entries.iter().find(|e| e.matches(ticker, country)) {
            Some(entry) => Ok(self.root.join(&entry.filepath)),
            None => {
                warn!(ticker, country, "ticker not found in index");
                Err(DataError::TickerNotIndexed {
                    ticker: ticker.to_string(),
                    country: country.to_string(),
                })
            }
        }
    }

    /// True if the ticker is indexed and its file exists on disk.
    pub fn path_exists(&self, ticker: &str, country: &str) -> bool {
        self.lookup(ticker, country)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Number of indexed files per country.
    pub fn country_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.country.to_ascii_uppercase()).or_insert(0) += 1;
        }
        counts
    }

    /// Tickers indexed more than once (across exchanges or countries), with their counts.
    pub fn duplicate_tickers(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.ticker.to_ascii_uppercase()).or_insert(0) += 1;
        }
        counts.retain(|_, n| *n > 1);
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = ".\n\
        ./us\n\
        ./us/nasdaq stocks\n\
        ./us/nasdaq stocks/1/nvda.us.txt\n\
        ./us/nyse stocks/2/nvda.us.txt\n\
        ./us/nyse stocks/1/ibm.us.txt\n\
        ./uk/lse stocks/vod.uk.txt\n\
        ./us/readme.md\n";

    #[test]
    fn parses_listing_lines() {
        let entry = TickerEntry::from_listing_line("./us/nasdaq stocks/1/nvda.us.txt").unwrap();
        assert_eq!(entry.ticker, "nvda");
        assert_eq!(entry.country, "us");
        assert_eq!(entry.exchange, "nasdaq stocks");
        assert_eq!(entry.filepath, "us/nasdaq stocks/1/nvda.us.txt");

        assert!(TickerEntry::from_listing_line("./us/nasdaq stocks").is_none());
        assert!(TickerEntry::from_listing_line("./us/readme.md").is_none());
        assert!(TickerEntry::from_listing_line(".").is_none());
    }

    #[test]
    fn lookup_is_case_insensitive_and_first_wins() {
        let source = TickerSource::from_listing(LISTING, "data/stooq");
        assert_eq!(source.len(), 4);

        let path = source.lookup("NVDA", "US").unwrap();
        assert_eq!(path, PathBuf::from("data/stooq/us/nasdaq stocks/1/nvda.us.txt"));

        assert!(matches!(
            source.lookup("NVDA", "UK"),
            Err(DataError::TickerNotIndexed { .. })
        ));
    }

    #[test]
    fn counts_by_country_and_duplicates() {
        let source = TickerSource::from_listing(LISTING, "data/stooq");

        let countries = source.country_counts();
        assert_eq!(countries.get("US"), Some(&3));
        assert_eq!(countries.get("UK"), Some(&1));

        let dups = source.duplicate_tickers();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups.get("NVDA"), Some(&2));
    }

    #[test]
    fn formatted_index_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("nested/filepathsformatted.txt");

        let source = TickerSource::from_listing(LISTING, dir.path());
        source.write_formatted(&index_path).unwrap();

        let header = fs::read_to_string(&index_path).unwrap();
        assert!(header.starts_with("TICKER,COUNTRY,EXCHANGE,FILEPATH"));

        let loaded = TickerSource::load(&index_path, dir.path()).unwrap();
        assert_eq!(loaded.entries(), source.entries());
    }

    #[test]
    fn path_exists_checks_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file_dir = dir.path().join("us/nyse stocks/1");
        fs::create_dir_all(&file_dir).unwrap();
        fs::write(file_dir.join("ibm.us.txt"), "x").unwrap();

        let source = TickerSource::from_listing(LISTING, dir.path());
        assert!(source.path_exists("ibm", "us"));
        assert!(!source.path_exists("vod", "uk"));
        assert!(!source.path_exists("msft", "us"));
    }

    #[test]
    fn missing_index_file_is_io_error() {
        let err = TickerSource::load(Path::new("/nonexistent/index.csv"), "data").unwrap_err();
        assert!(matches!(err, DataError::Io(_)));
    }
}
