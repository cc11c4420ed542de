//! Data sources, the series cache and the range ledger

pub mod archive;
pub mod canonicalize;
pub mod ledger;
pub mod provider;
pub mod series;
pub mod stooq;
pub mod ticker_source;

pub use archive::ArchiveReader;
pub use ledger::RangeLedger;
pub use provider::{DataError, DataSource, FetchResult, QuoteProvider};
pub use series::SeriesCache;
pub use stooq::StooqProvider;
pub use ticker_source::{TickerEntry, TickerSource};
