//! Stooq quote provider.
//!
//! Fetches daily or monthly OHLCV rows from Stooq's CSV download endpoint:
//! `GET <base>?s=<TICKER.CC>&d1=<YYYYMMDD>&d2=<YYYYMMDD>&i=<d|m>`.
//!
//! No retries. A failed request surfaces as a `DataError`; the resolver
//! decides what to do with it.

use std::time::Duration;

use tracing::debug;

use super::canonicalize::ColumnIndex;
use super::provider::{DataError, DataSource, FetchResult, QuoteProvider};
use crate::domain::{Interval, Periodicity, PriceRow, TickerId};

pub const DEFAULT_BASE_URL: &str = "https://stooq.com/q/d/l/";

/// Body Stooq sends instead of a CSV when the window holds no rows.
const NO_DATA_MARKER: &str = "No data";

/// Stooq data provider.
pub struct StooqProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl StooqProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Build the download URL for a ticker, window and periodicity.
    pub fn download_url(&self, ticker: &TickerId, window: Interval, periodicity: Periodicity) -> String {
        format!(
            "{base}?s={key}&d1={d1}&d2={d2}&i={code}",
            base = self.base_url,
            key = ticker.key(),
            d1 = window.start().format("%Y%m%d"),
            d2 = window.end().format("%Y%m%d"),
            code = periodicity.provider_code(),
        )
    }

    /// Parse a CSV payload into rows tagged with `periodicity`, sorted by date.
    pub fn parse_csv(body: &str, periodicity: Periodicity) -> Result<Vec<PriceRow>, DataError> {
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed.starts_with(NO_DATA_MARKER) {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(trimmed.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| DataError::ResponseFormatChanged(format!("unreadable header: {e}")))?
            .clone();
        let index = ColumnIndex::from_headers(&headers).map_err(DataError::ResponseFormatChanged)?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| DataError::ResponseFormatChanged(format!("record {i}: {e}")))?;
            let row = index
                .row(&record, periodicity)
                .map_err(|e| DataError::ResponseFormatChanged(format!("record {i}: {e}")))?;
            rows.push(row);
        }

        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }
}

impl QuoteProvider for StooqProvider {
    fn name(&self) -> &str {
        "stooq"
    }

    fn fetch(
        &self,
        ticker: &TickerId,
        window: Interval,
        periodicity: Periodicity,
    ) -> Result<FetchResult, DataError> {
        let url = self.download_url(ticker, window, periodicity);
        debug!(%ticker, %window, %periodicity, url = %url, "requesting quotes");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                ticker: ticker.key(),
            });
        }

        let body = resp
            .text()
            .map_err(|e| DataError::ResponseFormatChanged(format!("unreadable body for {ticker}: {e}")))?;
        let rows = Self::parse_csv(&body, periodicity)?;

        Ok(FetchResult {
            ticker: ticker.clone(),
            rows,
            source: DataSource::Remote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn provider(base: &str) -> StooqProvider {
        StooqProvider::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn url_binds_ticker_window_and_interval() {
        let p = provider(DEFAULT_BASE_URL);
        let url = p.download_url(
            &TickerId::new("nvda", "us"),
            Interval::new(d(2024, 1, 2), d(2024, 2, 29)),
            Periodicity::Monthly,
        );
        assert_eq!(
            url,
            "https://stooq.com/q/d/l/?s=NVDA.US&d1=20240102&d2=20240229&i=m"
        );
    }

    #[test]
    fn parses_and_sorts_csv() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-03,11,12,10,11.5,2000\n\
                    2024-01-02,10,11,9,10.5,1000\n";
        let rows = StooqProvider::parse_csv(body, Periodicity::Daily).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2024, 1, 2));
        assert_eq!(rows[1].volume, 2000);
        assert!(rows.iter().all(|r| r.periodicity == Periodicity::Daily));
    }

    #[test]
    fn no_data_body_is_empty() {
        assert!(StooqProvider::parse_csv("No data", Periodicity::Daily)
            .unwrap()
            .is_empty());
        assert!(StooqProvider::parse_csv("", Periodicity::Daily).unwrap().is_empty());
    }

    #[test]
    fn unexpected_body_is_format_error() {
        let err = StooqProvider::parse_csv("Exceeded the daily hits limit", Periodicity::Daily)
            .unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn fetch_against_mock_server() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/q/d/l/")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("s".into(), "PRME.US".into()),
                mockito::Matcher::UrlEncoded("d1".into(), "20240102".into()),
                mockito::Matcher::UrlEncoded("d2".into(), "20240103".into()),
                mockito::Matcher::UrlEncoded("i".into(), "d".into()),
            ]))
            .with_status(200)
            .with_body("Date,Open,High,Low,Close,Volume\n2024-01-02,5,6,4,5.5,100\n")
            .create();

        let p = provider(&format!("{}/q/d/l/", server.url()));
        let result = p
            .fetch(
                &TickerId::new("prme", "us"),
                Interval::new(d(2024, 1, 2), d(2024, 1, 3)),
                Periodicity::Daily,
            )
            .unwrap();

        mock.assert();
        assert_eq!(result.source, DataSource::Remote);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].close, 5.5);
    }

    #[test]
    fn non_success_status_is_reported() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(503)
            .create();

        let p = provider(&format!("{}/q/d/l/", server.url()));
        let err = p
            .fetch(
                &TickerId::new("prme", "us"),
                Interval::day(d(2024, 1, 2)),
                Periodicity::Daily,
            )
            .unwrap_err();
        assert!(matches!(err, DataError::HttpStatus { status: 503, .. }));
    }
}
