//! Blocking EODHD fundamentals fetch with response logging.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::quota::QuotaTracker;
use super::FundamentalsError;
use crate::config::FundamentalsConfig;
use crate::domain::TickerId;

pub const STRUCTURED_LOG_FILE: &str = "eodhd_log.json";
pub const RAW_LOG_FILE: &str = "eodhd_log_raw.json";

/// Statuses that mean the server accepted the call and charged it.
const COUNTED_STATUSES: [u16; 4] = [200, 400, 401, 429];

pub struct FundamentalsClient {
    client: reqwest::blocking::Client,
    config: FundamentalsConfig,
    quota: QuotaTracker,
    structured_log: PathBuf,
    raw_log: PathBuf,
}

impl FundamentalsClient {
    pub fn new(config: FundamentalsConfig) -> Result<Self, FundamentalsError> {
        let quota = QuotaTracker::open(&config.log_directory, config.daily_limit)?;
        Self::with_quota(config, quota)
    }

    /// Build around an already-opened tracker.
    pub fn with_quota(config: FundamentalsConfig, quota: QuotaTracker) -> Result<Self, FundamentalsError> {
        if config.api_key.trim().is_empty() {
            return Err(FundamentalsError::MissingApiKey);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()?;

        let structured_log = config.log_directory.join(STRUCTURED_LOG_FILE);
        let raw_log = config.log_directory.join(RAW_LOG_FILE);
        for path in [&structured_log, &raw_log] {
            if !path.exists() {
                std::fs::write(path, "[]").map_err(FundamentalsError::io(path))?;
            }
        }

        Ok(Self {
            client,
            config,
            quota,
            structured_log,
            raw_log,
        })
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn remaining_calls(&self) -> u32 {
        self.quota.remaining_calls()
    }

    pub fn fundamentals_url(&self, ticker: &TickerId) -> String {
        format!(
            "{}/api/fundamentals/{}",
            self.config.base_url.trim_end_matches('/'),
            ticker.key()
        )
    }

    /// Fetch the fundamentals document for `ticker`.
    ///
    /// Refuses without a request once today's quota is spent. Every outcome
    /// that reaches the wire is appended to both response logs.
    pub fn fetch(&mut self, ticker: &TickerId) -> Result<Value, FundamentalsError> {
        self.quota.refresh()?;
        if self.quota.is_exhausted() {
            warn!(%ticker, limit = self.quota.daily_limit(), "fundamentals quota exhausted");
            return Err(FundamentalsError::QuotaExceeded {
                limit: self.quota.daily_limit(),
            });
        }

        let key = ticker.key();
        let response = match self
            .client
            .get(self.fundamentals_url(ticker))
            .query(&[("api_token", self.config.api_key.as_str()), ("fmt", "json")])
            .send()
        {
            Ok(response) => response,
            Err(e) => {
                self.log_error(&key, &e.to_string(), transport_error_kind(&e))?;
                warn!(%ticker, error = %e, "fundamentals request failed");
                return Err(e.into());
            }
        };

        let status = response.status().as_u16();
        if COUNTED_STATUSES.contains(&status) {
            self.quota.increment()?;
        }

        if !response.status().is_success() {
            let err = FundamentalsError::Status {
                status,
                ticker: key.clone(),
            };
            self.log_error(&key, &err.to_string(), "HttpStatus")?;
            warn!(%ticker, status, "fundamentals request rejected");
            return Err(err);
        }

        let body = match response.text() {
            Ok(body) => body,
            Err(e) => {
                self.log_error(&key, &e.to_string(), transport_error_kind(&e))?;
                return Err(e.into());
            }
        };
        let data: Value = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(e) => {
                self.log_error(&key, &e.to_string(), "JsonDecode")?;
                return Err(e.into());
            }
        };

        self.log_response(&key, &data)?;
        info!(
            %ticker,
            remaining = self.quota.remaining_calls(),
            "fundamentals fetched"
        );
        Ok(data)
    }

    fn log_error(&self, ticker: &str, error: &str, error_type: &str) -> Result<(), FundamentalsError> {
        self.log_response(ticker, &json!({ "error": error, "error_type": error_type }))
    }

    fn log_response(&self, ticker: &str, response: &Value) -> Result<(), FundamentalsError> {
        let timestamp = Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        append_entry(
            &self.structured_log,
            json!({ "timestamp": timestamp, "ticker": ticker, "response": response }),
        )?;
        append_entry(
            &self.raw_log,
            json!({ "timestamp": timestamp, "ticker": ticker, "raw_response": response }),
        )
    }
}

fn transport_error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "Timeout"
    } else if e.is_connect() {
        "ConnectionError"
    } else if e.is_decode() {
        "DecodeError"
    } else {
        "RequestError"
    }
}

/// Append one entry to a JSON array file. A missing or unparsable file starts over.
fn append_entry(path: &Path, entry: Value) -> Result<(), FundamentalsError> {
    let mut entries: Vec<Value> = match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "response log unreadable, starting a new one");
            Vec::new()
        }),
        Err(_) => Vec::new(),
    };
    entries.push(entry);

    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(path, json).map_err(FundamentalsError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mockito::Matcher;
    use std::sync::{Arc, Mutex};

    fn nvda() -> TickerId {
        TickerId::new("nvda", "us")
    }

    fn client(server_url: &str, dir: &Path, limit: u32) -> FundamentalsClient {
        let config = FundamentalsConfig::new("secret")
            .with_base_url(server_url)
            .with_daily_limit(limit)
            .with_log_directory(dir);
        let day = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let quota = QuotaTracker::open_for_day(dir, limit, day).unwrap();
        FundamentalsClient::with_quota(config, quota).unwrap()
    }

    fn read_log(path: PathBuf) -> Vec<Value> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn successful_fetch_counts_and_logs() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/fundamentals/NVDA.US")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api_token".into(), "secret".into()),
                Matcher::UrlEncoded("fmt".into(), "json".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"General": {"Code": "NVDA"}}"#)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let mut c = client(&server.url(), dir.path(), 19);
        let data = c.fetch(&nvda()).unwrap();

        mock.assert();
        assert_eq!(data["General"]["Code"], "NVDA");
        assert_eq!(c.remaining_calls(), 18);

        let structured = read_log(dir.path().join(STRUCTURED_LOG_FILE));
        assert_eq!(structured.len(), 1);
        assert_eq!(structured[0]["ticker"], "NVDA.US");
        assert_eq!(structured[0]["response"]["General"]["Code"], "NVDA");

        let raw = read_log(dir.path().join(RAW_LOG_FILE));
        assert_eq!(raw[0]["raw_response"]["General"]["Code"], "NVDA");
    }

    #[test]
    fn exhausted_quota_refuses_without_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let mut c = client(&server.url(), dir.path(), 1);
        c.fetch(&nvda()).unwrap();

        let err = c.fetch(&nvda()).unwrap_err();
        assert!(matches!(err, FundamentalsError::QuotaExceeded { limit: 1 }));
        mock.assert();
    }

    #[test]
    fn quota_reopens_on_the_next_day() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let current = Arc::new(Mutex::new(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()));
        let clock = Arc::clone(&current);
        let quota =
            QuotaTracker::open_with(dir.path(), 1, Arc::new(move || *clock.lock().unwrap())).unwrap();
        let config = FundamentalsConfig::new("secret")
            .with_base_url(server.url())
            .with_daily_limit(1)
            .with_log_directory(dir.path());
        let mut c = FundamentalsClient::with_quota(config, quota).unwrap();

        c.fetch(&nvda()).unwrap();
        assert!(matches!(
            c.fetch(&nvda()),
            Err(FundamentalsError::QuotaExceeded { limit: 1 })
        ));

        *current.lock().unwrap() = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();
        c.fetch(&nvda()).unwrap();
        assert_eq!(c.quota().calls_today(), 1);
        mock.assert();
    }

    #[test]
    fn unauthorized_counts_and_errors() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", Matcher::Any).with_status(401).create();

        let dir = tempfile::tempdir().unwrap();
        let mut c = client(&server.url(), dir.path(), 19);
        let err = c.fetch(&nvda()).unwrap_err();

        assert!(matches!(err, FundamentalsError::Status { status: 401, .. }));
        assert_eq!(c.quota().calls_today(), 1);

        let structured = read_log(dir.path().join(STRUCTURED_LOG_FILE));
        assert_eq!(structured[0]["response"]["error_type"], "HttpStatus");
    }

    #[test]
    fn server_error_is_not_counted() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", Matcher::Any).with_status(500).create();

        let dir = tempfile::tempdir().unwrap();
        let mut c = client(&server.url(), dir.path(), 19);
        assert!(c.fetch(&nvda()).is_err());
        assert_eq!(c.quota().calls_today(), 0);
    }

    #[test]
    fn transport_failure_is_logged_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        // Nothing listens on port 9.
        let mut c = client("http://127.0.0.1:9", dir.path(), 19);
        let err = c.fetch(&nvda()).unwrap_err();

        assert!(matches!(err, FundamentalsError::Http(_)));
        assert_eq!(c.quota().calls_today(), 0);

        let raw = read_log(dir.path().join(RAW_LOG_FILE));
        assert_eq!(raw.len(), 1);
        assert!(raw[0]["raw_response"]["error"].is_string());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = FundamentalsConfig::new("  ").with_log_directory(dir.path());
        assert!(matches!(
            FundamentalsClient::new(config),
            Err(FundamentalsError::MissingApiKey)
        ));
    }
}
