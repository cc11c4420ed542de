use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ticker identity: `(symbol, country)`, both upper-cased.
///
/// Renders as the external key `SYMBOL.COUNTRY` used by the quote provider,
/// the fundamentals provider and the archive file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TickerId {
    symbol: String,
    country: String,
}

impl TickerId {
    pub const DEFAULT_COUNTRY: &'static str = "US";

    pub fn new(symbol: impl AsRef<str>, country: impl AsRef<str>) -> Self {
        Self {
            symbol: symbol.as_ref().trim().to_ascii_uppercase(),
            country: country.as_ref().trim().to_ascii_uppercase(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    /// External key, e.g. `NVDA.US`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.symbol, self.country)
    }
}

impl fmt::Display for TickerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.country)
    }
}

/// Parses `nvda.us` / `NVDA.US`; a bare symbol gets the default country.
///
/// The split happens on the last `.` so symbols like `BRK.B.US` keep their class suffix.
impl FromStr for TickerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty ticker".into());
        }
        match s.rsplit_once('.') {
            Some((symbol, country)) if !symbol.is_empty() && !country.is_empty() => {
                Ok(Self::new(symbol, country))
            }
            Some(_) => Err(format!("malformed ticker '{s}'")),
            None => Ok(Self::new(s, Self::DEFAULT_COUNTRY)),
        }
    }
}
