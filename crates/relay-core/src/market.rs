//! Exchange and ticker identification.
//!
//! A price stream is identified by the exchange that reports it plus the
//! base/quote ticker pair. Tickers arrive from URL path segments and are
//! normalized to upper case.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price source reported by the relayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Median across all healthy exchanges.
    Median,
    Binance,
    Coinbase,
    Kraken,
    Okx,
    #[serde(rename = "uniswapv3")]
    UniswapV3,
}

impl Exchange {
    pub const ALL: [Exchange; 6] = [
        Self::Median,
        Self::Binance,
        Self::Coinbase,
        Self::Kraken,
        Self::Okx,
        Self::UniswapV3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::Binance => "binance",
            Self::Coinbase => "coinbase",
            Self::Kraken => "kraken",
            Self::Okx => "okx",
            Self::UniswapV3 => "uniswapv3",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == lower)
            .ok_or_else(|| CoreError::UnknownExchange(s.to_string()))
    }
}

/// Returns true if `segment` contains any lowercase ASCII letter.
///
/// This is the redirect predicate for ticker path segments: `"eth"` and
/// `"Eth"` match, `"ETH"` and `"3TH"` do not.
pub fn contains_lowercase(segment: &str) -> bool {
    segment.bytes().any(|b| b.is_ascii_lowercase())
}

/// Upper-case a ticker segment if it contains any lowercase ASCII letter.
pub fn normalize_ticker(segment: &str) -> String {
    if contains_lowercase(segment) {
        segment.to_ascii_uppercase()
    } else {
        segment.to_string()
    }
}

/// Token ticker symbol (e.g., "WETH", "USDC").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Create a ticker, normalizing it to upper case.
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(normalize_ticker(symbol.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Ticker {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

impl FromStr for Ticker {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoreError::InvalidTicker("empty ticker".to_string()));
        }
        Ok(Self::new(s))
    }
}

/// Unique identity of a price stream.
///
/// Format: `{exchange}-{base}-{quote}` (e.g., "binance-WETH-USDC").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PriceKey {
    pub exchange: Exchange,
    pub base: Ticker,
    pub quote: Ticker,
}

impl PriceKey {
    pub fn new(exchange: Exchange, base: Ticker, quote: Ticker) -> Self {
        Self {
            exchange,
            base,
            quote,
        }
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.exchange, self.base, self.quote)
    }
}
