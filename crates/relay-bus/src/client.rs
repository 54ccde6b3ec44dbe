//! Upstream relayer API.
//!
//! The relayer SDK is opaque: it exposes callback registration for push
//! topics, callback release, and request/response queries. Everything in this
//! module describes that surface; nothing here interprets message contents.

use crate::error::BusResult;
use async_trait::async_trait;
use relay_core::{Exchange, Price, PriceKey, Ticker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callback identifier returned by the relayer on registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Push topic offered by the relayer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Price reports for one exchange/base/quote stream.
    PriceReport(PriceKey),
    /// Network-wide order book events.
    OrderBook,
    /// MPC handshake events for locally managed orders.
    Mpc,
}

impl Topic {
    /// Metric label (bounded cardinality).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PriceReport(_) => "price-report",
            Self::OrderBook => "order-book",
            Self::Mpc => "mpc",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PriceReport(key) => write!(f, "price-report:{key}"),
            Self::OrderBook => write!(f, "order-book"),
            Self::Mpc => write!(f, "mpc"),
        }
    }
}

/// Handler invoked with each raw message delivered on a topic.
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Relayer push-subscription API.
#[async_trait]
pub trait RelayerClient: Send + Sync {
    /// Register `handler` for `topic`.
    ///
    /// `Ok(None)` means the relayer accepted the call but produced no id; the
    /// caller treats it the same as a failure.
    async fn register_callback(
        &self,
        topic: &Topic,
        handler: MessageHandler,
    ) -> BusResult<Option<SubscriptionId>>;

    /// Release a previously registered callback.
    fn release_callback(&self, id: &SubscriptionId);
}

/// Health of a single exchange's price feed as seen by the relayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeHealth {
    Live,
    NoDataReported,
    DataTooStale,
    NotEnoughDataReported,
    TooMuchDeviation,
    Unsupported,
    #[serde(other)]
    Unknown,
}

impl ExchangeHealth {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Typed response of the exchange health query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeHealthReport {
    pub base: Ticker,
    pub quote: Ticker,
    /// Median across live exchanges, when enough exchanges report.
    pub median: Option<Price>,
    pub exchanges: BTreeMap<Exchange, ExchangeHealth>,
}

impl ExchangeHealthReport {
    pub fn live_exchanges(&self) -> Vec<Exchange> {
        self.exchanges
            .iter()
            .filter(|(_, health)| health.is_live())
            .map(|(exchange, _)| *exchange)
            .collect()
    }
}

/// Relayer request/response queries.
#[async_trait]
pub trait HealthQuery: Send + Sync {
    async fn query_exchange_health(
        &self,
        base: &Ticker,
        quote: &Ticker,
    ) -> BusResult<ExchangeHealthReport>;
}

/// Pair to query health for when the trading page shows `base`.
///
/// Health is always quoted in USDC; a USDC base page queries WETH instead.
pub fn health_query_pair(base: &Ticker) -> (Ticker, Ticker) {
    let usdc = Ticker::new("USDC");
    if *base == usdc {
        (Ticker::new("WETH"), usdc)
    } else {
        (base.clone(), usdc)
    }
}
