//! Order book entry types and the persisted trade direction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relayer-assigned order identifier (opaque).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Order state as reported by the relayer (e.g., "Received", "Verified",
/// "Matching", "Cancelled").
///
/// Kept as an opaque string: the relayer owns the state vocabulary and new
/// values must not break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderState(String);

impl OrderState {
    pub fn new(state: impl Into<String>) -> Self {
        Self(state.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.eq_ignore_ascii_case("cancelled")
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Progress of a matching handshake involving an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandshakeState {
    #[default]
    NotMatching,
    InProgress,
    Completed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotMatching => write!(f, "not-matching"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Order known to the relayer network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyOrder {
    pub order_id: OrderId,
    pub public_share_nullifier: String,
    /// Whether the order is managed by the connected relayer.
    pub is_local: bool,
    pub cluster_id: String,
    pub state: OrderState,
    /// Relayer timestamp of the last state change (ms).
    pub timestamp: u64,
    pub handshake_state: HandshakeState,
}

/// Trade direction preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    #[default]
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// Interpret a persisted value. Anything other than `"buy"` is sell.
    pub fn from_persisted(value: Option<&str>) -> Self {
        match value {
            Some("buy") => Self::Buy,
            _ => Self::Sell,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
