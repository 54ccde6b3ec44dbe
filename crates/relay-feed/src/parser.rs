//! Message parsing for relayer push topics.
//!
//! Every relayer message is an opaque JSON string. This module owns
//! decoding: malformed payloads and unrecognized event types come back as
//! `FeedError` values for the caller to log and drop.
//!
//! Order book and MPC events share an envelope:
//! `{"type": "NewOrder", "order": {...}}` or
//! `{"type": "HandshakeStarted", "local_order_id": "..."}`.

use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use relay_core::{OrderId, OrderState, Price, PriceKey, PriceReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Decode counters.
#[derive(Debug, Default)]
pub struct ParseStats {
    pub decoded: AtomicU64,
    pub malformed: AtomicU64,
    pub unknown_type: AtomicU64,
}

impl ParseStats {
    fn record<T>(&self, result: &FeedResult<T>) {
        let counter = match result {
            Ok(_) => &self.decoded,
            Err(FeedError::UnknownEventType(_)) => &self.unknown_type,
            Err(_) => &self.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn unknown_type(&self) -> u64 {
        self.unknown_type.load(Ordering::Relaxed)
    }
}

/// Order fields carried by `NewOrder` and `OrderStateChange`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderUpsert {
    pub id: OrderId,
    #[serde(deserialize_with = "string_or_number")]
    pub public_share_nullifier: String,
    pub local: bool,
    #[serde(deserialize_with = "string_or_number")]
    pub cluster: String,
    pub state: OrderState,
    pub timestamp: u64,
}

/// Decoded order book or MPC event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookEvent {
    NewOrder(OrderUpsert),
    OrderStateChange(OrderUpsert),
    HandshakeStarted { local_order_id: OrderId },
    HandshakeCompleted { local_order_id: OrderId },
}

impl BookEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewOrder(_) => "NewOrder",
            Self::OrderStateChange(_) => "OrderStateChange",
            Self::HandshakeStarted { .. } => "HandshakeStarted",
            Self::HandshakeCompleted { .. } => "HandshakeCompleted",
        }
    }

    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            Self::HandshakeStarted { .. } | Self::HandshakeCompleted { .. }
        )
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    order: Option<serde_json::Value>,
    #[serde(default)]
    local_order_id: Option<OrderId>,
}

/// Relayer price report. Only the midpoint is used; the remaining fields
/// are informational.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPriceReport {
    midpoint_price: Decimal,
    #[serde(default)]
    reported_timestamp: Option<u64>,
}

/// Stateless decoder plus counters.
#[derive(Debug, Default)]
pub struct MessageParser {
    stats: ParseStats,
}

impl MessageParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Decode any order book or MPC event.
    pub fn parse_event(&self, message: &str) -> FeedResult<BookEvent> {
        let result = decode_event(message);
        self.stats.record(&result);
        result
    }

    /// Decode a message from the order book topic. Only order upserts are
    /// valid there.
    pub fn parse_order_book_event(&self, message: &str) -> FeedResult<BookEvent> {
        self.parse_restricted(message, |e| !e.is_handshake())
    }

    /// Decode a message from the MPC topic. Only handshake events are valid
    /// there.
    pub fn parse_mpc_event(&self, message: &str) -> FeedResult<BookEvent> {
        self.parse_restricted(message, BookEvent::is_handshake)
    }

    /// Decode a price report for `key`, stamped with the local receive time.
    pub fn parse_price_report(
        &self,
        key: &PriceKey,
        message: &str,
        received_at: DateTime<Utc>,
    ) -> FeedResult<PriceReport> {
        let result = serde_json::from_str::<RawPriceReport>(message)
            .map_err(|e| FeedError::Malformed(format!("price report for {key}: {e}")))
            .map(|raw| {
                trace!(key = %key, midpoint = %raw.midpoint_price, reported = ?raw.reported_timestamp, "Price report");
                PriceReport::new(key.clone(), Price::new(raw.midpoint_price), received_at)
            });
        self.stats.record(&result);
        result
    }

    fn parse_restricted(
        &self,
        message: &str,
        allowed: impl Fn(&BookEvent) -> bool,
    ) -> FeedResult<BookEvent> {
        let result = decode_event(message).and_then(|event| {
            if allowed(&event) {
                Ok(event)
            } else {
                Err(FeedError::UnknownEventType(event.kind().to_string()))
            }
        });
        self.stats.record(&result);
        result
    }
}

fn decode_event(message: &str) -> FeedResult<BookEvent> {
    let envelope: Envelope = serde_json::from_str(message)
        .map_err(|e| FeedError::Malformed(format!("invalid event envelope: {e}")))?;

    match envelope.kind.as_str() {
        "NewOrder" => Ok(BookEvent::NewOrder(decode_order(envelope.order)?)),
        "OrderStateChange" => Ok(BookEvent::OrderStateChange(decode_order(envelope.order)?)),
        "HandshakeStarted" => Ok(BookEvent::HandshakeStarted {
            local_order_id: require_order_id(envelope.local_order_id)?,
        }),
        "HandshakeCompleted" => Ok(BookEvent::HandshakeCompleted {
            local_order_id: require_order_id(envelope.local_order_id)?,
        }),
        other => Err(FeedError::UnknownEventType(other.to_string())),
    }
}

fn decode_order(order: Option<serde_json::Value>) -> FeedResult<OrderUpsert> {
    let value = order.ok_or_else(|| FeedError::Malformed("missing order".to_string()))?;
    serde_json::from_value(value).map_err(|e| FeedError::Malformed(format!("invalid order: {e}")))
}

fn require_order_id(id: Option<OrderId>) -> FeedResult<OrderId> {
    id.ok_or_else(|| FeedError::Malformed("missing local_order_id".to_string()))
}

/// Accept either a JSON string or a JSON number, keeping the textual form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{Exchange, Ticker};
    use rust_decimal_macros::dec;

    fn order_json(kind: &str, id: &str, state: &str, ts: u64) -> String {
        serde_json::json!({
            "type": kind,
            "order": {
                "id": id,
                "public_share_nullifier": "0xabc",
                "local": true,
                "cluster": 7,
                "state": state,
                "timestamp": ts,
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_new_order() {
        let parser = MessageParser::new();
        let event = parser
            .parse_event(&order_json("NewOrder", "o-1", "Received", 10))
            .unwrap();

        match event {
            BookEvent::NewOrder(order) => {
                assert_eq!(order.id.as_str(), "o-1");
                assert_eq!(order.cluster, "7");
                assert_eq!(order.public_share_nullifier, "0xabc");
                assert!(order.local);
                assert_eq!(order.state.as_str(), "Received");
                assert_eq!(order.timestamp, 10);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(parser.stats().decoded(), 1);
    }

    #[test]
    fn test_parse_handshake() {
        let parser = MessageParser::new();
        let event = parser
            .parse_mpc_event(r#"{"type":"HandshakeCompleted","local_order_id":"o-9"}"#)
            .unwrap();
        assert_eq!(
            event,
            BookEvent::HandshakeCompleted {
                local_order_id: OrderId::new("o-9")
            }
        );
    }

    #[test]
    fn test_unknown_type() {
        let parser = MessageParser::new();
        let err = parser
            .parse_event(r#"{"type":"HandshakeFailed","local_order_id":"o-1"}"#)
            .unwrap_err();
        assert!(matches!(err, FeedError::UnknownEventType(ref t) if t == "HandshakeFailed"));
        assert_eq!(parser.stats().unknown_type(), 1);
    }

    #[test]
    fn test_malformed_payloads() {
        let parser = MessageParser::new();
        assert!(matches!(
            parser.parse_event("{not json"),
            Err(FeedError::Malformed(_))
        ));
        assert!(matches!(
            parser.parse_event(r#"{"type":"NewOrder"}"#),
            Err(FeedError::Malformed(_))
        ));
        assert!(matches!(
            parser.parse_event(r#"{"type":"NewOrder","order":{"id":"x"}}"#),
            Err(FeedError::Malformed(_))
        ));
        assert!(matches!(
            parser.parse_event(r#"{"type":"HandshakeStarted"}"#),
            Err(FeedError::Malformed(_))
        ));
        assert_eq!(parser.stats().malformed(), 4);
    }

    #[test]
    fn test_topic_restrictions() {
        let parser = MessageParser::new();
        let handshake = r#"{"type":"HandshakeStarted","local_order_id":"o-1"}"#;
        assert!(matches!(
            parser.parse_order_book_event(handshake),
            Err(FeedError::UnknownEventType(_))
        ));
        assert!(matches!(
            parser.parse_mpc_event(&order_json("NewOrder", "o-1", "Received", 1)),
            Err(FeedError::UnknownEventType(_))
        ));
        assert!(parser.parse_mpc_event(handshake).is_ok());
    }

    #[test]
    fn test_parse_price_report() {
        let parser = MessageParser::new();
        let key = PriceKey::new(Exchange::Binance, Ticker::new("ETH"), Ticker::new("USDC"));
        let now = Utc::now();

        let report = parser
            .parse_price_report(
                &key,
                r#"{"type":"PriceReport","exchange":"binance","midpointPrice":"1800.001","reportedTimestamp":1700000000000}"#,
                now,
            )
            .unwrap();
        assert_eq!(report.midpoint_price, Price::new(dec!(1800.001)));
        assert_eq!(report.received_at, now);

        assert!(parser
            .parse_price_report(&key, r#"{"type":"NoDataReported"}"#, now)
            .is_err());
    }
}
