//! Event log replay.
//!
//! Drives a session from a JSON Lines log through an in-memory relayer. Each
//! line is one record:
//!
//! ```text
//! {"kind":"price","exchange":"binance","base":"WETH","quote":"USDC","payload":{"midpointPrice":"1800.01"}}
//! {"kind":"order-book","payload":{"type":"NewOrder","order":{...}}}
//! {"kind":"mpc","payload":{"type":"HandshakeStarted","local_order_id":"..."}}
//! {"kind":"task","task_type":"Deposit","phase":"Proving"}
//! {"kind":"delay","ms":250}
//! ```
//!
//! A string payload is delivered verbatim, so logs can carry malformed
//! messages.

use crate::error::{AppError, AppResult};
use crate::session::Session;
use relay_bus::{InMemoryRelayer, Topic};
use relay_core::{CounterpartyOrder, Exchange, PriceKey, PriceReport, TaskPhase, TaskStatus, TaskType, Ticker};
use relay_feed::PriceObservation;
use relay_task::ProgressSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One line of an event log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReplayRecord {
    Price {
        exchange: Exchange,
        base: Ticker,
        quote: Ticker,
        payload: serde_json::Value,
    },
    OrderBook {
        payload: serde_json::Value,
    },
    Mpc {
        payload: serde_json::Value,
    },
    Task {
        #[serde(default)]
        task_type: Option<TaskType>,
        #[serde(default)]
        phase: Option<TaskPhase>,
    },
    Delay {
        ms: u64,
    },
}

/// Parse an event log, skipping blank lines and `#` comments.
///
/// Lines that fail to parse are logged and skipped; the count is returned
/// alongside the records.
pub fn parse_log(content: &str) -> (Vec<ReplayRecord>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<ReplayRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(line = idx + 1, error = %e, "Skipping unreadable replay record");
            }
        }
    }
    (records, skipped)
}

/// State after a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub records: usize,
    pub skipped: usize,
    pub prices: Vec<PriceReport>,
    pub orders: Vec<CounterpartyOrder>,
    pub local_orders: usize,
    pub progress: ProgressSnapshot,
}

/// Feeds records into a session.
pub struct Replayer {
    relayer: Arc<InMemoryRelayer>,
    /// Keeps price topics subscribed for the duration of the replay.
    observations: HashMap<PriceKey, PriceObservation>,
}

impl Replayer {
    pub fn new(relayer: Arc<InMemoryRelayer>) -> Self {
        Self {
            relayer,
            observations: HashMap::new(),
        }
    }

    pub async fn apply(&mut self, session: &Session, record: &ReplayRecord) {
        match record {
            ReplayRecord::Price {
                exchange,
                base,
                quote,
                payload,
            } => {
                let key = PriceKey::new(*exchange, base.clone(), quote.clone());
                if !self.observations.contains_key(&key) {
                    let observation = session
                        .observe_price(*exchange, base.clone(), quote.clone(), None)
                        .await;
                    self.observations.insert(key.clone(), observation);
                }
                self.relayer
                    .publish(&Topic::PriceReport(key), &payload_text(payload));
            }
            ReplayRecord::OrderBook { payload } => {
                self.relayer.publish(&Topic::OrderBook, &payload_text(payload));
            }
            ReplayRecord::Mpc { payload } => {
                self.relayer.publish(&Topic::Mpc, &payload_text(payload));
            }
            ReplayRecord::Task { task_type, phase } => {
                session.task_status().set(TaskStatus {
                    task_type: *task_type,
                    phase: *phase,
                });
            }
            ReplayRecord::Delay { ms } => {
                debug!(ms, "Replay delay");
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }
    }

    /// Apply every record, then let the poller observe the final task
    /// status before summarizing.
    pub async fn run(
        &mut self,
        session: &Session,
        records: &[ReplayRecord],
        skipped: usize,
    ) -> ReplaySummary {
        for record in records {
            self.apply(session, record).await;
        }
        tokio::time::sleep(session.progress_config().poll_interval * 2).await;

        let book = session.order_book();
        let summary = ReplaySummary {
            records: records.len(),
            skipped,
            prices: session.price_cache().snapshot(),
            orders: book.snapshot(),
            local_orders: book.local_order_count(),
            progress: session.progress(),
        };
        info!(
            records = summary.records,
            skipped = summary.skipped,
            prices = summary.prices.len(),
            orders = summary.orders.len(),
            "Replay finished"
        );
        summary
    }

    /// Drop all price observations.
    pub fn finish(&mut self) {
        self.observations.clear();
    }
}

/// Read and parse a log file.
pub fn read_log(path: &Path) -> AppResult<(Vec<ReplayRecord>, usize)> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Replay(format!("Failed to read {}: {e}", path.display())))?;
    Ok(parse_log(&content))
}

fn payload_text(payload: &serde_json::Value) -> String {
    match payload {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}
