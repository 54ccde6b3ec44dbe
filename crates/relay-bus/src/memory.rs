//! In-process relayer.
//!
//! Implements `RelayerClient` by keeping registered handlers in memory and
//! invoking them synchronously from `publish`. Used by tests and by the
//! replay command to drive stores from a recorded event log.

use crate::client::{
    ExchangeHealthReport, HealthQuery, MessageHandler, RelayerClient, SubscriptionId, Topic,
};
use crate::error::{BusError, BusResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use relay_core::Ticker;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::trace;

/// How the relayer answers registration calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationMode {
    /// Register and return a fresh id.
    #[default]
    Accept,
    /// Reject with an error.
    Fail,
    /// Resolve without an id.
    NoId,
}

/// In-memory relayer.
pub struct InMemoryRelayer {
    handlers: RwLock<BTreeMap<SubscriptionId, (Topic, MessageHandler)>>,
    released: RwLock<Vec<SubscriptionId>>,
    mode: RwLock<RegistrationMode>,
    next_id: AtomicU64,
    registrations: AtomicU64,
    /// Registrations wait while this is false.
    gate: watch::Sender<bool>,
    health: RwLock<HashMap<(Ticker, Ticker), ExchangeHealthReport>>,
}

impl InMemoryRelayer {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            handlers: RwLock::new(BTreeMap::new()),
            released: RwLock::new(Vec::new()),
            mode: RwLock::new(RegistrationMode::Accept),
            next_id: AtomicU64::new(1),
            registrations: AtomicU64::new(0),
            gate,
            health: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_mode(&self, mode: RegistrationMode) {
        *self.mode.write() = mode;
    }

    /// Hold registration calls until `resume_registrations`.
    pub fn pause_registrations(&self) {
        self.gate.send_replace(false);
    }

    pub fn resume_registrations(&self) {
        self.gate.send_replace(true);
    }

    /// Deliver `message` to every handler registered for `topic`.
    ///
    /// Handlers run outside the registry lock, so they may register or
    /// release callbacks. Returns the number of handlers invoked.
    pub fn publish(&self, topic: &Topic, message: &str) -> usize {
        let targets: Vec<MessageHandler> = self
            .handlers
            .read()
            .values()
            .filter(|(t, _)| t == topic)
            .map(|(_, handler)| handler.clone())
            .collect();

        trace!(topic = %topic, handlers = targets.len(), "Publishing message");
        for handler in &targets {
            handler(message);
        }
        targets.len()
    }

    /// Number of callbacks currently registered for `topic`.
    pub fn handler_count(&self, topic: &Topic) -> usize {
        self.handlers
            .read()
            .values()
            .filter(|(t, _)| t == topic)
            .count()
    }

    /// Number of currently registered callbacks.
    pub fn active_callbacks(&self) -> usize {
        self.handlers.read().len()
    }

    /// Total registration calls received, including failed ones.
    pub fn registration_count(&self) -> u64 {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Ids released so far, in release order.
    pub fn released_ids(&self) -> Vec<SubscriptionId> {
        self.released.read().clone()
    }

    /// Answer health queries for the report's pair with `report`.
    pub fn set_health_report(&self, report: ExchangeHealthReport) {
        self.health
            .write()
            .insert((report.base.clone(), report.quote.clone()), report);
    }
}

impl Default for InMemoryRelayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayerClient for InMemoryRelayer {
    async fn register_callback(
        &self,
        topic: &Topic,
        handler: MessageHandler,
    ) -> BusResult<Option<SubscriptionId>> {
        self.registrations.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| BusError::Unavailable("relayer dropped".to_string()))?;

        let mode = *self.mode.read();
        match mode {
            RegistrationMode::Accept => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                let id = SubscriptionId::new(format!("cb-{n}"));
                self.handlers
                    .write()
                    .insert(id.clone(), (topic.clone(), handler));
                Ok(Some(id))
            }
            RegistrationMode::Fail => Err(BusError::Registration {
                topic: topic.to_string(),
                reason: "rejected by relayer".to_string(),
            }),
            RegistrationMode::NoId => Ok(None),
        }
    }

    fn release_callback(&self, id: &SubscriptionId) {
        self.handlers.write().remove(id);
        self.released.write().push(id.clone());
    }
}

#[async_trait]
impl HealthQuery for InMemoryRelayer {
    async fn query_exchange_health(
        &self,
        base: &Ticker,
        quote: &Ticker,
    ) -> BusResult<ExchangeHealthReport> {
        self.health
            .read()
            .get(&(base.clone(), quote.clone()))
            .cloned()
            .ok_or_else(|| BusError::Query(format!("no health report for {base}/{quote}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ExchangeHealth;
    use relay_core::Exchange;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_and_release() {
        let relayer = InMemoryRelayer::new();
        let id = relayer
            .register_callback(&Topic::Mpc, Arc::new(|_msg: &str| {}))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(relayer.handler_count(&Topic::Mpc), 1);
        assert_eq!(relayer.publish(&Topic::Mpc, "x"), 1);

        relayer.release_callback(&id);
        assert_eq!(relayer.active_callbacks(), 0);
        assert_eq!(relayer.publish(&Topic::Mpc, "x"), 0);
    }

    #[tokio::test]
    async fn test_paused_registration_waits() {
        let relayer = Arc::new(InMemoryRelayer::new());
        relayer.pause_registrations();

        let r = relayer.clone();
        let pending = tokio::spawn(async move {
            r.register_callback(&Topic::OrderBook, Arc::new(|_msg: &str| {}))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        assert_eq!(relayer.active_callbacks(), 0);

        relayer.resume_registrations();
        let id = pending.await.unwrap().unwrap();
        assert!(id.is_some());
        assert_eq!(relayer.active_callbacks(), 1);
    }

    #[tokio::test]
    async fn test_health_query() {
        let relayer = InMemoryRelayer::new();
        let (weth, usdc) = (Ticker::new("WETH"), Ticker::new("USDC"));
        assert!(relayer.query_exchange_health(&weth, &usdc).await.is_err());

        relayer.set_health_report(ExchangeHealthReport {
            base: weth.clone(),
            quote: usdc.clone(),
            median: None,
            exchanges: BTreeMap::from([
                (Exchange::Binance, ExchangeHealth::Live),
                (Exchange::Kraken, ExchangeHealth::DataTooStale),
            ]),
        });
        let report = relayer.query_exchange_health(&weth, &usdc).await.unwrap();
        assert_eq!(report.live_exchanges(), vec![Exchange::Binance]);
    }
}
