//! Price observation over the relayer price-report topics.
//!
//! Every observer of a key shares one upstream subscription; the last
//! observer to go away releases it.

use crate::parser::MessageParser;
use crate::price_cache::PriceCache;
use chrono::Utc;
use relay_bus::{Lease, MessageHandler, SubscriptionId, SubscriptionManager, Topic};
use relay_core::{Exchange, PriceKey, PriceReport, Ticker};
use relay_telemetry::Metrics;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::warn;

/// Price cache front-end bound to one subscription scope.
pub struct PriceFeed {
    cache: Arc<PriceCache>,
    subscriptions: Arc<SubscriptionManager>,
    parser: Arc<MessageParser>,
}

impl PriceFeed {
    pub fn new(cache: Arc<PriceCache>, subscriptions: Arc<SubscriptionManager>) -> Self {
        Self {
            cache,
            subscriptions,
            parser: Arc::new(MessageParser::new()),
        }
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    pub fn parser(&self) -> &MessageParser {
        &self.parser
    }

    /// Observe the midpoint price of `base`/`quote` on `exchange`.
    ///
    /// The observation starts with the latest published report (if any) and
    /// yields every later publication. Registration failure is not an error:
    /// the observation then only ever shows the cached value.
    pub async fn observe_price(
        &self,
        exchange: Exchange,
        base: Ticker,
        quote: Ticker,
        precision: Option<u32>,
    ) -> PriceObservation {
        let key = PriceKey::new(exchange, base, quote);
        let rx = self.cache.watch(&key, precision);
        let topic = Topic::PriceReport(key.clone());

        let handler = self.handler(key.clone());
        let bus = self.subscriptions.bus().clone();
        let t = topic.clone();
        let lease = self
            .subscriptions
            .acquire(topic, || async move { bus.subscribe(&t, handler).await })
            .await;

        PriceObservation {
            key,
            lease: Some(lease),
            rx,
            subscriptions: self.subscriptions.clone(),
        }
    }

    fn handler(&self, key: PriceKey) -> MessageHandler {
        let cache = self.cache.clone();
        let parser = self.parser.clone();
        Arc::new(move |message: &str| {
            match parser.parse_price_report(&key, message, Utc::now()) {
                Ok(report) => {
                    let decision = cache.offer(report, Instant::now());
                    Metrics::price_decision(decision.as_str());
                }
                Err(e) => {
                    Metrics::event_dropped("price-report", e.drop_reason());
                    warn!(key = %key, error = %e, "Dropping price report");
                }
            }
        })
    }
}

/// Handle on a price stream. Dropping it releases its reference on the
/// upstream subscription.
pub struct PriceObservation {
    key: PriceKey,
    /// Taken on drop.
    lease: Option<Lease>,
    rx: watch::Receiver<Option<PriceReport>>,
    subscriptions: Arc<SubscriptionManager>,
}

impl PriceObservation {
    pub fn key(&self) -> &PriceKey {
        &self.key
    }

    /// Upstream id, if registration was live when this observation started.
    pub fn subscription_id(&self) -> Option<&SubscriptionId> {
        self.lease.as_ref().and_then(Lease::id)
    }

    /// Latest published report.
    pub fn current(&self) -> Option<PriceReport> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published report. Returns `None` once the cache is
    /// gone.
    pub async fn changed(&mut self) -> Option<PriceReport> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

impl Drop for PriceObservation {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.subscriptions.release(lease);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_cache::PriceCacheConfig;
    use relay_bus::{EventBus, InMemoryRelayer, RegistrationMode};
    use relay_core::Price;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn setup() -> (Arc<InMemoryRelayer>, PriceFeed) {
        let relayer = Arc::new(InMemoryRelayer::new());
        let bus = Arc::new(EventBus::new(relayer.clone()));
        let subscriptions = Arc::new(SubscriptionManager::new(bus));
        let cache = Arc::new(PriceCache::new(PriceCacheConfig::default()));
        (relayer, PriceFeed::new(cache, subscriptions))
    }

    fn eth_usdc() -> Topic {
        Topic::PriceReport(PriceKey::new(
            Exchange::Binance,
            Ticker::new("ETH"),
            Ticker::new("USDC"),
        ))
    }

    fn report(px: &str) -> String {
        format!(r#"{{"type":"PriceReport","midpointPrice":"{px}"}}"#)
    }

    #[tokio::test]
    async fn test_single_upstream_per_key() {
        let (relayer, feed) = setup();

        let a = feed
            .observe_price(Exchange::Binance, Ticker::new("ETH"), Ticker::new("USDC"), None)
            .await;
        let b = feed
            .observe_price(Exchange::Binance, Ticker::new("eth"), Ticker::new("usdc"), None)
            .await;

        assert!(a.subscription_id().is_some());
        assert_eq!(a.subscription_id(), b.subscription_id());
        assert_eq!(relayer.handler_count(&eth_usdc()), 1);

        drop(a);
        assert_eq!(relayer.handler_count(&eth_usdc()), 1);
        drop(b);
        assert_eq!(relayer.handler_count(&eth_usdc()), 0);
    }

    #[tokio::test]
    async fn test_observer_receives_published_reports() {
        let (relayer, feed) = setup();
        let mut obs = feed
            .observe_price(Exchange::Binance, Ticker::new("ETH"), Ticker::new("USDC"), None)
            .await;
        assert!(obs.current().is_none());

        relayer.publish(&eth_usdc(), &report("1800.001"));
        let got = tokio::time::timeout(Duration::from_secs(1), obs.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.midpoint_price, Price::new(dec!(1800.001)));

        // Same rounded value inside the throttle window: no change.
        relayer.publish(&eth_usdc(), &report("1800.004"));
        assert!(!obs.rx.has_changed().unwrap());
        assert_eq!(
            feed.cache().get(obs.key()).unwrap().midpoint_price,
            Price::new(dec!(1800.001))
        );
    }

    #[tokio::test]
    async fn test_malformed_report_dropped() {
        let (relayer, feed) = setup();
        let obs = feed
            .observe_price(Exchange::Binance, Ticker::new("ETH"), Ticker::new("USDC"), None)
            .await;

        relayer.publish(&eth_usdc(), "garbage");
        relayer.publish(&eth_usdc(), r#"{"type":"NoDataReported"}"#);

        assert!(obs.current().is_none());
        assert_eq!(feed.parser().stats().malformed(), 2);
    }

    #[tokio::test]
    async fn test_registration_failure_degrades_to_cache() {
        let (relayer, feed) = setup();
        relayer.set_mode(RegistrationMode::Fail);

        let obs = feed
            .observe_price(Exchange::Okx, Ticker::new("WBTC"), Ticker::new("USDC"), None)
            .await;
        assert!(obs.subscription_id().is_none());
        assert!(obs.current().is_none());
        drop(obs);
        assert_eq!(relayer.active_callbacks(), 0);
    }

    #[tokio::test]
    async fn test_observation_outliving_teardown_keeps_newer_subscription() {
        let (relayer, feed) = setup();
        let old = feed
            .observe_price(Exchange::Binance, Ticker::new("ETH"), Ticker::new("USDC"), None)
            .await;
        feed.subscriptions.release_all();

        let current = feed
            .observe_price(Exchange::Binance, Ticker::new("ETH"), Ticker::new("USDC"), None)
            .await;
        assert!(current.subscription_id().is_some());

        drop(old);
        assert_eq!(relayer.handler_count(&eth_usdc()), 1);

        relayer.publish(&eth_usdc(), &report("1800"));
        assert_eq!(
            current.current().unwrap().midpoint_price,
            Price::new(dec!(1800))
        );

        drop(current);
        assert_eq!(relayer.handler_count(&eth_usdc()), 0);
    }
}
