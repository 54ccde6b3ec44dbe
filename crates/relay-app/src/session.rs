//! Per-connection session.
//!
//! Owns every store and subscription for one relayer connection. Nothing is
//! global: two sessions over two relayers share no state. `shutdown`
//! releases all upstream callbacks and stops the progress poller; dropping
//! the session does the same without waiting.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::route::TradingRoute;
use crate::storage::{self, KeyValueStore};
use relay_bus::{EventBus, ExchangeHealthReport, HealthQuery, RelayerClient, SubscriptionManager};
use relay_core::{Direction, Exchange, Ticker};
use relay_feed::{
    HandshakeNotifier, Notifier, OrderBook, OrderBookFeed, PriceCache, PriceFeed, PriceObservation,
};
use relay_task::{
    LatencyTable, LocalOrderCount, ProgressConfig, ProgressPoller, ProgressSnapshot, TaskStatusCell,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Session {
    subscriptions: Arc<SubscriptionManager>,
    prices: PriceFeed,
    book_feed: Arc<OrderBookFeed>,
    task_status: Arc<TaskStatusCell>,
    progress_config: ProgressConfig,
    latency: LatencyTable,
    poller: Option<ProgressPoller>,
    /// Orders the estimator treats as needing validity proof updates.
    local_orders: Option<LocalOrderCount>,
    store: Arc<dyn KeyValueStore>,
}

impl Session {
    pub fn new(
        config: &AppConfig,
        client: Arc<dyn RelayerClient>,
        notifier: Box<dyn Notifier>,
        store: Arc<dyn KeyValueStore>,
    ) -> AppResult<Self> {
        config.validate()?;
        let latency = config.progress.latency_table()?;
        let bus = Arc::new(EventBus::new(client));
        let subscriptions = Arc::new(SubscriptionManager::new(bus));

        let cache = Arc::new(PriceCache::new(config.price.cache_config()));
        let prices = PriceFeed::new(cache, subscriptions.clone());

        let handshakes = HandshakeNotifier::new(
            notifier,
            Duration::from_millis(config.order_book.toast_cooldown_ms),
            Duration::from_millis(config.order_book.toast_duration_ms),
        );
        let book_feed = Arc::new(OrderBookFeed::new(Arc::new(OrderBook::new()), handshakes));

        Ok(Self {
            subscriptions,
            prices,
            book_feed,
            task_status: Arc::new(TaskStatusCell::new()),
            progress_config: config.progress.progress_config(),
            latency,
            poller: None,
            local_orders: None,
            store,
        })
    }

    /// Count the user's own orders with `count` instead of the book's
    /// orders flagged local. Takes effect at `start`.
    pub fn with_local_order_count(mut self, count: LocalOrderCount) -> Self {
        self.local_orders = Some(count);
        self
    }

    /// Subscribe the order book and MPC topics and start the progress
    /// poller. Calling it again is a no-op for whatever is already running.
    pub async fn start(&mut self) {
        let (book_id, mpc_id) = self.book_feed.attach(&self.subscriptions).await;
        if book_id.is_none() || mpc_id.is_none() {
            warn!(
                order_book = book_id.is_some(),
                mpc = mpc_id.is_some(),
                "Session started without live order book updates"
            );
        }

        if self.poller.is_none() {
            let local_orders: LocalOrderCount = match &self.local_orders {
                Some(count) => count.clone(),
                None => {
                    let book = self.book_feed.book().clone();
                    Arc::new(move || book.local_order_count())
                }
            };
            self.poller = Some(ProgressPoller::spawn(
                self.progress_config,
                self.latency.clone(),
                self.task_status.clone(),
                local_orders,
            ));
        }
        info!("Session started");
    }

    /// Observe a price stream. See `PriceFeed::observe_price`.
    pub async fn observe_price(
        &self,
        exchange: Exchange,
        base: Ticker,
        quote: Ticker,
        precision: Option<u32>,
    ) -> PriceObservation {
        self.prices
            .observe_price(exchange, base, quote, precision)
            .await
    }

    /// Query exchange health for the page showing `route`.
    pub async fn exchange_health(
        &self,
        query: &dyn HealthQuery,
        route: &TradingRoute,
    ) -> AppResult<ExchangeHealthReport> {
        let (base, quote) = route.health_pair();
        Ok(query.query_exchange_health(&base, &quote).await?)
    }

    pub fn prices(&self) -> &PriceFeed {
        &self.prices
    }

    pub fn price_cache(&self) -> &Arc<PriceCache> {
        self.prices.cache()
    }

    pub fn book_feed(&self) -> &Arc<OrderBookFeed> {
        &self.book_feed
    }

    pub fn order_book(&self) -> &Arc<OrderBook> {
        self.book_feed.book()
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    pub fn task_status(&self) -> &Arc<TaskStatusCell> {
        &self.task_status
    }

    pub fn progress_config(&self) -> &ProgressConfig {
        &self.progress_config
    }

    /// Latest progress evaluation; hidden until `start`.
    pub fn progress(&self) -> ProgressSnapshot {
        self.poller
            .as_ref()
            .map(ProgressPoller::current)
            .unwrap_or_default()
    }

    pub fn progress_updates(&self) -> Option<tokio::sync::watch::Receiver<ProgressSnapshot>> {
        self.poller.as_ref().map(ProgressPoller::subscribe)
    }

    pub fn direction(&self) -> Direction {
        storage::get_direction(self.store.as_ref())
    }

    pub fn set_direction(&self, direction: Direction) -> AppResult<()> {
        storage::set_direction(self.store.as_ref(), direction)
    }

    /// Release every subscription and stop the poller. Safe to call more
    /// than once.
    pub async fn shutdown(&mut self) {
        self.subscriptions.release_all();
        if let Some(mut poller) = self.poller.take() {
            poller.stop().await;
        }
        info!("Session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.subscriptions.release_all();
    }
}
