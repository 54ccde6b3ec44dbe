//! Order book and MPC topic handlers.

use crate::error::FeedResult;
use crate::notify::HandshakeNotifier;
use crate::order_book::{ApplyOutcome, OrderBook};
use crate::parser::{BookEvent, MessageParser};
use relay_bus::{MessageHandler, SubscriptionId, SubscriptionManager, Topic};
use relay_telemetry::Metrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Folds order book and MPC messages into an `OrderBook`.
pub struct OrderBookFeed {
    book: Arc<OrderBook>,
    notifier: HandshakeNotifier,
    parser: MessageParser,
}

impl OrderBookFeed {
    pub fn new(book: Arc<OrderBook>, notifier: HandshakeNotifier) -> Self {
        Self {
            book,
            notifier,
            parser: MessageParser::new(),
        }
    }

    pub fn book(&self) -> &Arc<OrderBook> {
        &self.book
    }

    pub fn parser(&self) -> &MessageParser {
        &self.parser
    }

    pub fn notifier(&self) -> &HandshakeNotifier {
        &self.notifier
    }

    /// Handle one order book topic message. Undecodable messages and
    /// unexpected event types are logged and dropped.
    pub fn handle_order_book_message(&self, message: &str) -> Option<ApplyOutcome> {
        let event = self.decode(Topic::OrderBook, self.parser.parse_order_book_event(message))?;
        Some(self.book.apply(&event))
    }

    /// Handle one MPC topic message.
    ///
    /// The book is updated unconditionally; the toast is subject to its own
    /// cooldown and is shown even when the order is not in the book.
    pub fn handle_mpc_message(&self, message: &str) -> Option<ApplyOutcome> {
        let event = self.decode(Topic::Mpc, self.parser.parse_mpc_event(message))?;
        let outcome = self.book.apply(&event);
        self.notifier.notify(&event, Instant::now());
        Some(outcome)
    }

    /// Subscribe the order book and MPC topics in `subscriptions`' scope.
    /// Already subscribed topics are left alone.
    pub async fn attach(
        self: &Arc<Self>,
        subscriptions: &SubscriptionManager,
    ) -> (Option<SubscriptionId>, Option<SubscriptionId>) {
        let feed = self.clone();
        let book_handler: MessageHandler = Arc::new(move |message: &str| {
            feed.handle_order_book_message(message);
        });
        let feed = self.clone();
        let mpc_handler: MessageHandler = Arc::new(move |message: &str| {
            feed.handle_mpc_message(message);
        });

        let book_id = subscriptions.ensure_handler(Topic::OrderBook, book_handler).await;
        let mpc_id = subscriptions.ensure_handler(Topic::Mpc, mpc_handler).await;
        (book_id, mpc_id)
    }

    fn decode(&self, topic: Topic, result: FeedResult<BookEvent>) -> Option<BookEvent> {
        match result {
            Ok(event) => Some(event),
            Err(e) => {
                Metrics::event_dropped(topic.kind(), e.drop_reason());
                warn!(topic = %topic, error = %e, "Dropping event");
                None
            }
        }
    }
}
