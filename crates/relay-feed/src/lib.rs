//! Price cache and order book reconciliation.
//!
//! Decodes relayer push messages and folds them into local stores:
//! - `PriceCache`/`PriceFeed`: one throttled, de-duplicated report per
//!   exchange/base/quote stream with reference-counted upstream subscriptions
//! - `OrderBook`/`OrderBookFeed`: last-write-wins order upserts and handshake
//!   status, with de-duplicated handshake notifications

pub mod book_feed;
pub mod error;
pub mod notify;
pub mod order_book;
pub mod parser;
pub mod price_cache;
pub mod price_feed;

pub use book_feed::OrderBookFeed;
pub use error::{FeedError, FeedResult};
pub use notify::{HandshakeNotifier, LogNotifier, Notifier, Toast, ToastGate, ToastId, ToastStatus};
pub use order_book::{ApplyOutcome, OrderBook};
pub use parser::{BookEvent, MessageParser, OrderUpsert, ParseStats};
pub use price_cache::{PriceCache, PriceCacheConfig, PriceDecision};
pub use price_feed::{PriceFeed, PriceObservation};
