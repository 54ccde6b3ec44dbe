//! Relayer event synchronization session.
//!
//! Wires the stores into one owned session per connection:
//! - `Session`: price feed, order book feed and progress poller over one
//!   event bus, torn down together
//! - `AppConfig`: TOML configuration with defaults for every field
//! - `KeyValueStore`: persisted trade direction
//! - `TradingRoute`: base/quote path normalization
//! - `replay`: drive a session from a recorded event log

pub mod config;
pub mod error;
pub mod replay;
pub mod route;
pub mod session;
pub mod storage;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use replay::{ReplayRecord, ReplaySummary, Replayer};
pub use route::{RouteResolution, TradingRoute};
pub use session::Session;
pub use storage::{get_direction, set_direction, InMemoryStore, JsonFileStore, KeyValueStore};
