//! Core domain types for relayer event synchronization.
//!
//! This crate provides the types shared by every store in the workspace:
//! - `PriceKey`, `PriceReport`: Exchange price identity and reports
//! - `Price`: Precision-safe midpoint price
//! - `CounterpartyOrder`, `HandshakeState`: Order book entries
//! - `TaskType`, `TaskPhase`: Long-running relayer task identification
//! - `Direction`: Persisted buy/sell preference

pub mod decimal;
pub mod error;
pub mod market;
pub mod order;
pub mod task;
pub mod types;

pub use decimal::{Price, DEFAULT_PRICE_PRECISION};
pub use error::{CoreError, Result};
pub use market::{contains_lowercase, normalize_ticker, Exchange, PriceKey, Ticker};
pub use order::{CounterpartyOrder, Direction, HandshakeState, OrderId, OrderState};
pub use task::{TaskPhase, TaskStatus, TaskType};
pub use types::PriceReport;
