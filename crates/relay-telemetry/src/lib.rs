//! Prometheus metrics and structured logging for relayer event synchronization.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters for received, dropped and throttled events

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{DropReason, Metrics};
