//! Error types for relay-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Unknown task phase: {0}")]
    UnknownTaskPhase(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
