//! Event bus error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Registration failed for {topic}: {reason}")]
    Registration { topic: String, reason: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Relayer unavailable: {0}")]
    Unavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BusResult<T> = Result<T, BusError>;
