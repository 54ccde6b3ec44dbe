//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeedError {
    pub fn drop_reason(&self) -> relay_telemetry::DropReason {
        match self {
            Self::UnknownEventType(_) => relay_telemetry::DropReason::UnknownType,
            Self::Malformed(_) | Self::Json(_) => relay_telemetry::DropReason::Malformed,
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
