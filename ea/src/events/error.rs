//! Event system error types

use std::time::Duration;

use eventstore::StoreError;
use thiserror::Error;

/// Errors from event system operations
#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("event system unavailable: {0}")]
    Unavailable(String),

    #[error("event system did not answer within {0:?}")]
    Timeout(Duration),

    /// A write timed out after it was handed over, so it may have landed
    #[error("no answer from {op} within {after:?}; the change may still have been applied")]
    Unconfirmed { op: String, after: Duration },

    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for EventSystemError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => EventSystemError::NotFound(format!("{} {}", entity, id)),
            other => EventSystemError::Store(other),
        }
    }
}
