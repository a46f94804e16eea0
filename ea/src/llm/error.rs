//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during completion requests
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No API key configured")]
    MissingApiKey,
}

impl LlmError {
    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }

    /// Check if this is a transient network failure worth one more attempt
    ///
    /// Timeouts and rate limits are not transient here: a timeout already used
    /// the whole budget and a rate limit asks us to back off.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(e) => !e.is_timeout(),
            LlmError::RateLimited { .. }
            | LlmError::InvalidResponse(_)
            | LlmError::Timeout(_)
            | LlmError::Json(_)
            | LlmError::MissingApiKey => false,
        }
    }

    /// Get the retry duration if this is a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
