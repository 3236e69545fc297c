//! HTTP error types

use crate::types::HttpMethod;
use std::time::Duration;

/// Error type for HTTP operations
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{method} {path} returned status {status}")]
    Status {
        method: HttpMethod,
        path: String,
        status: u16,
    },

    #[error("{path} did not answer within {after:?}")]
    Timeout { path: String, after: Duration },

    #[error("request to {path} cancelled")]
    Cancelled { path: String },
}

impl HttpError {
    /// True when the request was abandoned because its scope was cancelled.
    ///
    /// These are expected at the end of a run and are not worth an error log.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HttpError::Cancelled { .. })
    }
}
