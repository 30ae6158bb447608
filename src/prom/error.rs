use std::time::Duration;
use thiserror::Error;

/// Why an attempt failed in a way worth retrying
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransientCause {
    #[error("network error: {0}")]
    Network(String),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("server error {status}: {body}")]
    ServerStatus { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Network failure, timeout or 5xx; eligible for retry
    #[error("transient transport failure: {0}")]
    Transient(TransientCause),

    /// 4xx (or any other non-success status below 500); never retried
    #[error("request rejected with status {status}: {body}")]
    Permanent { status: u16, body: String },

    /// The request could not be built, e.g. a malformed base URL; never retried
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid window: {0:?}")]
    InvalidWindow(String),

    #[error("invalid step: {0:?}")]
    InvalidStep(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("gave up after {attempts} attempts, last error: {last}")]
    RetryExhausted { attempts: u32, last: TransportError },

    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backend returned an error: {0}")]
    Backend(String),
}
