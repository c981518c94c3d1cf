//! Network transport: HTTP plumbing and the retry loop wrapped around every provider call.

mod http;
mod retry;

pub use http::{AuthScheme, HttpTransport};
pub use retry::{RetryPolicy, RetryingTransport};

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Connection resets, timeouts and body read failures are worth another attempt;
    /// malformed requests are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Http(e) => !e.is_builder() && !e.is_redirect(),
            TransportError::Timeout(_) => true,
            TransportError::Other(_) => true,
        }
    }
}
