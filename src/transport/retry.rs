//! Bounded exponential backoff around a single network operation.

use crate::config::SynthesisConfig;
use crate::orchestrator::SynthesisMetrics;
use crate::transport::TransportError;
use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total tries = `max_retries + 1`).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per-attempt deadline; elapsing counts as a retryable transport failure.
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            max_retries: config.max_retry_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
            attempt_timeout: Some(config.request_timeout()).filter(|t| !t.is_zero()),
        }
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before retry number `retry` (1-based): `base * 2^retry`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Runs a network operation with retries.
///
/// Retryable: 5xx, 429, connection failures and per-attempt timeouts.
/// Any other failure ends the loop on the spot.
pub struct RetryingTransport {
    policy: RetryPolicy,
    metrics: Arc<SynthesisMetrics>,
}

impl RetryingTransport {
    pub fn new(policy: RetryPolicy, metrics: Arc<SynthesisMetrics>) -> Self {
        Self { policy, metrics }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// `attempt` is 0-based (first failure => attempt=0).
    pub(crate) fn decide(&self, err: &Error, attempt: u32) -> Decision {
        if !err.is_retryable() || attempt >= self.policy.max_retries {
            return Decision::Fail;
        }
        let delay = err
            .retry_after()
            .unwrap_or_else(|| self.policy.backoff(attempt + 1))
            .min(self.policy.max_delay);
        Decision::Retry { delay }
    }

    /// Execute `call` until it succeeds, fails permanently, or the retry budget runs out.
    ///
    /// `call` receives the 0-based attempt number. Cancellation is observed while the
    /// call is in flight and during backoff sleeps.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.metrics.record_transport_attempt();

            let fut = call(attempt);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                r = self.with_timeout(fut) => r,
            };

            let err = match result {
                Ok(v) => {
                    if attempt > 0 {
                        debug!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(v);
                }
                Err(e) => e,
            };

            match self.decide(&err, attempt) {
                Decision::Retry { delay } => {
                    self.metrics.record_retry();
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    if !delay.is_zero() {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(Error::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    attempt = attempt.saturating_add(1);
                }
                Decision::Fail => {
                    debug!(operation, attempt, error = %err, "giving up");
                    return Err(err);
                }
            }
        }
    }

    async fn with_timeout<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match self.policy.attempt_timeout {
            Some(t) => tokio::time::timeout(t, fut)
                .await
                .unwrap_or_else(|_| Err(Error::Transport(TransportError::Timeout(t)))),
            None => fut.await,
        }
    }
}
