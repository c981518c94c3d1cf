//! Ordered fallback over capability-typed synthesizers.

use crate::provider::SpeechSynthesizer;
use crate::transport::TransportError;
use crate::{AudioStream, Error, Result};
use bytes::Bytes;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Strategy list of alternate synthesizers, tried in order.
///
/// The chain has no notion of which provider is "primary"; it only knows the
/// [`SpeechSynthesizer`] capability. Profiles are never forwarded. With a call
/// timeout set, a provider that does not answer in time counts as failed and
/// the next one is tried.
#[derive(Clone, Default)]
pub struct FallbackChain {
    providers: Vec<Arc<dyn SpeechSynthesizer>>,
    call_timeout: Option<Duration>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn SpeechSynthesizer>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Bound each provider call (and, for streams, the wait for the first chunk).
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub fn push(&mut self, provider: Arc<dyn SpeechSynthesizer>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// First success wins; otherwise the last error wrapped in `SynthesisUnavailable`.
    pub async fn synthesize(&self, text: &str, voice_hint: Option<&str>) -> Result<Bytes> {
        let mut last_err: Option<Error> = None;
        for provider in &self.providers {
            match self.bounded(provider.synthesize(text, voice_hint, None)).await {
                Ok(audio) => {
                    debug!(provider = provider.name(), bytes = audio.len(), "fallback synthesized");
                    return Ok(audio);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "fallback provider failed");
                    last_err = Some(e);
                }
            }
        }
        Err(self.exhausted(last_err))
    }

    /// Streaming variant. A provider is committed to once it yields its first
    /// chunk; failures before that move on to the next provider.
    pub async fn stream(&self, text: &str, voice_hint: Option<&str>) -> Result<AudioStream> {
        let mut last_err: Option<Error> = None;
        for provider in &self.providers {
            let mut stream = match self
                .bounded(provider.stream_synthesize(text, voice_hint, None))
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "fallback stream failed to open");
                    last_err = Some(e);
                    continue;
                }
            };
            let first = self.bounded(async { Ok(stream.next().await) }).await;
            match first {
                Ok(Some(Ok(first))) => {
                    debug!(provider = provider.name(), "fallback stream committed");
                    return Ok(Box::pin(
                        futures::stream::once(async move { Ok(first) }).chain(stream),
                    ));
                }
                Ok(None) => return Ok(Box::pin(futures::stream::empty())),
                Ok(Some(Err(e))) | Err(e) => {
                    warn!(provider = provider.name(), error = %e, "fallback stream failed before first chunk");
                    last_err = Some(e);
                }
            }
        }
        Err(self.exhausted(last_err))
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.call_timeout {
            Some(t) => tokio::time::timeout(t, fut)
                .await
                .unwrap_or_else(|_| Err(Error::Transport(TransportError::Timeout(t)))),
            None => fut.await,
        }
    }

    fn exhausted(&self, last_err: Option<Error>) -> Error {
        if self.providers.is_empty() {
            return Error::unavailable("no fallback providers registered", None);
        }
        Error::unavailable(
            format!("all {} fallback providers failed", self.providers.len()),
            last_err,
        )
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.names())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
