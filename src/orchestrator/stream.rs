use super::generate::Prepared;
use super::SynthesisOrchestrator;
use crate::cache::{AudioCache, CacheKey};
use crate::transport::TransportError;
use crate::types::SynthesisRequest;
use crate::{AudioStream, Error, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancels the stream it was handed out with.
///
/// Cancelling ends the stream at the next poll and drops the upstream
/// connection; no further chunks are yielded.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

struct CacheFill {
    cache: Arc<AudioCache>,
    key: CacheKey,
}

impl SynthesisOrchestrator {
    /// Stream audio for `request` as chunks.
    ///
    /// When streaming is disabled in the config, or the request was not built
    /// with [`streaming(true)`](SynthesisRequest::streaming), the clip is
    /// synthesized whole and sliced into `streaming_chunk_size` pieces, so
    /// callers see one contract either way.
    pub async fn stream_speech(
        &self,
        request: &SynthesisRequest,
    ) -> Result<(AudioStream, CancelHandle)> {
        let token = CancellationToken::new();
        let stream = self
            .stream_speech_with_cancel(request, token.clone())
            .await?;
        Ok((stream, CancelHandle { token }))
    }

    /// Like [`stream_speech`](Self::stream_speech) with a caller-owned token.
    ///
    /// Retries and fallback happen only before the first chunk is yielded. A
    /// primary failure after that yields one `SynthesisUnavailable` item and
    /// ends the stream, as does a chunk that takes longer than
    /// `request_timeout_ms` to arrive. Cancellation at any point produces a
    /// stream that simply ends.
    pub async fn stream_speech_with_cancel(
        &self,
        request: &SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<AudioStream> {
        match self.open_stream(request, &cancel).await {
            Err(Error::Cancelled) => Ok(Box::pin(futures::stream::empty())),
            other => other,
        }
    }

    async fn open_stream(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<AudioStream> {
        let chunk_size = self.config.streaming_chunk_size;

        if !self.config.enable_streaming || !request.is_streaming() {
            let audio = self.generate_speech_with_cancel(request, cancel).await?;
            return Ok(deliver(None, chunked(audio, chunk_size), cancel.clone(), None, None));
        }

        if request.is_blank() {
            return Ok(Box::pin(futures::stream::empty()));
        }
        let prepared = self.prepare(request)?;

        if let Some(audio) = self.cache.get(&prepared.key).await {
            return Ok(deliver(None, chunked(audio, chunk_size), cancel.clone(), None, None));
        }

        match self.stream_primary(&prepared, request.text(), cancel).await {
            Ok(stream) => Ok(stream),
            Err(e) if e.is_terminal() => Err(e),
            Err(e) => self.stream_fallback(request.text(), e, cancel).await,
        }
    }

    async fn stream_primary(
        &self,
        prepared: &Prepared,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<AudioStream> {
        self.admit(prepared, cancel).await?;

        let enhanced = self.enhanced_text(text);
        let primary = &self.primary;
        let text = enhanced.as_str();
        let voice = prepared.voice.as_str();
        let profile = &prepared.profile;

        // open and peek: an attempt only counts as delivered once it yields audio
        let opened = self
            .transport
            .execute("stream", cancel, move |_| async move {
                let mut stream = primary
                    .stream_synthesize(text, Some(voice), Some(profile))
                    .await?;
                match stream.next().await {
                    Some(Ok(first)) => Ok(Some((first, stream))),
                    Some(Err(e)) => Err(e),
                    None => Ok(None),
                }
            })
            .await?;

        self.record_success(prepared);
        match opened {
            Some((first, rest)) => {
                debug!(voice_id = voice, "primary stream committed");
                let fill = self.cache.is_enabled().then(|| CacheFill {
                    cache: self.cache.clone(),
                    key: prepared.key.clone(),
                });
                Ok(deliver(Some(first), rest, cancel.clone(), self.read_timeout(), fill))
            }
            None => Ok(Box::pin(futures::stream::empty())),
        }
    }

    async fn stream_fallback(
        &self,
        text: &str,
        cause: Error,
        cancel: &CancellationToken,
    ) -> Result<AudioStream> {
        if !self.config.enable_fallback {
            return Err(cause);
        }
        if self.fallback.is_empty() {
            self.metrics.record_fallback(false);
            return Err(Error::unavailable(
                "primary stream failed and no fallback providers are registered",
                Some(cause),
            ));
        }
        warn!(error = %cause, "primary stream failed before first chunk, using fallback");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            r = self.fallback.stream(text, None) => r,
        };
        self.metrics.record_fallback(result.is_ok());
        Ok(deliver(None, result?, cancel.clone(), self.read_timeout(), None))
    }

    fn read_timeout(&self) -> Option<Duration> {
        Some(self.config.request_timeout()).filter(|t| !t.is_zero())
    }
}

/// Forward `first` then `rest`, stopping at cancellation. Errors after
/// delivery began, including a read that outlasts `read_timeout`, are reported
/// once as `SynthesisUnavailable`. A clean end stores the assembled clip when
/// `fill` is set.
fn deliver(
    first: Option<Bytes>,
    mut rest: AudioStream,
    cancel: CancellationToken,
    read_timeout: Option<Duration>,
    fill: Option<CacheFill>,
) -> AudioStream {
    Box::pin(async_stream::stream! {
        let mut collected = fill.as_ref().map(|_| BytesMut::new());

        if !cancel.is_cancelled() {
            if let Some(chunk) = first {
                if let Some(buf) = collected.as_mut() {
                    buf.extend_from_slice(&chunk);
                }
                yield Ok(chunk);
            }

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("audio stream cancelled");
                        break;
                    }
                    item = next_chunk(&mut rest, read_timeout) => item,
                };
                match next {
                    Some(Ok(chunk)) => {
                        if let Some(buf) = collected.as_mut() {
                            buf.extend_from_slice(&chunk);
                        }
                        yield Ok(chunk);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "audio stream failed after partial delivery");
                        let err = match e {
                            e @ Error::SynthesisUnavailable { .. } => e,
                            e => Error::unavailable("audio stream interrupted after partial delivery", Some(e)),
                        };
                        yield Err(err);
                        break;
                    }
                    None => {
                        if let (Some(fill), Some(buf)) = (fill.as_ref(), collected.take()) {
                            fill.cache.put(&fill.key, buf.freeze()).await;
                        }
                        break;
                    }
                }
            }
        }
    })
}

async fn next_chunk(rest: &mut AudioStream, read_timeout: Option<Duration>) -> Option<Result<Bytes>> {
    match read_timeout {
        Some(t) => match tokio::time::timeout(t, rest.next()).await {
            Ok(item) => item,
            Err(_) => Some(Err(Error::Transport(TransportError::Timeout(t)))),
        },
        None => rest.next().await,
    }
}

fn chunked(audio: Bytes, chunk_size: usize) -> AudioStream {
    let size = chunk_size.max(1);
    let len = audio.len();
    let chunks: Vec<Result<Bytes>> = (0..len)
        .step_by(size)
        .map(|i| Ok(audio.slice(i..(i + size).min(len))))
        .collect();
    Box::pin(futures::stream::iter(chunks))
}
