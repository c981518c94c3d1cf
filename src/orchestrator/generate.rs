use super::SynthesisOrchestrator;
use crate::cache::CacheKey;
use crate::types::{SynthesisRequest, VoiceProfile};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A request resolved against configuration, before any budget is touched.
pub(super) struct Prepared {
    pub voice: String,
    pub profile: VoiceProfile,
    pub key: CacheKey,
    pub characters: u64,
}

impl SynthesisOrchestrator {
    /// Synthesize `request` to a complete audio clip.
    ///
    /// Whitespace-only text returns empty audio. Configuration errors and
    /// cancellation are returned as-is; every other failure is routed to the
    /// fallback chain (when enabled) and surfaces as `SynthesisUnavailable`
    /// only if that fails too.
    pub async fn generate_speech(&self, request: &SynthesisRequest) -> Result<Bytes> {
        self.generate_speech_with_cancel(request, &CancellationToken::new())
            .await
    }

    pub async fn generate_speech_with_cancel(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        if request.is_blank() {
            return Ok(Bytes::new());
        }
        let prepared = self.prepare(request)?;

        if let Some(audio) = self.cache.get(&prepared.key).await {
            return Ok(audio);
        }

        let start = Instant::now();
        match self.synthesize_primary(&prepared, request.text(), cancel).await {
            Ok(audio) => {
                debug!(
                    voice_id = prepared.voice.as_str(),
                    bytes = audio.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "primary synthesis complete"
                );
                Ok(audio)
            }
            Err(e) if e.is_terminal() => Err(e),
            Err(e) => self.synthesize_fallback(request.text(), e, cancel).await,
        }
    }

    pub(super) fn prepare(&self, request: &SynthesisRequest) -> Result<Prepared> {
        let voice = request
            .voice_id()
            .or(self.config.voice_id.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "no voice id on the request and no default voice configured",
                    ErrorContext::new()
                        .with_field_path("voice_id")
                        .with_source("orchestrator"),
                )
            })?
            .to_string();

        let (sentiment, profile) = self.selector.select(request.text());
        debug!(voice_id = voice.as_str(), ?sentiment, "profile selected");

        let key = self.key_gen.generate(request.text(), &voice, &profile);
        Ok(Prepared {
            voice,
            profile,
            key,
            characters: request.char_count(),
        })
    }

    /// Rate-limit reservation and quota pre-flight. Nothing here touches the
    /// synthesis endpoint.
    pub(super) async fn admit(&self, prepared: &Prepared, cancel: &CancellationToken) -> Result<()> {
        let reservation = if self.config.enable_rate_limiting {
            match self.ledger.try_acquire(&self.credential, prepared.characters) {
                Some(r) => Some(r),
                None => {
                    self.metrics.record_rate_limit_rejection();
                    let retry_after = self.ledger.snapshot(&self.credential).retry_after;
                    info!(credential = &*self.credential, "request denied by usage ledger");
                    return Err(Error::RateLimited {
                        credential: self.credential.to_string(),
                        retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
                    });
                }
            }
        } else {
            None
        };
        let refund = || {
            if let Some(r) = reservation {
                self.ledger.release(&self.credential, r);
            }
        };

        if self.config.enable_quota_tracking {
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    refund();
                    return Err(Error::Cancelled);
                }
                s = self.quota.get_snapshot(false) => s,
            };
            if let Some(q) = snapshot {
                if !q.allows(prepared.characters) {
                    self.metrics.record_quota_rejection();
                    refund();
                    info!(
                        required = prepared.characters,
                        remaining = q.characters_remaining,
                        "request denied by quota pre-flight"
                    );
                    return Err(Error::QuotaExceeded {
                        required: prepared.characters,
                        remaining: q.characters_remaining,
                    });
                }
            }
        }
        Ok(())
    }

    pub(super) fn enhanced_text(&self, text: &str) -> String {
        if self.config.enable_enhancement {
            self.enhancer.enhance(text)
        } else {
            text.to_string()
        }
    }

    /// Budget bookkeeping after the provider accepted a request.
    pub(super) fn record_success(&self, prepared: &Prepared) {
        self.metrics.record_primary_success();
        if self.config.enable_rate_limiting {
            self.ledger.record(&self.credential, prepared.characters);
        }
        if self.config.enable_quota_tracking {
            self.quota.record_usage(prepared.characters);
        }
    }

    async fn synthesize_primary(
        &self,
        prepared: &Prepared,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        self.admit(prepared, cancel).await?;

        let enhanced = self.enhanced_text(text);
        let primary = &self.primary;
        let text = enhanced.as_str();
        let voice = prepared.voice.as_str();
        let profile = &prepared.profile;

        let audio = self
            .transport
            .execute("synthesize", cancel, move |_| {
                primary.synthesize(text, Some(voice), Some(profile))
            })
            .await?;

        self.record_success(prepared);
        self.cache.put(&prepared.key, audio.clone()).await;
        Ok(audio)
    }

    /// Route a failed request to the fallback chain with the original text.
    pub(super) async fn synthesize_fallback(
        &self,
        text: &str,
        cause: Error,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        if !self.config.enable_fallback {
            return Err(cause);
        }
        if self.fallback.is_empty() {
            self.metrics.record_fallback(false);
            return Err(Error::unavailable(
                "primary synthesis failed and no fallback providers are registered",
                Some(cause),
            ));
        }
        warn!(error = %cause, fallbacks = self.fallback.len(), "primary path failed, using fallback");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            r = self.fallback.synthesize(text, None) => r,
        };
        self.metrics.record_fallback(result.is_ok());
        result
    }
}
