//! 编排模块：串联缓存、预算闸门、文本增强、重试传输与回退链的语音合成协调器。
//!
//! # Synthesis Orchestrator
//!
//! [`SynthesisOrchestrator`] sequences one synthesis request:
//!
//! 1. whitespace-only text returns empty audio
//! 2. voice resolution (request, then configured default)
//! 3. sentiment-based [`VoiceProfile`] selection
//! 4. cache lookup
//! 5. rate-limit reservation
//! 6. quota pre-flight
//! 7. prosody markup
//! 8. primary call through the [`RetryingTransport`], then usage recording and cache fill
//! 9. on any failure in 5-8, the [`FallbackChain`] with the original text
//!
//! ```rust,no_run
//! use resilient_tts::{SynthesisConfig, SynthesisOrchestrator, SynthesisRequest};
//!
//! # async fn run() -> resilient_tts::Result<()> {
//! let config = SynthesisConfig::from_file("tts.yaml")?.with_env_overrides();
//! let tts = SynthesisOrchestrator::builder(config).build()?;
//! let audio = tts.generate_speech(&SynthesisRequest::new("Good morning, Sir.")).await?;
//! # let _ = audio;
//! # Ok(())
//! # }
//! ```

mod builder;
mod generate;
mod signals;
mod stream;

pub use builder::SynthesisOrchestratorBuilder;
pub use signals::{MetricsSnapshot, SignalsSnapshot, SynthesisMetrics};
pub use stream::CancelHandle;

use crate::cache::{AudioCache, CacheKeyGenerator};
use crate::config::SynthesisConfig;
use crate::enhance::TextEnhancer;
use crate::fallback::FallbackChain;
use crate::provider::PrimaryProvider;
use crate::resilience::{QuotaTracker, UsageLedger};
use crate::transport::RetryingTransport;
use crate::types::{ProfileSelector, QuotaSnapshot, VoiceInfo, VoiceProfile};
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Coordinator for the synthesis pipeline.
///
/// Owns no long-lived state of its own: cache, ledger, quota tracker, transport
/// and fallback chain are shared handles, so several orchestrators (or clones)
/// may sit on one cache and one ledger.
#[derive(Clone)]
pub struct SynthesisOrchestrator {
    config: Arc<SynthesisConfig>,
    primary: Arc<dyn PrimaryProvider>,
    cache: Arc<AudioCache>,
    ledger: Arc<UsageLedger>,
    quota: Arc<QuotaTracker>,
    transport: Arc<RetryingTransport>,
    fallback: Arc<FallbackChain>,
    selector: Arc<ProfileSelector>,
    enhancer: Arc<TextEnhancer>,
    key_gen: Arc<CacheKeyGenerator>,
    metrics: Arc<SynthesisMetrics>,
    credential: Arc<str>,
}

impl SynthesisOrchestrator {
    pub fn builder(config: SynthesisConfig) -> SynthesisOrchestratorBuilder {
        SynthesisOrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<AudioCache> {
        &self.cache
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    pub fn fallback_chain(&self) -> &FallbackChain {
        &self.fallback
    }

    /// Ledger key for this orchestrator's credential (a fingerprint, never the secret).
    pub fn credential_id(&self) -> &str {
        &self.credential
    }

    /// The profile that would be used for `text`.
    pub fn profile_for(&self, text: &str) -> VoiceProfile {
        self.selector.select(text).1
    }

    /// Voices offered by the primary provider.
    pub async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        let primary = &self.primary;
        self.transport
            .execute("list_voices", &CancellationToken::new(), move |_| {
                primary.list_voices()
            })
            .await
    }

    /// Current quota; `None` when the account endpoint has never answered.
    pub async fn quota_snapshot(&self, force_refresh: bool) -> Option<QuotaSnapshot> {
        self.quota.get_snapshot(force_refresh).await
    }

    /// Point-in-time view of every counter and gauge.
    pub async fn signals(&self) -> SignalsSnapshot {
        SignalsSnapshot {
            metrics: self.metrics.snapshot(),
            cache: self.cache.stats(),
            cache_entries: self.cache.len().await,
            cache_bytes: self.cache.size_bytes().await,
            usage: self.ledger.snapshot(&self.credential),
            quota: self.quota.cached(),
        }
    }
}
