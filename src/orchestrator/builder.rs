use super::{SynthesisMetrics, SynthesisOrchestrator};
use crate::cache::{AudioCache, CacheConfig, CacheKeyGenerator};
use crate::config::SynthesisConfig;
use crate::enhance::TextEnhancer;
use crate::fallback::FallbackChain;
use crate::provider::{HttpSpeechProvider, PrimaryProvider, ProviderQuota, SpeechSynthesizer};
use crate::resilience::{credential_fingerprint, LedgerConfig, QuotaTracker, UsageLedger};
use crate::transport::{RetryPolicy, RetryingTransport};
use crate::types::ProfileSelector;
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Builder for [`SynthesisOrchestrator`].
///
/// Anything not supplied is derived from the [`SynthesisConfig`]. Cache and
/// ledger may be injected to share them between orchestrators.
pub struct SynthesisOrchestratorBuilder {
    config: SynthesisConfig,
    primary: Option<Arc<dyn PrimaryProvider>>,
    fallbacks: Vec<Arc<dyn SpeechSynthesizer>>,
    selector: Option<ProfileSelector>,
    enhancer: Option<TextEnhancer>,
    cache: Option<Arc<AudioCache>>,
    ledger: Option<Arc<UsageLedger>>,
    retry_policy: Option<RetryPolicy>,
    credential: Option<String>,
}

impl SynthesisOrchestratorBuilder {
    pub fn new(config: SynthesisConfig) -> Self {
        Self {
            config,
            primary: None,
            fallbacks: Vec::new(),
            selector: None,
            enhancer: None,
            cache: None,
            ledger: None,
            retry_policy: None,
            credential: None,
        }
    }

    /// Use a custom primary provider instead of the HTTP provider built from config.
    pub fn primary(mut self, provider: Arc<dyn PrimaryProvider>) -> Self {
        self.primary = Some(provider);
        self
    }

    /// Append a fallback provider. Order of calls is the order of attempts.
    pub fn fallback(mut self, provider: Arc<dyn SpeechSynthesizer>) -> Self {
        self.fallbacks.push(provider);
        self
    }

    pub fn with_fallbacks(mut self, providers: Vec<Arc<dyn SpeechSynthesizer>>) -> Self {
        self.fallbacks = providers;
        self
    }

    pub fn profile_selector(mut self, selector: ProfileSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn enhancer(mut self, enhancer: TextEnhancer) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn shared_cache(mut self, cache: Arc<AudioCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn shared_ledger(mut self, ledger: Arc<UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Ledger identity. Defaults to a fingerprint of the configured API key.
    pub fn credential_id(mut self, id: impl Into<String>) -> Self {
        self.credential = Some(id.into());
        self
    }

    pub fn build(self) -> Result<SynthesisOrchestrator> {
        let config = self.config;
        config.validate()?;

        let primary: Arc<dyn PrimaryProvider> = match self.primary {
            Some(p) => p,
            None => Arc::new(HttpSpeechProvider::from_config(&config)?),
        };

        let metrics = Arc::new(SynthesisMetrics::new());

        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(AudioCache::new(
                CacheConfig::new()
                    .with_ttl(config.cache_ttl())
                    .with_max_size_bytes(config.max_cache_size_bytes)
                    .with_enabled(config.enable_caching),
            ))
        });

        let ledger = self.ledger.unwrap_or_else(|| {
            Arc::new(UsageLedger::new(
                LedgerConfig::per_minute(config.max_requests_per_minute)
                    .with_max_characters(config.max_characters_per_minute),
            ))
        });

        let quota = Arc::new(
            QuotaTracker::new(
                Arc::new(ProviderQuota(primary.clone())),
                config.quota_refresh_interval(),
            )
            .with_fetch_timeout(Some(config.request_timeout()))
            .with_metrics(metrics.clone()),
        );

        let transport = Arc::new(RetryingTransport::new(
            self.retry_policy
                .unwrap_or_else(|| RetryPolicy::from_config(&config)),
            metrics.clone(),
        ));

        let credential = self
            .credential
            .or_else(|| config.api_key.as_deref().map(credential_fingerprint))
            .unwrap_or_else(|| primary.name().to_string());

        let key_gen = CacheKeyGenerator::new()
            .with_salt(format!("{}/{}", config.model_id, config.output_format));

        let mut fallback = FallbackChain::new().with_call_timeout(Some(config.request_timeout()));
        for p in self.fallbacks {
            fallback.push(p);
        }

        info!(
            primary = primary.name(),
            fallbacks = fallback.len(),
            caching = config.enable_caching,
            rate_limiting = config.enable_rate_limiting,
            quota_tracking = config.enable_quota_tracking,
            streaming = config.enable_streaming,
            "synthesis orchestrator ready"
        );

        let selector = self
            .selector
            .unwrap_or_else(|| ProfileSelector::new(config.default_profile));

        Ok(SynthesisOrchestrator {
            primary,
            cache,
            ledger,
            quota,
            transport,
            fallback: Arc::new(fallback),
            selector: Arc::new(selector),
            enhancer: Arc::new(self.enhancer.unwrap_or_default()),
            key_gen: Arc::new(key_gen),
            metrics,
            credential: Arc::from(credential),
            config: Arc::new(config),
        })
    }
}
