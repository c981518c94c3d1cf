//! Configuration surface for the synthesis pipeline.
//!
//! Load from YAML or JSON, then overlay `TTS_*` environment variables:
//!
//! ```rust
//! use resilient_tts::config::SynthesisConfig;
//!
//! let cfg = SynthesisConfig::from_yaml_str(
//!     "voice_id: rachel\nmax_requests_per_minute: 30\nenable_streaming: false\n",
//! )
//! .unwrap();
//! assert_eq!(cfg.max_requests_per_minute, 30);
//! assert!(!cfg.enable_streaming);
//! ```

use crate::types::VoiceProfile;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Recognized options. Unknown keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub voice_id: Option<String>,
    pub base_url: String,
    pub model_id: String,
    pub output_format: String,
    pub default_profile: VoiceProfile,

    pub max_cache_size_bytes: usize,
    pub cache_ttl_secs: u64,

    pub max_requests_per_minute: u32,
    pub max_characters_per_minute: Option<u64>,
    pub quota_refresh_secs: u64,

    pub max_retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub request_timeout_ms: u64,

    pub streaming_chunk_size: usize,

    pub enable_caching: bool,
    pub enable_rate_limiting: bool,
    pub enable_quota_tracking: bool,
    pub enable_fallback: bool,
    pub enable_streaming: bool,
    pub enable_enhancement: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            voice_id: None,
            base_url: "https://api.elevenlabs.io".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            output_format: "mp3_44100_128".to_string(),
            default_profile: VoiceProfile::default(),
            max_cache_size_bytes: 50 * 1024 * 1024,
            cache_ttl_secs: 24 * 60 * 60,
            max_requests_per_minute: 60,
            max_characters_per_minute: None,
            quota_refresh_secs: 300,
            max_retry_attempts: 2,
            retry_base_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
            request_timeout_ms: 30_000,
            streaming_chunk_size: 4096,
            enable_caching: true,
            enable_rate_limiting: true,
            enable_quota_tracking: true,
            enable_fallback: true,
            enable_streaming: true,
            enable_enhancement: true,
        }
    }
}

impl SynthesisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a `.json`, `.yaml` or `.yml` file. Anything else is parsed as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_yaml_str(&raw),
        }
    }

    /// Overlay `TTS_*` environment variables onto this config.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    pub(crate) fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |name: &str| get(name).and_then(|v| parse_flag(&v));

        if let Some(v) = get("TTS_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = get("TTS_VOICE_ID") {
            self.voice_id = Some(v);
        }
        if let Some(v) = get("TTS_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("TTS_MODEL_ID") {
            self.model_id = v;
        }
        if let Some(v) = get("TTS_MAX_CACHE_BYTES").and_then(|v| v.parse().ok()) {
            self.max_cache_size_bytes = v;
        }
        if let Some(v) = get("TTS_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = get("TTS_MAX_RPM").and_then(|v| v.parse().ok()) {
            self.max_requests_per_minute = v;
        }
        if let Some(v) = get("TTS_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.max_retry_attempts = v;
        }
        if let Some(v) = get("TTS_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.request_timeout_ms = v;
        }
        if let Some(v) = flag("TTS_ENABLE_CACHING") {
            self.enable_caching = v;
        }
        if let Some(v) = flag("TTS_ENABLE_RATE_LIMITING") {
            self.enable_rate_limiting = v;
        }
        if let Some(v) = flag("TTS_ENABLE_QUOTA_TRACKING") {
            self.enable_quota_tracking = v;
        }
        if let Some(v) = flag("TTS_ENABLE_FALLBACK") {
            self.enable_fallback = v;
        }
        if let Some(v) = flag("TTS_ENABLE_STREAMING") {
            self.enable_streaming = v;
        }
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn quota_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.quota_refresh_secs)
    }

    /// Reject values that would make the pipeline misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.streaming_chunk_size == 0 {
            return Err(Error::validation_with_context(
                "streaming chunk size must be greater than zero",
                ErrorContext::new()
                    .with_field_path("streaming_chunk_size")
                    .with_source("config"),
            ));
        }
        if self.enable_rate_limiting && self.max_requests_per_minute == 0 {
            return Err(Error::validation_with_context(
                "max_requests_per_minute must be greater than zero when rate limiting is enabled",
                ErrorContext::new()
                    .with_field_path("max_requests_per_minute")
                    .with_source("config"),
            ));
        }
        if self.retry_base_delay_ms > self.max_retry_delay_ms {
            return Err(Error::validation_with_context(
                "retry_base_delay_ms exceeds max_retry_delay_ms",
                ErrorContext::new()
                    .with_field_path("retry_base_delay_ms")
                    .with_details(format!(
                        "{} > {}",
                        self.retry_base_delay_ms, self.max_retry_delay_ms
                    ))
                    .with_source("config"),
            ));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::validation_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("config"),
            )
        })?;
        Ok(())
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
