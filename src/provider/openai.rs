//! OpenAI-compatible speech endpoint.

use super::SpeechSynthesizer;
use crate::transport::{AuthScheme, HttpTransport};
use crate::types::VoiceProfile;
use crate::{AudioStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Speech provider for `/v1/audio/speech`-style APIs.
///
/// Only the speaking rate of a profile is honored (as `speed`).
pub struct OpenAiSpeechProvider {
    transport: HttpTransport,
    model: String,
    endpoint_path: String,
    default_voice: String,
    response_format: String,
}

impl OpenAiSpeechProvider {
    pub fn builder() -> OpenAiSpeechProviderBuilder {
        OpenAiSpeechProviderBuilder::new()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body(&self, text: &str, voice: Option<&str>, profile: Option<&VoiceProfile>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice.unwrap_or(&self.default_voice),
            "response_format": self.response_format,
        });
        if let Some(p) = profile {
            body["speed"] = serde_json::json!(p.speaking_rate.clamp(0.25, 4.0));
        }
        body
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        profile: Option<&VoiceProfile>,
    ) -> Result<Bytes> {
        let resp = self
            .transport
            .post_json(&self.endpoint_path, &[], &self.body(text, voice, profile), "audio/*")
            .await?;
        HttpTransport::read_body(resp).await
    }

    async fn stream_synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        profile: Option<&VoiceProfile>,
    ) -> Result<AudioStream> {
        let resp = self
            .transport
            .post_json(&self.endpoint_path, &[], &self.body(text, voice, profile), "audio/*")
            .await?;
        Ok(HttpTransport::into_audio_stream(resp))
    }
}

pub struct OpenAiSpeechProviderBuilder {
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    endpoint_path: Option<String>,
    voice: Option<String>,
    response_format: Option<String>,
    timeout: Duration,
}

impl OpenAiSpeechProviderBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            api_key: None,
            base_url: None,
            endpoint_path: None,
            voice: None,
            response_format: None,
            timeout: Duration::from_secs(60),
        }
    }
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = Some(path.into());
        self
    }
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenAiSpeechProvider> {
        let api_key = HttpTransport::resolve_api_key(self.api_key.as_deref(), "OPENAI_API_KEY")
            .ok_or_else(|| Error::configuration("API key required for the OpenAI-compatible provider"))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let endpoint_path = self
            .endpoint_path
            .unwrap_or_else(|| "/v1/audio/speech".to_string());
        let endpoint_path = if endpoint_path.starts_with('/') {
            endpoint_path
        } else {
            format!("/{}", endpoint_path)
        };
        let transport =
            HttpTransport::new(&base_url, api_key, self.timeout)?.with_auth(AuthScheme::Bearer);
        Ok(OpenAiSpeechProvider {
            transport,
            model: self.model.unwrap_or_else(|| "tts-1".to_string()),
            endpoint_path,
            default_voice: self.voice.unwrap_or_else(|| "alloy".to_string()),
            response_format: self.response_format.unwrap_or_else(|| "mp3".to_string()),
        })
    }
}

impl Default for OpenAiSpeechProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
