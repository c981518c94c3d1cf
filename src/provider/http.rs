use super::{PrimaryProvider, SpeechSynthesizer};
use crate::config::SynthesisConfig;
use crate::transport::HttpTransport;
use crate::types::{QuotaSnapshot, VoiceInfo, VoiceProfile};
use crate::{AudioStream, Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

/// ElevenLabs-compatible HTTP provider.
///
/// - `POST /v1/text-to-speech/{voice}` (and `/stream`) for audio
/// - `GET /v1/voices` for metadata
/// - `GET /v1/user/subscription` for the character quota
pub struct HttpSpeechProvider {
    transport: HttpTransport,
    model_id: String,
    output_format: String,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

#[derive(Deserialize)]
struct SubscriptionResponse {
    character_count: u64,
    character_limit: u64,
}

impl HttpSpeechProvider {
    pub fn new(
        transport: HttpTransport,
        model_id: impl Into<String>,
        output_format: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            model_id: model_id.into(),
            output_format: output_format.into(),
        }
    }

    /// Build from config, resolving the credential from config, keyring, then `TTS_API_KEY`.
    pub fn from_config(config: &SynthesisConfig) -> Result<Self> {
        let api_key = HttpTransport::resolve_api_key(config.api_key.as_deref(), "TTS_API_KEY")
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "no API key configured for the primary provider",
                    ErrorContext::new()
                        .with_field_path("api_key")
                        .with_details("set api_key, store one in the OS keyring, or export TTS_API_KEY"),
                )
            })?;
        let transport = HttpTransport::new(&config.base_url, api_key, config.request_timeout())?;
        Ok(Self::new(transport, &config.model_id, &config.output_format))
    }

    fn body(&self, text: &str, profile: &VoiceProfile) -> serde_json::Value {
        json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": profile.stability,
                "similarity_boost": profile.similarity,
                "style": profile.style,
                "use_speaker_boost": true,
                "speed": profile.speaking_rate,
            }
        })
    }

    fn voice_path(voice: Option<&str>, suffix: &str) -> Result<String> {
        let voice = voice.ok_or_else(|| Error::configuration("no voice id for the primary provider"))?;
        if voice.is_empty()
            || !voice
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::configuration_with_context(
                "voice id contains unsupported characters",
                ErrorContext::new()
                    .with_field_path("voice_id")
                    .with_details(voice.to_string()),
            ));
        }
        Ok(format!("/v1/text-to-speech/{}{}", voice, suffix))
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechProvider {
    fn name(&self) -> &str {
        "http-primary"
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        profile: Option<&VoiceProfile>,
    ) -> Result<Bytes> {
        let path = Self::voice_path(voice, "")?;
        let profile = profile.copied().unwrap_or_default();
        let resp = self
            .transport
            .post_json(
                &path,
                &[("output_format", self.output_format.as_str())],
                &self.body(text, &profile),
                "audio/mpeg",
            )
            .await?;
        HttpTransport::read_body(resp).await
    }

    async fn stream_synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        profile: Option<&VoiceProfile>,
    ) -> Result<AudioStream> {
        let path = Self::voice_path(voice, "/stream")?;
        let profile = profile.copied().unwrap_or_default();
        let resp = self
            .transport
            .post_json(
                &path,
                &[("output_format", self.output_format.as_str())],
                &self.body(text, &profile),
                "audio/mpeg",
            )
            .await?;
        Ok(HttpTransport::into_audio_stream(resp))
    }
}

#[async_trait]
impl PrimaryProvider for HttpSpeechProvider {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        let resp: VoicesResponse = self.transport.get_json("/v1/voices").await?;
        Ok(resp.voices)
    }

    async fn get_quota(&self) -> Result<QuotaSnapshot> {
        let sub: SubscriptionResponse = self.transport.get_json("/v1/user/subscription").await?;
        Ok(QuotaSnapshot::from_usage(sub.character_count, sub.character_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_path_validation() {
        assert_eq!(
            HttpSpeechProvider::voice_path(Some("21m00Tcm4TlvDq8ikWAM"), "/stream").unwrap(),
            "/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM/stream"
        );
        assert!(HttpSpeechProvider::voice_path(None, "").is_err());
        assert!(HttpSpeechProvider::voice_path(Some("../admin"), "").is_err());
    }

    #[test]
    fn test_missing_credential_is_configuration_error() {
        let cfg = SynthesisConfig {
            api_key: Some("  ".into()),
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        // keyring/env may supply a key on developer machines; only assert the error kind when absent
        if let Err(e) = HttpSpeechProvider::from_config(&cfg) {
            assert!(matches!(e, Error::Configuration { .. }));
        }
    }

    #[test]
    fn test_request_body_shape() {
        let transport = HttpTransport::new("http://localhost", "k", std::time::Duration::from_secs(1)).unwrap();
        let p = HttpSpeechProvider::new(transport, "eleven_multilingual_v2", "mp3_44100_128");
        let body = p.body("hi", &VoiceProfile::new(0.75, 0.85, 0.2, 0.95));
        assert_eq!(body["model_id"], "eleven_multilingual_v2");
        assert_eq!(body["voice_settings"]["use_speaker_boost"], true);
        assert!((body["voice_settings"]["stability"].as_f64().unwrap() - 0.75).abs() < 1e-6);
    }
}
