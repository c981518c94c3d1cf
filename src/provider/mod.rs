//! 语音合成提供方：主提供方（ElevenLabs 兼容）与可作为回退的 OpenAI 兼容实现。
//!
//! # Synthesis Providers
//!
//! Providers are capability-typed. Anything implementing [`SpeechSynthesizer`]
//! can sit in a [`FallbackChain`](crate::fallback::FallbackChain); the primary
//! additionally implements [`PrimaryProvider`] for voice listing and quota.
//!
//! | Provider | Role |
//! |----------|------|
//! | [`HttpSpeechProvider`] | ElevenLabs-compatible primary |
//! | [`OpenAiSpeechProvider`] | OpenAI-compatible `/v1/audio/speech`, typically a fallback |

mod http;
mod openai;

pub use http::HttpSpeechProvider;
pub use openai::{OpenAiSpeechProvider, OpenAiSpeechProviderBuilder};

use crate::resilience::QuotaSource;
use crate::types::{QuotaSnapshot, VoiceInfo, VoiceProfile};
use crate::{AudioStream, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Text in, audio out.
///
/// `voice` and `profile` are hints; implementations may ignore either.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        profile: Option<&VoiceProfile>,
    ) -> Result<Bytes>;

    /// Chunked synthesis. The default delivers the whole clip as one chunk.
    async fn stream_synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        profile: Option<&VoiceProfile>,
    ) -> Result<AudioStream> {
        let audio = self.synthesize(text, voice, profile).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(audio) })))
    }
}

/// The metered remote provider.
#[async_trait]
pub trait PrimaryProvider: SpeechSynthesizer {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>>;
    async fn get_quota(&self) -> Result<QuotaSnapshot>;
}

/// Adapts a [`PrimaryProvider`] into the quota tracker's source.
pub struct ProviderQuota(pub Arc<dyn PrimaryProvider>);

#[async_trait]
impl QuotaSource for ProviderQuota {
    async fn fetch_quota(&self) -> Result<QuotaSnapshot> {
        self.0.get_quota().await
    }
}
