//! Shared in-process providers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use resilient_tts::provider::{PrimaryProvider, SpeechSynthesizer};
use resilient_tts::{
    AudioStream, Error, QuotaSnapshot, Result, SynthesisConfig, VoiceInfo, VoiceProfile,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Config with fast retries and a default voice.
pub fn test_config() -> SynthesisConfig {
    SynthesisConfig {
        api_key: Some("test-key".into()),
        voice_id: Some("voice-1".into()),
        retry_base_delay_ms: 1,
        max_retry_delay_ms: 5,
        ..Default::default()
    }
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Scriptable primary provider.
pub struct MockPrimary {
    pub audio: Bytes,
    pub chunks: Vec<Bytes>,
    /// Every synthesize/stream call fails with this HTTP status.
    pub fail_status: Option<u16>,
    /// Streams yield this error after N chunks.
    pub stream_error_after: Option<usize>,
    /// Streams stop making progress after N chunks without ending.
    pub stream_stall_after: Option<usize>,
    pub delay: Duration,
    pub quota: Mutex<Option<(u64, u64)>>,
    /// `get_quota` never answers.
    pub quota_hangs: AtomicBool,

    pub synth_calls: AtomicU32,
    pub stream_calls: AtomicU32,
    pub quota_calls: AtomicU32,
    pub seen_text: Mutex<Vec<String>>,
    pub released: Arc<AtomicBool>,
}

impl MockPrimary {
    pub fn new() -> Self {
        Self {
            audio: Bytes::from_static(b"primary-audio"),
            chunks: vec![
                Bytes::from_static(b"one-"),
                Bytes::from_static(b"two-"),
                Bytes::from_static(b"three"),
            ],
            fail_status: None,
            stream_error_after: None,
            stream_stall_after: None,
            delay: Duration::ZERO,
            quota: Mutex::new(Some((0, 1_000_000))),
            quota_hangs: AtomicBool::new(false),
            synth_calls: AtomicU32::new(0),
            stream_calls: AtomicU32::new(0),
            quota_calls: AtomicU32::new(0),
            seen_text: Mutex::new(Vec::new()),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::new()
        }
    }

    pub fn with_quota(self, used: u64, limit: u64) -> Self {
        *self.quota.lock().unwrap() = Some((used, limit));
        self
    }

    pub fn synth_calls(&self) -> u32 {
        self.synth_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> u32 {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn last_text(&self) -> Option<String> {
        self.seen_text.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockPrimary {
    fn name(&self) -> &str {
        "mock-primary"
    }

    async fn synthesize(
        &self,
        text: &str,
        _voice: Option<&str>,
        _profile: Option<&VoiceProfile>,
    ) -> Result<Bytes> {
        self.synth_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_text.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.fail_status {
            Some(status) => Err(Error::remote(status, "scripted failure", None)),
            None => Ok(self.audio.clone()),
        }
    }

    async fn stream_synthesize(
        &self,
        text: &str,
        _voice: Option<&str>,
        _profile: Option<&VoiceProfile>,
    ) -> Result<AudioStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_text.lock().unwrap().push(text.to_string());
        if let Some(status) = self.fail_status {
            return Err(Error::remote(status, "scripted failure", None));
        }
        let chunks = self.chunks.clone();
        let error_after = self.stream_error_after;
        let stall_after = self.stream_stall_after;
        let delay = self.delay;
        let guard = ReleaseGuard(self.released.clone());
        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            for (i, chunk) in chunks.into_iter().enumerate() {
                if error_after == Some(i) {
                    yield Err(Error::remote(503, "connection reset mid-stream", None));
                    return;
                }
                if stall_after == Some(i) {
                    futures::future::pending::<()>().await;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(chunk);
            }
        }))
    }
}

#[async_trait]
impl PrimaryProvider for MockPrimary {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        Ok(vec![VoiceInfo {
            voice_id: "voice-1".into(),
            name: "Test".into(),
            category: None,
            labels: Default::default(),
            preview_url: None,
        }])
    }

    async fn get_quota(&self) -> Result<QuotaSnapshot> {
        self.quota_calls.fetch_add(1, Ordering::SeqCst);
        if self.quota_hangs.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        match *self.quota.lock().unwrap() {
            Some((used, limit)) => Ok(QuotaSnapshot::from_usage(used, limit)),
            None => Err(Error::remote(503, "account endpoint down", None)),
        }
    }
}

/// Fallback synthesizer that records what it was asked.
pub struct RecordingFallback {
    pub fail: bool,
    /// Never answers.
    pub hangs: bool,
    pub calls: AtomicU32,
    pub seen: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingFallback {
    pub fn new() -> Self {
        Self {
            fail: false,
            hangs: false,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hangs: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingFallback {
    fn name(&self) -> &str {
        "recording-fallback"
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        _profile: Option<&VoiceProfile>,
    ) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((text.to_string(), voice.map(str::to_string)));
        if self.hangs {
            futures::future::pending::<()>().await;
        }
        if self.fail {
            Err(Error::remote(500, "on-device engine crashed", None))
        } else {
            Ok(Bytes::from_static(b"fallback-audio"))
        }
    }
}
