/// A single synthesis request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    text: String,
    voice_id: Option<String>,
    streaming: bool,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: None,
            streaming: false,
        }
    }

    /// Override the configured default voice.
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into()).filter(|v| !v.trim().is_empty());
        self
    }

    /// Ask for incremental delivery. `stream_speech` reads this flag: without
    /// it the clip is synthesized whole and handed out in slices.
    pub fn streaming(mut self, enable: bool) -> Self {
        self.streaming = enable;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice_id(&self) -> Option<&str> {
        self.voice_id.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Whitespace-only text synthesizes to silence.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Billable length in Unicode scalar values.
    pub fn char_count(&self) -> u64 {
        self.text.chars().count() as u64
    }
}
