//! Voice profiles and keyword-based sentiment selection.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Synthesis parameters sent with every primary request.
///
/// `stability`, `similarity` and `style` are clamped to `[0, 1]`; `speaking_rate`
/// may exceed 1 but never drops below 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub stability: f32,
    pub similarity: f32,
    pub style: f32,
    pub speaking_rate: f32,
}

impl VoiceProfile {
    pub fn new(stability: f32, similarity: f32, style: f32, speaking_rate: f32) -> Self {
        Self {
            stability,
            similarity,
            style,
            speaking_rate,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            stability: clamp_unit(self.stability),
            similarity: clamp_unit(self.similarity),
            style: clamp_unit(self.style),
            speaking_rate: if self.speaking_rate.is_finite() {
                self.speaking_rate.max(0.0)
            } else {
                1.0
            },
        }
    }

    /// Stable textual form used in cache keys.
    pub fn fingerprint(&self) -> String {
        format!(
            "{:.3}/{:.3}/{:.3}/{:.3}",
            self.stability, self.similarity, self.style, self.speaking_rate
        )
    }
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self::new(0.5, 0.75, 0.0, 1.0)
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Coarse sentiment of the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Concerned,
    Excited,
    Calm,
    Neutral,
}

const CONCERNED_WORDS: &[&str] = &[
    "error", "errors", "warning", "failure", "failed", "fail", "critical", "danger",
    "dangerous", "alert", "problem", "issue", "unable", "crash", "crashed", "breach",
    "urgent", "emergency",
];
const EXCITED_WORDS: &[&str] = &[
    "great", "excellent", "amazing", "awesome", "success", "successful", "congratulations",
    "fantastic", "wonderful", "brilliant", "complete", "completed", "done",
];
const CALM_WORDS: &[&str] = &[
    "calm", "relax", "relaxing", "rest", "quiet", "gently", "slowly", "peaceful", "sleep",
    "goodnight", "breathe",
];

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("valid regex"));

impl Sentiment {
    /// Classify text by keyword. Concerned outranks excited, which outranks calm.
    pub fn classify(text: &str) -> Self {
        let mut excited = false;
        let mut calm = false;
        for m in WORD.find_iter(text) {
            let word = m.as_str().to_lowercase();
            if CONCERNED_WORDS.contains(&word.as_str()) {
                return Sentiment::Concerned;
            }
            excited |= EXCITED_WORDS.contains(&word.as_str());
            calm |= CALM_WORDS.contains(&word.as_str());
        }
        if excited {
            Sentiment::Excited
        } else if calm {
            Sentiment::Calm
        } else {
            Sentiment::Neutral
        }
    }
}

/// Picks a [`VoiceProfile`] for a piece of text.
///
/// Neutral text, and any sentiment without a preset, gets the default profile.
#[derive(Debug, Clone)]
pub struct ProfileSelector {
    default_profile: VoiceProfile,
    presets: HashMap<Sentiment, VoiceProfile>,
}

impl ProfileSelector {
    pub fn new(default_profile: VoiceProfile) -> Self {
        let mut presets = HashMap::new();
        presets.insert(Sentiment::Concerned, VoiceProfile::new(0.75, 0.85, 0.2, 0.95));
        presets.insert(Sentiment::Excited, VoiceProfile::new(0.35, 0.75, 0.6, 1.1));
        presets.insert(Sentiment::Calm, VoiceProfile::new(0.85, 0.7, 0.0, 0.9));
        Self {
            default_profile: default_profile.clamped(),
            presets,
        }
    }

    pub fn with_preset(mut self, sentiment: Sentiment, profile: VoiceProfile) -> Self {
        self.presets.insert(sentiment, profile.clamped());
        self
    }

    pub fn default_profile(&self) -> VoiceProfile {
        self.default_profile
    }

    pub fn profile_for(&self, sentiment: Sentiment) -> VoiceProfile {
        if sentiment == Sentiment::Neutral {
            return self.default_profile;
        }
        self.presets
            .get(&sentiment)
            .copied()
            .unwrap_or(self.default_profile)
    }

    pub fn select(&self, text: &str) -> (Sentiment, VoiceProfile) {
        let sentiment = Sentiment::classify(text);
        (sentiment, self.profile_for(sentiment))
    }
}

impl Default for ProfileSelector {
    fn default() -> Self {
        Self::new(VoiceProfile::default())
    }
}
