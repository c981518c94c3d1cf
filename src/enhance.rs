//! Prosody markup for the primary provider.
//!
//! [`TextEnhancer`] is a pure string transform: the same input always yields
//! the same output, and nothing is shared between calls.
//!
//! ```rust
//! use resilient_tts::enhance::TextEnhancer;
//!
//! let out = TextEnhancer::new().enhance("System error detected, Sir.");
//! assert_eq!(
//!     out,
//!     "<break time=\"0.3s\"/><emphasis level=\"strong\">System</emphasis> error\
//!      <break time=\"0.2s\"/> detected, Sir<break time=\"0.4s\"/>."
//! );
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

const OPENER_BREAK: &str = r#"<break time="0.3s"/>"#;
const ALERT_BREAK: &str = r#"<break time="0.2s"/>"#;
const ADDRESS_BREAK: &str = r#"<break time="0.4s"/>"#;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("valid regex"));

const ALERT_OPENERS: &[&str] = &[
    "system", "warning", "alert", "attention", "caution", "critical", "error", "danger",
    "urgent", "emergency", "notice",
];

const ALERT_KEYWORDS: &[&str] = &[
    "error", "errors", "warning", "alert", "critical", "failure", "failed", "danger", "urgent",
    "emergency", "breach",
];

const ADDRESS_TERMS: &[&str] = &["sir", "madam", "ma'am", "boss", "captain"];

const ACRONYMS: &[(&str, &str)] = &[
    ("API", "EY1 P IY1 AY1"),
    ("CPU", "S IY1 P IY1 Y UW1"),
    ("GPU", "JH IY1 P IY1 Y UW1"),
    ("RAM", "R AE1 M"),
    ("SSD", "EH1 S EH1 S D IY1"),
    ("USB", "Y UW1 EH1 S B IY1"),
    ("URL", "Y UW1 AA1 R EH1 L"),
    ("HTTP", "EY1 CH T IY1 T IY1 P IY1"),
    ("JSON", "JH EY1 S AH0 N"),
    ("SQL", "S IY1 K W AH0 L"),
    ("DNS", "D IY1 EH1 N EH1 S"),
    ("SSH", "EH1 S EH1 S EY1 CH"),
    ("AI", "EY1 AY1"),
    ("UI", "Y UW1 AY1"),
    ("TTS", "T IY1 T IY1 EH1 S"),
];

/// Rewrites plain text into SSML-style prosody markup.
///
/// - Alert-like sentence openers get a short lead-in pause and strong emphasis.
/// - Alert keywords are followed by a short pause.
/// - Address terms ("Sir", "Captain", ...) are followed by a longer pause.
/// - Known technical acronyms carry an ARPAbet pronunciation.
///
/// Input is XML-escaped first so user text can never inject markup.
#[derive(Debug, Clone)]
pub struct TextEnhancer {
    openers: HashSet<String>,
    alerts: HashSet<String>,
    address_terms: HashSet<String>,
    acronyms: HashMap<String, String>,
}

impl TextEnhancer {
    pub fn new() -> Self {
        let lower = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            openers: lower(ALERT_OPENERS),
            alerts: lower(ALERT_KEYWORDS),
            address_terms: lower(ADDRESS_TERMS),
            acronyms: ACRONYMS
                .iter()
                .map(|(a, ph)| (a.to_string(), ph.to_string()))
                .collect(),
        }
    }

    /// Register an extra acronym (matched case-sensitively).
    pub fn with_acronym(mut self, acronym: impl Into<String>, arpabet: impl Into<String>) -> Self {
        self.acronyms.insert(acronym.into(), arpabet.into());
        self
    }

    pub fn with_address_term(mut self, term: &str) -> Self {
        self.address_terms.insert(term.to_lowercase());
        self
    }

    pub fn enhance(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        let mut sentence_start = true;
        let mut last = 0;

        for m in WORD.find_iter(text) {
            let gap = &text[last..m.start()];
            if gap.contains(['.', '!', '?', '\n']) {
                sentence_start = true;
            }
            push_escaped(&mut out, gap);
            last = m.end();

            let word = m.as_str();
            let lower = word.to_lowercase();

            if sentence_start && self.openers.contains(&lower) {
                out.push_str(OPENER_BREAK);
                out.push_str(r#"<emphasis level="strong">"#);
                out.push_str(word);
                out.push_str("</emphasis>");
            } else if let Some(ph) = self.acronyms.get(word) {
                out.push_str(r#"<phoneme alphabet="cmu-arpabet" ph=""#);
                out.push_str(ph);
                out.push_str(r#"">"#);
                out.push_str(word);
                out.push_str("</phoneme>");
            } else {
                out.push_str(word);
            }

            if self.alerts.contains(&lower) {
                out.push_str(ALERT_BREAK);
            } else if self.address_terms.contains(&lower) {
                out.push_str(ADDRESS_BREAK);
            }
            sentence_start = false;
        }
        push_escaped(&mut out, &text[last..]);
        out
    }
}

impl Default for TextEnhancer {
    fn default() -> Self {
        Self::new()
    }
}

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_sentence_with_address_term() {
        let out = TextEnhancer::new().enhance("System error detected, Sir.");
        assert!(out.starts_with(
            r#"<break time="0.3s"/><emphasis level="strong">System</emphasis>"#
        ));
        assert!(out.contains(r#"error<break time="0.2s"/>"#));
        assert!(out.ends_with(r#"Sir<break time="0.4s"/>."#));
    }

    #[test]
    fn test_opener_only_at_sentence_start() {
        let out = TextEnhancer::new().enhance("Check the system. System ready");
        assert!(out.starts_with("Check the system. "));
        assert_eq!(out.matches("<emphasis").count(), 1);
    }

    #[test]
    fn test_acronyms_get_phonemes() {
        let out = TextEnhancer::new().enhance("The API uses JSON over HTTP");
        assert!(out.contains(r#"<phoneme alphabet="cmu-arpabet" ph="EY1 P IY1 AY1">API</phoneme>"#));
        assert!(out.contains(">JSON</phoneme>"));
        assert!(out.contains(">HTTP</phoneme>"));
        // lowercase words are not acronyms
        assert!(!TextEnhancer::new().enhance("an api call").contains("phoneme"));
    }

    #[test]
    fn test_custom_acronym_and_address_term() {
        let enhancer = TextEnhancer::new()
            .with_acronym("NASA", "N AE1 S AH0")
            .with_address_term("Doctor");
        let out = enhancer.enhance("Doctor, NASA called");
        assert_eq!(
            out,
            r#"Doctor<break time="0.4s"/>, <phoneme alphabet="cmu-arpabet" ph="N AE1 S AH0">NASA</phoneme> called"#
        );
    }

    #[test]
    fn test_markup_in_input_is_escaped() {
        let out = TextEnhancer::new().enhance("a < b & <break/>");
        assert_eq!(out, "a &lt; b &amp; &lt;break/&gt;");
    }

    #[test]
    fn test_plain_text_unchanged_and_deterministic() {
        let e = TextEnhancer::new();
        let text = "The weather is lovely today.";
        assert_eq!(e.enhance(text), text);
        assert_eq!(e.enhance("Ma'am, hello"), e.enhance("Ma'am, hello"));
        assert!(e.enhance("Ma'am, hello").starts_with(r#"Ma'am<break time="0.4s"/>,"#));
    }
}
