use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Voice metadata as listed by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_voice() {
        let v: VoiceInfo = serde_json::from_str(r#"{"voice_id":"abc"}"#).unwrap();
        assert_eq!(v.voice_id, "abc");
        assert!(v.name.is_empty());
        assert!(v.labels.is_empty());
    }

    #[test]
    fn test_deserialize_full_voice() {
        let v: VoiceInfo = serde_json::from_str(
            r#"{"voice_id":"abc","name":"Rachel","category":"premade",
                "labels":{"accent":"american"},"preview_url":"https://x/y.mp3","extra":1}"#,
        )
        .unwrap();
        assert_eq!(v.name, "Rachel");
        assert_eq!(v.category.as_deref(), Some("premade"));
        assert_eq!(v.labels.get("accent").map(String::as_str), Some("american"));
    }
}
