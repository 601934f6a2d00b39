//! User settings models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How replies to detected events are offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ReplyMode {
    /// Propose a canned reply for confirmation.
    Auto,
    /// Offer reply options to choose from.
    #[default]
    Suggest,
}

impl From<String> for ReplyMode {
    fn from(raw: String) -> Self {
        if raw.eq_ignore_ascii_case("auto") {
            ReplyMode::Auto
        } else {
            ReplyMode::Suggest
        }
    }
}

impl ReplyMode {
    pub fn request_param(&self) -> &'static str {
        match self {
            ReplyMode::Auto => "AUTO",
            ReplyMode::Suggest => "SUGGEST",
        }
    }
}

impl fmt::Display for ReplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplyMode::Auto => "auto",
            ReplyMode::Suggest => "suggest",
        })
    }
}

/// Register of a canned reply.
///
/// Unknown keys resolve to [`Tone::Polite`] rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Tone {
    #[default]
    Polite,
    Friendly,
    Formal,
}

impl Tone {
    /// Tones in presentation order.
    pub const ALL: [Tone; 3] = [Tone::Polite, Tone::Friendly, Tone::Formal];

    /// Resolve a tone key. Never fails.
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "friendly" => Tone::Friendly,
            "formal" => Tone::Formal,
            _ => Tone::Polite,
        }
    }

    /// Map a Korean tone label used by AI reply options.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "정중한" | "polite" => Some(Tone::Polite),
            "친근한" | "friendly" => Some(Tone::Friendly),
            "공식적" | "formal" => Some(Tone::Formal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Polite => "polite",
            Tone::Friendly => "friendly",
            Tone::Formal => "formal",
        }
    }

    pub fn request_param(&self) -> &'static str {
        match self {
            Tone::Polite => "POLITE",
            Tone::Friendly => "FRIENDLY",
            Tone::Formal => "FORMAL",
        }
    }
}

impl From<String> for Tone {
    fn from(raw: String) -> Self {
        Tone::from_key(&raw)
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest accepted auto-reply threshold.
pub const MAX_THRESHOLD: u8 = 100;

/// Reply-assistance configuration for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub reply_mode: ReplyMode,
    /// Auto-reply is offered only for rooms at or below this intimacy score.
    pub auto_reply_threshold: u8,
    pub default_tone: Tone,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reply_mode: ReplyMode::Suggest,
            auto_reply_threshold: 20,
            default_tone: Tone::Polite,
            notifications_enabled: true,
            sound_enabled: true,
        }
    }
}

impl Settings {
    /// Request body for persisting these settings.
    pub fn to_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            reply_mode: Some(self.reply_mode.request_param()),
            auto_reply_threshold: Some(self.auto_reply_threshold.min(MAX_THRESHOLD)),
            default_tone: Some(self.default_tone.request_param()),
            notifications_enabled: Some(self.notifications_enabled),
            sound_enabled: Some(self.sound_enabled),
        }
    }
}

/// Partial settings update body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reply_threshold: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_tone: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_from_key_defaults_to_polite() {
        assert_eq!(Tone::from_key("friendly"), Tone::Friendly);
        assert_eq!(Tone::from_key("FORMAL"), Tone::Formal);
        assert_eq!(Tone::from_key("xyz"), Tone::Polite);
        assert_eq!(Tone::from_key(""), Tone::Polite);
    }

    #[test]
    fn test_settings_deserialize() {
        let json = r#"{"replyMode":"auto","autoReplyThreshold":20,"defaultTone":"casual"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.reply_mode, ReplyMode::Auto);
        assert_eq!(s.default_tone, Tone::Polite);
        assert!(s.notifications_enabled);
    }

    #[test]
    fn test_settings_update_body() {
        let s = Settings {
            reply_mode: ReplyMode::Auto,
            default_tone: Tone::Friendly,
            ..Default::default()
        };
        let body = serde_json::to_value(s.to_update()).unwrap();
        assert_eq!(body["replyMode"], "AUTO");
        assert_eq!(body["defaultTone"], "FRIENDLY");
        assert_eq!(body["autoReplyThreshold"], 20);
    }
}
