//! Settings handlers.

use colored::Colorize;
use katok::{ReplyMode, Settings, Tone};
use rust_i18n::t;
use serde::Serialize;

use crate::output::PlainPrint;

/// Current user settings.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsInfo {
    pub reply_mode: ReplyMode,
    pub auto_reply_threshold: u8,
    pub default_tone: Tone,
    pub notifications: bool,
    pub sound: bool,
}

impl From<&Settings> for SettingsInfo {
    fn from(s: &Settings) -> Self {
        Self {
            reply_mode: s.reply_mode,
            auto_reply_threshold: s.auto_reply_threshold,
            default_tone: s.default_tone,
            notifications: s.notifications_enabled,
            sound: s.sound_enabled,
        }
    }
}

fn on_off(flag: bool) -> String {
    if flag {
        t!("state_on").green().to_string()
    } else {
        t!("state_off").dimmed().to_string()
    }
}

impl PlainPrint for SettingsInfo {
    fn plain_print(&self) {
        println!("{:<16} {}", t!("reply_mode_label"), self.reply_mode.to_string().cyan());
        println!("{:<16} {}", t!("threshold_label"), self.auto_reply_threshold);
        println!("{:<16} {}", t!("tone_label"), self.default_tone);
        println!("{:<16} {}", t!("notifications_label"), on_off(self.notifications));
        println!("{:<16} {}", t!("sound_label"), on_off(self.sound));
    }
}

/// Requested settings changes; unset fields are left alone.
#[derive(Debug, Default, Clone)]
pub struct SettingsChange {
    pub reply_mode: Option<ReplyMode>,
    pub threshold: Option<u8>,
    pub tone: Option<Tone>,
    pub notifications: Option<bool>,
    pub sound: Option<bool>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        self.reply_mode.is_none()
            && self.threshold.is_none()
            && self.tone.is_none()
            && self.notifications.is_none()
            && self.sound.is_none()
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(mode) = self.reply_mode {
            settings.reply_mode = mode;
        }
        if let Some(threshold) = self.threshold {
            settings.auto_reply_threshold = threshold;
        }
        if let Some(tone) = self.tone {
            settings.default_tone = tone;
        }
        if let Some(flag) = self.notifications {
            settings.notifications_enabled = flag;
        }
        if let Some(flag) = self.sound {
            settings.sound_enabled = flag;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_partial_change() {
        let mut settings = Settings::default();
        let before = settings.clone();
        let change = SettingsChange {
            threshold: Some(70),
            tone: Some(Tone::Friendly),
            ..Default::default()
        };
        assert!(!change.is_empty());
        change.apply(&mut settings);

        assert_eq!(settings.auto_reply_threshold, 70);
        assert_eq!(settings.default_tone, Tone::Friendly);
        assert_eq!(settings.reply_mode, before.reply_mode);
        assert_eq!(settings.sound_enabled, before.sound_enabled);
    }
}
