//! Life-event classification models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A life event a message can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Wedding,
    Birthday,
    Funeral,
    Reunion,
    General,
}

impl EventType {
    /// All event types in detection priority order.
    pub const ALL: [EventType; 5] = [
        EventType::Wedding,
        EventType::Birthday,
        EventType::Funeral,
        EventType::Reunion,
        EventType::General,
    ];

    /// Wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Wedding => "wedding",
            EventType::Birthday => "birthday",
            EventType::Funeral => "funeral",
            EventType::Reunion => "reunion",
            EventType::General => "general",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event annotation attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedEvent {
    /// Kind of event.
    pub kind: EventType,
    /// Whether the event was positively detected.
    pub detected: bool,
}

impl DetectedEvent {
    /// A positive detection of `kind`.
    pub fn detected(kind: EventType) -> Self {
        Self {
            kind,
            detected: true,
        }
    }
}

/// Result of a server-side event classification request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAnalysis {
    pub event_detected: bool,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl EventAnalysis {
    /// The classified event, when detected and recognised.
    pub fn event(&self) -> Option<EventType> {
        if !self.event_detected {
            return None;
        }
        self.event_type.as_deref().and_then(EventType::parse)
    }
}
