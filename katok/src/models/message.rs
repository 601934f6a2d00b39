//! Chat message models.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{DetectedEvent, EventType, MessageId, RoomId, UserId};

/// Content type of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    System,
}

impl MessageKind {
    /// Uppercase form used by request bodies.
    pub fn request_param(&self) -> &'static str {
        match self {
            MessageKind::Text => "TEXT",
            MessageKind::Image => "IMAGE",
            MessageKind::File => "FILE",
            MessageKind::System => "SYSTEM",
        }
    }
}

/// A persisted message as delivered by the REST API and the push channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: MessageId,
    pub chat_room_id: RoomId,
    pub sender_id: UserId,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_avatar: Option<String>,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_detected: Option<bool>,
    #[serde(default)]
    pub ai_insight: Option<String>,
    #[serde(default)]
    pub is_auto_reply: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl MessagePayload {
    /// Server-side event annotation, if the server flagged one.
    pub fn event(&self) -> Option<DetectedEvent> {
        if self.event_detected != Some(true) {
            return None;
        }
        self.event_type
            .as_deref()
            .and_then(EventType::parse)
            .map(DetectedEvent::detected)
    }

    /// Parsed creation time.
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parse a server timestamp, with or without an offset.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Who authored a message, relative to the session user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The session user.
    Me,
    /// The conversation counterpart.
    Other,
}

impl Sender {
    /// Resolve by numeric id.
    pub fn resolve(sender_id: UserId, me: UserId) -> Self {
        if sender_id == me {
            Sender::Me
        } else {
            Sender::Other
        }
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Locally generated identifier for an unconfirmed message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TempId(String);

impl TempId {
    /// Generate a fresh, never reused temporary id.
    pub fn generate() -> Self {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        TempId(format!("temp-{}-{}", Local::now().timestamp_millis(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a message in either of its lifecycle phases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKey {
    /// Optimistic message awaiting server confirmation.
    Temporary(TempId),
    /// Server-confirmed message.
    Permanent(MessageId),
}

impl MessageKey {
    pub fn is_temporary(&self) -> bool {
        matches!(self, MessageKey::Temporary(_))
    }

    /// The permanent id, once known.
    pub fn permanent(&self) -> Option<MessageId> {
        match self {
            MessageKey::Permanent(id) => Some(*id),
            MessageKey::Temporary(_) => None,
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKey::Temporary(t) => write!(f, "{}", t),
            MessageKey::Permanent(id) => write!(f, "{}", id),
        }
    }
}

/// A message as displayed in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Temporary or permanent identity.
    pub key: MessageKey,
    /// Text payload.
    pub content: String,
    /// Author relative to the session user.
    pub sender: Sender,
    /// Author display name, empty for optimistic messages.
    pub sender_name: String,
    /// Creation time; local clock until reconciled.
    pub created_at: NaiveDateTime,
    /// Detected life event.
    pub event: Option<DetectedEvent>,
    /// Advisory note attached by the server.
    pub insight: Option<String>,
    /// Sent through the auto-reply path.
    pub is_auto_reply: bool,
}

impl Message {
    /// Build from a server payload, resolving the sender against `me`.
    pub fn from_payload(payload: MessagePayload, me: UserId) -> Self {
        let created_at = payload
            .created_at()
            .unwrap_or_else(|| Local::now().naive_local());
        let event = payload.event();
        Self {
            key: MessageKey::Permanent(payload.id),
            sender: Sender::resolve(payload.sender_id, me),
            sender_name: payload.sender_name,
            content: payload.content,
            created_at,
            event,
            insight: payload.ai_insight.filter(|s| !s.is_empty()),
            is_auto_reply: payload.is_auto_reply.unwrap_or(false),
        }
    }

    /// A locally authored message not yet confirmed by the server.
    pub fn optimistic(temp: TempId, content: impl Into<String>, is_auto_reply: bool) -> Self {
        Self {
            key: MessageKey::Temporary(temp),
            content: content.into(),
            sender: Sender::Me,
            sender_name: String::new(),
            created_at: Local::now().naive_local(),
            event: None,
            insight: None,
            is_auto_reply,
        }
    }

    /// Display timestamp (`HH:MM`).
    pub fn timestamp(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }

    pub fn is_mine(&self) -> bool {
        self.sender == Sender::Me
    }

    pub fn is_pending(&self) -> bool {
        self.key.is_temporary()
    }
}

/// Body of a send request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub is_auto_reply: bool,
}
