//! Client library for the Katok messenger.
//!
//! Covers the REST API, a shared STOMP push channel with polling fallback,
//! optimistic message reconciliation, and life-event reply assistance.

pub mod api;
pub mod cache;
pub mod chat;
pub mod client;
pub mod detect;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod settings;
pub mod tone;
pub mod transport;

// Re-export main types
pub use client::{HttpConfig, KatokClient, KatokClientBuilder, Session};
pub use error::{Error, Result};

// Re-export commonly used models
pub use models::{
    AiReplies, ChatRoom, EventType, Friend, Login, Message, MessageId, MessageKey,
    MessagePayload, RelationshipStats, ReplyMode, RoomId, Sender, Settings, Tone, User, UserId,
};

// Re-export session-level types
pub use chat::{ChatBackend, ChatSession, ReplyPrompt, SessionEvent, SessionState, TransportMode};
pub use settings::SettingsStore;
pub use tone::{Suggestions, ToneResolver};
pub use transport::{PushHub, PushSource};
