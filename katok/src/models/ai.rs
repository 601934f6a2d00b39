//! AI reply-assistance models.

use serde::{Deserialize, Serialize};

use super::{EventType, RoomId, UserId};

/// One AI-generated reply option.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyOption {
    /// Free-form tone label chosen by the generator.
    #[serde(default)]
    pub tone: String,
    pub message: String,
    #[serde(default)]
    pub explanation: String,
}

/// Relationship summary produced alongside reply options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipAnalysis {
    #[serde(default)]
    pub relationship_type: String,
    #[serde(default)]
    pub intimacy_level: String,
    #[serde(default)]
    pub communication_style: String,
    #[serde(default)]
    pub summary: String,
}

/// Response of the reply-generation endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReplies {
    #[serde(default)]
    pub replies: Vec<ReplyOption>,
    #[serde(default)]
    pub recommended_index: usize,
    #[serde(default)]
    pub ai_insight: Option<String>,
    #[serde(default)]
    pub relationship_analysis: Option<RelationshipAnalysis>,
}

/// Server decision for an automatic reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoReplyDecision {
    pub should_auto_reply: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: String,
}

/// Body for reply generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReplyRequest {
    pub chat_room_id: RoomId,
    pub friend_id: UserId,
    pub event_type: EventType,
}
