//! AI reply-assistance API.

use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    client::KatokClientInner,
    error::{Error, Result},
    models::{
        AiReplies, AutoReplyDecision, EventAnalysis, GenerateReplyRequest, RelationshipAnalysis,
        RoomId, UserId,
    },
};

/// API for AI reply generation and classification.
pub struct AiApi {
    client: Arc<KatokClientInner>,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    message: &'a str,
}

impl AiApi {
    pub(crate) fn new(client: Arc<KatokClientInner>) -> Self {
        Self { client }
    }

    /// Generate reply options for an event in a room.
    pub async fn generate_reply(&self, request: &GenerateReplyRequest) -> Result<AiReplies> {
        self.client
            .send(Method::POST, "ai/generate-reply", &[], Some(request))
            .await
    }

    /// Ask the server whether an automatic reply should be sent.
    pub async fn auto_reply(&self, request: &GenerateReplyRequest) -> Result<AutoReplyDecision> {
        self.client
            .send(Method::POST, "ai/auto-reply", &[], Some(request))
            .await
    }

    /// Classify a piece of text.
    pub async fn detect_event(&self, message: &str) -> Result<EventAnalysis> {
        if message.trim().is_empty() {
            return Err(Error::InvalidArgument("Message cannot be empty".into()));
        }
        self.client
            .send(Method::POST, "ai/detect-event", &[], Some(&DetectRequest { message }))
            .await
    }

    /// Summarize the relationship with a friend.
    pub async fn analyze_relationship(
        &self,
        room_id: RoomId,
        friend_id: UserId,
    ) -> Result<RelationshipAnalysis> {
        let room = room_id.to_string();
        let friend = friend_id.to_string();
        self.client
            .send::<_, ()>(
                Method::POST,
                "ai/analyze-relationship",
                &[("chatRoomId", &room), ("friendId", &friend)],
                None,
            )
            .await
    }
}
