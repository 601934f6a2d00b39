//! Message API.

use reqwest::Method;
use std::sync::Arc;

use crate::{
    client::KatokClientInner,
    error::{Error, Result},
    models::{
        EventAnalysis, MessageId, MessageKind, MessagePayload, RoomId, SendMessageRequest,
    },
};

/// Default page size for paged history.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// API for message operations within a room.
pub struct MessageApi {
    client: Arc<KatokClientInner>,
}

impl MessageApi {
    pub(crate) fn new(client: Arc<KatokClientInner>) -> Self {
        Self { client }
    }

    /// Fetch the full history of a room, oldest first.
    pub async fn all(&self, room_id: RoomId) -> Result<Vec<MessagePayload>> {
        self.client
            .get(&format!("chat-rooms/{}/messages/all", room_id), &[])
            .await
    }

    /// Fetch one page of history.
    pub fn page(&self, room_id: RoomId) -> MessagePageBuilder {
        MessagePageBuilder {
            client: self.client.clone(),
            room_id,
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Fetch messages created after `since` (server timestamp format).
    pub async fn since(&self, room_id: RoomId, since: &str) -> Result<Vec<MessagePayload>> {
        self.client
            .get(
                &format!("chat-rooms/{}/messages/since", room_id),
                &[("since", since)],
            )
            .await
    }

    /// Send a message to a room.
    pub fn send(&self, room_id: RoomId) -> SendMessageBuilder {
        SendMessageBuilder {
            client: self.client.clone(),
            room_id,
            content: String::new(),
            kind: MessageKind::Text,
            auto_reply: false,
        }
    }

    /// Delete a message.
    pub async fn delete(&self, room_id: RoomId, message_id: MessageId) -> Result<()> {
        self.client
            .execute(
                Method::DELETE,
                &format!("chat-rooms/{}/messages/{}", room_id, message_id),
                &[],
            )
            .await
    }

    /// Ask the server to classify a message in the context of a room.
    pub async fn analyze_event(&self, room_id: RoomId, message: &str) -> Result<EventAnalysis> {
        self.client
            .get(
                &format!("chat-rooms/{}/messages/analyze-event", room_id),
                &[("message", message)],
            )
            .await
    }
}

/// Builder for paged history requests.
pub struct MessagePageBuilder {
    client: Arc<KatokClientInner>,
    room_id: RoomId,
    page: u32,
    size: u32,
}

impl MessagePageBuilder {
    /// Set the zero-based page number.
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the page size.
    pub fn size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }

    /// Execute the request.
    pub async fn send(self) -> Result<Vec<MessagePayload>> {
        let page = self.page.to_string();
        let size = self.size.to_string();

        self.client
            .get(
                &format!("chat-rooms/{}/messages", self.room_id),
                &[("page", &page), ("size", &size)],
            )
            .await
    }
}

/// Builder for sending messages.
pub struct SendMessageBuilder {
    client: Arc<KatokClientInner>,
    room_id: RoomId,
    content: String,
    kind: MessageKind,
    auto_reply: bool,
}

impl SendMessageBuilder {
    /// Set the message content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the content type.
    pub fn kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Flag the message as sent through the auto-reply path.
    pub fn auto_reply(mut self, auto_reply: bool) -> Self {
        self.auto_reply = auto_reply;
        self
    }

    /// Execute the request, returning the persisted message.
    pub async fn send(self) -> Result<MessagePayload> {
        if self.content.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Message content cannot be empty".into(),
            ));
        }

        let body = SendMessageRequest {
            content: self.content,
            kind: self.kind.request_param(),
            is_auto_reply: self.auto_reply,
        };

        self.client
            .send(
                Method::POST,
                &format!("chat-rooms/{}/messages", self.room_id),
                &[],
                Some(&body),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{KatokClient, Session};

    #[tokio::test]
    async fn test_empty_content_rejected_before_network() {
        // Nothing listens on this port; a network attempt would surface as Error::Network.
        let client = KatokClient::builder()
            .base_url("http://127.0.0.1:9/api/")
            .session(Session::new(1i64, "me", "t"))
            .build()
            .unwrap();

        let err = client
            .messages()
            .send(RoomId(1))
            .content("   ")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_requires_session() {
        let client = KatokClient::builder().build().unwrap();
        let err = client.messages().all(RoomId(1)).await.unwrap_err();
        assert!(matches!(err, Error::AuthRequired));
    }
}
