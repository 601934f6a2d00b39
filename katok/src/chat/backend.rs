//! Server operations a chat session depends on.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{MessagePayload, RoomId};
use crate::tone::ReplyGenerator;
use crate::transport::HistorySource;
use crate::KatokClient;

/// Everything a [`ChatSession`](super::ChatSession) needs from the server.
#[async_trait]
pub trait ChatBackend: HistorySource + ReplyGenerator {
    /// Persist a message, returning the server's copy.
    async fn send_message(&self, room: RoomId, content: &str, auto_reply: bool) -> Result<MessagePayload>;
}

#[async_trait]
impl ChatBackend for KatokClient {
    async fn send_message(&self, room: RoomId, content: &str, auto_reply: bool) -> Result<MessagePayload> {
        self.messages()
            .send(room)
            .content(content)
            .auto_reply(auto_reply)
            .send()
            .await
    }
}
