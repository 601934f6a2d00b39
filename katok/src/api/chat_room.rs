//! Chat room API.

use reqwest::Method;
use std::sync::Arc;

use crate::{
    client::KatokClientInner,
    error::{Error, Result},
    models::{ChatRoom, CreateRoomRequest, RoomId, RoomType, UserId},
};

/// API for chat room operations.
pub struct ChatRoomApi {
    client: Arc<KatokClientInner>,
}

impl ChatRoomApi {
    pub(crate) fn new(client: Arc<KatokClientInner>) -> Self {
        Self { client }
    }

    /// List the rooms the current user belongs to.
    pub async fn list(&self) -> Result<Vec<ChatRoom>> {
        self.client.get("chat-rooms", &[]).await
    }

    /// Get a single room.
    pub async fn get(&self, room_id: RoomId) -> Result<ChatRoom> {
        self.client.get(&format!("chat-rooms/{}", room_id), &[]).await
    }

    /// Start building a new room.
    pub fn create(&self) -> CreateRoomBuilder {
        CreateRoomBuilder {
            client: self.client.clone(),
            name: None,
            avatar: None,
            kind: RoomType::Direct,
            members: Vec::new(),
        }
    }

    /// Leave a room.
    pub async fn leave(&self, room_id: RoomId) -> Result<()> {
        self.client
            .execute(Method::DELETE, &format!("chat-rooms/{}", room_id), &[])
            .await
    }

    /// Mark all messages in a room as read.
    pub async fn mark_read(&self, room_id: RoomId) -> Result<()> {
        self.client
            .execute(Method::POST, &format!("chat-rooms/{}/read", room_id), &[])
            .await
    }

    /// Search rooms by name.
    pub async fn search(&self, query: &str) -> Result<Vec<ChatRoom>> {
        self.client.get("chat-rooms/search", &[("query", query)]).await
    }

    /// Total unread messages across rooms.
    pub async fn unread_count(&self) -> Result<u32> {
        self.client.get("chat-rooms/unread-count", &[]).await
    }
}

/// Builder for room creation.
pub struct CreateRoomBuilder {
    client: Arc<KatokClientInner>,
    name: Option<String>,
    avatar: Option<String>,
    kind: RoomType,
    members: Vec<UserId>,
}

impl CreateRoomBuilder {
    /// Set the room name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the room avatar URL.
    pub fn avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Set the room type.
    pub fn kind(mut self, kind: RoomType) -> Self {
        self.kind = kind;
        self
    }

    /// Add a member.
    pub fn member(mut self, user_id: UserId) -> Self {
        self.members.push(user_id);
        self
    }

    /// Add several members.
    pub fn members(mut self, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        self.members.extend(user_ids);
        self
    }

    /// Execute the request.
    pub async fn send(self) -> Result<ChatRoom> {
        if self.members.is_empty() {
            return Err(Error::InvalidArgument(
                "At least one member is required".into(),
            ));
        }

        let body = CreateRoomRequest {
            name: self.name,
            avatar: self.avatar,
            kind: self.kind.request_param(),
            member_ids: self.members,
        };

        self.client
            .send(Method::POST, "chat-rooms", &[], Some(&body))
            .await
    }
}
