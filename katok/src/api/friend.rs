//! Friend API.

use reqwest::Method;
use std::sync::Arc;

use crate::{
    client::KatokClientInner,
    error::Result,
    models::{Friend, RelationshipStats, UserId},
};

/// API for friends and relationship statistics.
pub struct FriendApi {
    client: Arc<KatokClientInner>,
}

impl FriendApi {
    pub(crate) fn new(client: Arc<KatokClientInner>) -> Self {
        Self { client }
    }

    /// List friends.
    pub async fn list(&self) -> Result<Vec<Friend>> {
        self.client.get("friends", &[]).await
    }

    /// Friends ordered by intimacy score.
    pub async fn ranking(&self) -> Result<Vec<Friend>> {
        self.client.get("friends/ranking", &[]).await
    }

    /// Relationship tier counts and ranking.
    pub async fn stats(&self) -> Result<RelationshipStats> {
        self.client.get("friends/stats", &[]).await
    }

    /// Search friends by name.
    pub async fn search(&self, query: &str) -> Result<Vec<Friend>> {
        self.client.get("friends/search", &[("query", query)]).await
    }

    /// Add a friend.
    pub async fn add(&self, friend_id: UserId) -> Result<()> {
        self.client
            .execute(Method::POST, &format!("friends/{}", friend_id), &[])
            .await
    }

    /// Remove a friend.
    pub async fn remove(&self, friend_id: UserId) -> Result<()> {
        self.client
            .execute(Method::DELETE, &format!("friends/{}", friend_id), &[])
            .await
    }
}
