//! User API.

use reqwest::Method;
use std::sync::Arc;

use crate::{
    client::KatokClientInner,
    error::Result,
    models::{ProfileUpdate, Settings, SettingsUpdate, User, UserId},
};

/// API for profile and settings operations.
pub struct UserApi {
    client: Arc<KatokClientInner>,
}

impl UserApi {
    pub(crate) fn new(client: Arc<KatokClientInner>) -> Self {
        Self { client }
    }

    /// Get the current user.
    pub async fn me(&self) -> Result<User> {
        self.client.get("users/me", &[]).await
    }

    /// Update the current user's profile.
    pub async fn update_me(&self, update: &ProfileUpdate) -> Result<User> {
        self.client
            .send(Method::PUT, "users/me", &[], Some(update))
            .await
    }

    /// Get user by ID.
    pub async fn get(&self, user_id: UserId) -> Result<User> {
        self.client.get(&format!("users/{}", user_id), &[]).await
    }

    /// Search users by name or handle.
    pub async fn search(&self, query: &str) -> Result<Vec<User>> {
        self.client.get("users/search", &[("query", query)]).await
    }

    /// Get the current user's settings.
    pub async fn settings(&self) -> Result<Settings> {
        self.client.get("users/me/settings", &[]).await
    }

    /// Update the current user's settings.
    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<Settings> {
        self.client
            .send(Method::PUT, "users/me/settings", &[], Some(update))
            .await
    }
}
