//! User models.

use serde::{Deserialize, Serialize};

use super::UserId;
use crate::client::Session;

/// Presence status of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    Online,
    #[default]
    Offline,
    Away,
}

/// A user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Numeric user ID.
    pub id: UserId,
    /// Login handle.
    pub user_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Profile status line.
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub id: UserId,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
    pub token: String,
    #[serde(default)]
    pub is_new_user: bool,
}

impl Login {
    /// Session context for subsequent requests.
    pub fn session(&self) -> Session {
        Session::new(self.id, self.user_id.clone(), self.token.clone())
    }
}

/// Profile update body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}
