//! Session context.

use serde::{Deserialize, Serialize};

use crate::models::UserId;

/// Identity of the logged-in user.
///
/// Created at login and dropped at logout; passed explicitly to everything
/// that needs to know who "me" is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Numeric user ID, used for API calls and sender resolution.
    pub user_id: UserId,
    /// Login handle, used for display.
    pub login_id: String,
    /// Access token.
    pub token: String,
}

impl Session {
    /// Create a new session.
    pub fn new(user_id: impl Into<UserId>, login_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            login_id: login_id.into(),
            token: token.into(),
        }
    }

    /// Check if the session looks usable.
    pub fn is_valid(&self) -> bool {
        !self.user_id.is_empty() && !self.login_id.is_empty()
    }
}
