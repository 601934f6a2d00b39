//! Result shaping shared by the commands.

pub mod ai;
pub mod friend;
pub mod message;
pub mod room;
pub mod settings;

use anyhow::{Context, Result};
use katok::{KatokClient, UserId};

/// ID of the logged-in user.
pub fn me(client: &KatokClient) -> Result<UserId> {
    client
        .session()
        .map(|s| s.user_id)
        .context("Authentication required. Run 'katok auth login' first.")
}
