//! Friend commands.

use anyhow::Result;
use clap::Subcommand;
use katok::UserId;
use rust_i18n::t;

use crate::config::build_authed_client;
use crate::handlers::friend as handlers;
use crate::output::{print_one, print_table, OutputFormat};

#[derive(Subcommand)]
pub enum FriendAction {
    /// List friends
    #[command(alias = "ls")]
    List,

    /// Friends ordered by intimacy
    Ranking,

    /// Relationship summary
    Stats,

    /// Search friends by name
    Search {
        /// Search query
        query: String,
    },

    /// Add a friend
    Add {
        /// User ID
        user: UserId,
    },

    /// Remove a friend
    Remove {
        /// User ID
        user: UserId,
    },
}

pub async fn handle(action: FriendAction, format: OutputFormat, _verbose: bool) -> Result<()> {
    let client = build_authed_client()?;
    match action {
        FriendAction::List => print_table(handlers::list_friends(&client).await?, format),
        FriendAction::Ranking => print_table(handlers::ranking(&client).await?, format),
        FriendAction::Stats => print_one(&handlers::stats(&client).await?, format),
        FriendAction::Search { query } => {
            print_table(handlers::search_friends(&client, &query).await?, format)
        }
        FriendAction::Add { user } => {
            client.friends().add(user).await?;
            println!("{}", t!("friend_added", id = user));
        }
        FriendAction::Remove { user } => {
            client.friends().remove(user).await?;
            println!("{}", t!("friend_removed", id = user));
        }
    }
    Ok(())
}
