//! Chat room commands.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use katok::{RoomId, UserId};
use rust_i18n::t;

use crate::config::build_authed_client;
use crate::handlers::room as handlers;
use crate::output::{print_table, OutputFormat, PlainPrint};

#[derive(Subcommand)]
pub enum RoomAction {
    /// List chat rooms
    #[command(alias = "ls")]
    List,

    /// Show one room
    Show {
        /// Room ID
        room: RoomId,
    },

    /// Search rooms by name
    Search {
        /// Search query
        query: String,
    },

    /// Create a room
    Create {
        /// Member user IDs
        #[arg(required = true)]
        members: Vec<UserId>,
        /// Room name
        #[arg(short, long)]
        name: Option<String>,
        /// Create a group room
        #[arg(short, long)]
        group: bool,
    },

    /// Leave a room
    Leave {
        /// Room ID
        room: RoomId,
    },

    /// Mark a room as read
    Read {
        /// Room ID
        room: RoomId,
    },

    /// Show total unread messages
    Unread,
}

pub async fn handle(action: RoomAction, format: OutputFormat, _verbose: bool) -> Result<()> {
    let client = build_authed_client()?;
    match action {
        RoomAction::List => {
            let rooms = handlers::list_rooms(&client).await?;
            if matches!(format, OutputFormat::Plain) {
                println!("{}\n", t!("rooms", count = rooms.len()));
            }
            print_table(rooms, format);
        }
        RoomAction::Show { room } => {
            let room = handlers::get_room(&client, room).await?;
            if matches!(format, OutputFormat::Json) {
                println!("{}", serde_json::to_string_pretty(&room)?);
            } else {
                room.plain_print();
                for member in &room.member_names {
                    println!("   - {}", member);
                }
            }
        }
        RoomAction::Search { query } => {
            print_table(handlers::search_rooms(&client, &query).await?, format);
        }
        RoomAction::Create { members, name, group } => {
            let room = handlers::create_room(&client, members, name, group).await?;
            if matches!(format, OutputFormat::Json) {
                println!("{}", serde_json::to_string_pretty(&room)?);
            } else {
                println!("{}", t!("room_created", id = room.id).green());
                room.plain_print();
            }
        }
        RoomAction::Leave { room } => {
            client.rooms().leave(room).await?;
            println!("{}", t!("room_left", id = room));
        }
        RoomAction::Read { room } => {
            client.rooms().mark_read(room).await?;
            println!("{}", t!("room_marked_read", id = room));
        }
        RoomAction::Unread => {
            let count = client.rooms().unread_count().await?;
            println!("{}", t!("unread_total", count = count));
        }
    }
    Ok(())
}
