//! Message commands.

use anyhow::Result;
use clap::Subcommand;
use katok::{MessageId, RoomId};
use rust_i18n::t;

use crate::config::build_authed_client;
use crate::handlers::message::{self as handlers, MessageInfo};
use crate::output::{print_table, OutputFormat};

#[derive(Subcommand)]
pub enum MessageAction {
    /// View one page of messages in a room
    #[command(alias = "ls")]
    List {
        /// Room ID
        room: RoomId,
        /// Page number
        #[arg(short, long, default_value = "0")]
        page: u32,
        /// Page size
        #[arg(short, long, default_value = "50")]
        size: u32,
    },

    /// View the full history of a room
    All {
        /// Room ID
        room: RoomId,
    },

    /// View messages newer than a timestamp
    Since {
        /// Room ID
        room: RoomId,
        /// Server timestamp, e.g. 2025-03-01T10:00:00
        since: String,
    },

    /// Send a message
    Send {
        /// Room ID
        room: RoomId,
        /// Message content
        content: String,
    },

    /// Delete a message
    Delete {
        /// Room ID
        room: RoomId,
        /// Message ID
        message: MessageId,
    },
}

pub async fn handle(action: MessageAction, format: OutputFormat, _verbose: bool) -> Result<()> {
    let client = build_authed_client()?;
    match action {
        MessageAction::List { room, page, size } => {
            let messages = handlers::read_page(&client, room, page, size).await?;
            print_history(room, messages, format);
        }
        MessageAction::All { room } => {
            let messages = handlers::read_history(&client, room).await?;
            print_history(room, messages, format);
        }
        MessageAction::Since { room, since } => {
            let messages = handlers::read_since(&client, room, &since).await?;
            print_history(room, messages, format);
        }
        MessageAction::Send { room, content } => {
            let sent = handlers::send_message(&client, room, &content).await?;
            println!("{}", t!("message_sent", id = sent.id));
        }
        MessageAction::Delete { room, message } => {
            client.messages().delete(room, message).await?;
            println!("{}", t!("message_deleted", id = message));
        }
    }
    Ok(())
}

fn print_history(room: RoomId, messages: Vec<MessageInfo>, format: OutputFormat) {
    if matches!(format, OutputFormat::Plain) {
        println!("{}\n", t!("room_history", id = room, count = messages.len()));
    }
    print_table(messages, format);
}
