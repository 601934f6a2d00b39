//! Message handlers.

use anyhow::Result;
use colored::Colorize;
use katok::{KatokClient, Message, RoomId};
use rust_i18n::t;
use serde::Serialize;

use crate::output::{PlainPrint, TableRow};

/// One message in a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct MessageInfo {
    pub id: String,
    pub from: String,
    pub is_mine: bool,
    pub content: String,
    pub time: String,
    pub event: Option<String>,
    pub auto_reply: bool,
}

impl From<&Message> for MessageInfo {
    fn from(m: &Message) -> Self {
        Self {
            id: m.key.to_string(),
            from: m.sender_name.clone(),
            is_mine: m.is_mine(),
            content: m.content.clone(),
            time: m.timestamp(),
            event: m.event.filter(|e| e.detected).map(|e| e.kind.to_string()),
            auto_reply: m.is_auto_reply,
        }
    }
}

impl TableRow for MessageInfo {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "From", "Content", "Time", "Event"]
    }
    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.from.clone(),
            self.content.clone(),
            self.time.clone(),
            self.event.clone().unwrap_or_default(),
        ]
    }
}

impl PlainPrint for MessageInfo {
    fn plain_print(&self) {
        let from_display = if self.is_mine {
            t!("you_label").to_string().green().to_string()
        } else {
            self.from.bold().to_string()
        };
        let mut tags = String::new();
        if let Some(event) = &self.event {
            tags.push_str(&format!(" [{}]", event).magenta().to_string());
        }
        if self.auto_reply {
            tags.push_str(&format!(" [{}]", t!("auto_label")).yellow().to_string());
        }
        println!("{} {}{}", from_display, self.time.dimmed(), tags);
        for line in self.content.lines() {
            if !line.trim().is_empty() {
                println!("   {}", line);
            }
        }
    }
}

/// Fetch the full history of a room, oldest first.
pub async fn read_history(client: &KatokClient, room: RoomId) -> Result<Vec<MessageInfo>> {
    let me = super::me(client)?;
    let payloads = client.messages().all(room).await?;
    Ok(payloads
        .into_iter()
        .map(|p| Message::from_payload(p, me))
        .map(|m| MessageInfo::from(&m))
        .collect())
}

/// Fetch one page of history.
pub async fn read_page(client: &KatokClient, room: RoomId, page: u32, size: u32) -> Result<Vec<MessageInfo>> {
    let me = super::me(client)?;
    let payloads = client.messages().page(room).page(page).size(size).send().await?;
    Ok(payloads
        .into_iter()
        .map(|p| Message::from_payload(p, me))
        .map(|m| MessageInfo::from(&m))
        .collect())
}

/// Fetch messages created after `since`.
pub async fn read_since(client: &KatokClient, room: RoomId, since: &str) -> Result<Vec<MessageInfo>> {
    let me = super::me(client)?;
    let payloads = client.messages().since(room, since).await?;
    Ok(payloads
        .into_iter()
        .map(|p| Message::from_payload(p, me))
        .map(|m| MessageInfo::from(&m))
        .collect())
}

/// Send a message and return the server's copy.
pub async fn send_message(client: &KatokClient, room: RoomId, content: &str) -> Result<MessageInfo> {
    let me = super::me(client)?;
    let payload = client.messages().send(room).content(content).send().await?;
    Ok(MessageInfo::from(&Message::from_payload(payload, me)))
}
