//! Chat room handlers.

use anyhow::Result;
use colored::Colorize;
use katok::models::{ChatRoom, RoomType};
use katok::{KatokClient, RoomId, UserId};
use serde::Serialize;

use crate::output::{format_relative_time, truncate, PlainPrint, TableRow};

/// Chat room info.
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub kind: RoomType,
    pub members: usize,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub unread: u32,
    pub intimacy: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub member_names: Vec<String>,
}

impl From<&ChatRoom> for RoomInfo {
    fn from(r: &ChatRoom) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            kind: r.kind,
            members: r.members.len(),
            last_message: r.last_message.clone(),
            last_message_at: r.last_message_at.clone(),
            unread: r.unread_count,
            intimacy: r.intimacy_score,
            member_names: Vec::new(),
        }
    }
}

impl RoomInfo {
    fn last_active(&self) -> String {
        format_relative_time(self.last_message_at.as_deref().and_then(katok::models::parse_timestamp))
    }
}

impl TableRow for RoomInfo {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Last", "When", "Unread", "Intimacy"]
    }
    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            truncate(self.last_message.as_deref().unwrap_or(""), 30),
            self.last_active(),
            if self.unread > 0 {
                self.unread.to_string()
            } else {
                String::new()
            },
            self.intimacy.map(|s| s.to_string()).unwrap_or_default(),
        ]
    }
}

impl PlainPrint for RoomInfo {
    fn plain_print(&self) {
        let unread = if self.unread > 0 {
            format!(" ({})", self.unread).red().to_string()
        } else {
            String::new()
        };
        println!(
            "[{}] {}{} {}",
            self.id.to_string().cyan(),
            self.name.bold(),
            unread,
            self.last_active().dimmed()
        );
        if let Some(last) = &self.last_message {
            println!("   {}", truncate(last, 60));
        }
    }
}

/// Fetch the room list.
pub async fn list_rooms(client: &KatokClient) -> Result<Vec<RoomInfo>> {
    let rooms = client.rooms().list().await?;
    Ok(rooms.iter().map(RoomInfo::from).collect())
}

/// Fetch one room with its member list.
pub async fn get_room(client: &KatokClient, room: RoomId) -> Result<RoomInfo> {
    let room = client.rooms().get(room).await?;
    let mut info = RoomInfo::from(&room);
    info.member_names = room.members.iter().map(|m| m.name.clone()).collect();
    Ok(info)
}

/// Search rooms by name.
pub async fn search_rooms(client: &KatokClient, query: &str) -> Result<Vec<RoomInfo>> {
    let rooms = client.rooms().search(query).await?;
    Ok(rooms.iter().map(RoomInfo::from).collect())
}

/// Create a room with the given members.
pub async fn create_room(
    client: &KatokClient,
    members: Vec<UserId>,
    name: Option<String>,
    group: bool,
) -> Result<RoomInfo> {
    let mut request = client.rooms().create().members(members).kind(if group {
        RoomType::Group
    } else {
        RoomType::Direct
    });
    if let Some(name) = name {
        request = request.name(name);
    }
    let room = request.send().await?;
    Ok(RoomInfo::from(&room))
}
