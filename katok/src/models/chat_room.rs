//! Chat room models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::message::parse_timestamp;
use super::{RoomId, UserId};

/// Kind of chat room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    #[default]
    Direct,
    Group,
}

impl RoomType {
    pub fn request_param(&self) -> &'static str {
        match self {
            RoomType::Direct => "DIRECT",
            RoomType::Group => "GROUP",
        }
    }
}

/// Role of a room member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    Owner,
    Admin,
    #[default]
    Member,
}

/// A participant in a chat room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: MemberRole,
}

/// A chat room as listed for the session user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: RoomId,
    /// Display name; the counterpart's name for direct rooms.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: RoomType,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    /// Relationship closeness with the counterpart, 0-100.
    #[serde(default)]
    pub intimacy_score: Option<u8>,
    #[serde(default)]
    pub members: Vec<RoomMember>,
}

impl ChatRoom {
    /// The first member that is not `me`.
    pub fn counterpart(&self, me: UserId) -> Option<&RoomMember> {
        self.members.iter().find(|m| m.id != me)
    }

    /// Parsed time of the last message.
    pub fn last_message_at(&self) -> Option<NaiveDateTime> {
        self.last_message_at.as_deref().and_then(parse_timestamp)
    }
}

/// Body of a create-room request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub member_ids: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpart() {
        let room = ChatRoom {
            id: RoomId(1),
            members: vec![
                RoomMember {
                    id: UserId(1),
                    name: "me".into(),
                    ..Default::default()
                },
                RoomMember {
                    id: UserId(2),
                    name: "friend".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(room.counterpart(UserId(1)).map(|m| m.id), Some(UserId(2)));
        assert_eq!(room.counterpart(UserId(2)).map(|m| m.id), Some(UserId(1)));
    }

    #[test]
    fn test_room_deserialize() {
        let json = r#"{"id":4,"name":"지수","avatar":null,"type":"direct",
            "lastMessage":null,"lastMessageAt":"2025-01-02T03:04:05",
            "unreadCount":2,"intimacyScore":15,
            "members":[{"id":1,"name":"a","avatar":null,"role":"OWNER"}]}"#;
        let room: ChatRoom = serde_json::from_str(json).unwrap();
        assert_eq!(room.intimacy_score, Some(15));
        assert_eq!(room.members[0].role, MemberRole::Owner);
        assert!(room.last_message_at().is_some());
    }
}
