//! Friend and relationship models.

use serde::{Deserialize, Serialize};

use super::UserId;

/// Direction of intimacy change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Stable,
}

/// Relationship tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Bestie,
    Close,
    #[default]
    Acquaintance,
    Distant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySpeed {
    Fast,
    #[default]
    Normal,
    Slow,
}

/// Who usually starts conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Initiator {
    Me,
    Them,
    #[default]
    Equal,
}

/// A friend with relationship statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub intimacy_score: u8,
    #[serde(default)]
    pub intimacy_trend: Trend,
    #[serde(default)]
    pub badge: Badge,
    #[serde(default)]
    pub reply_speed: ReplySpeed,
    #[serde(default)]
    pub initiator: Initiator,
    #[serde(default)]
    pub last_contact_at: Option<String>,
}

/// Aggregate relationship statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipStats {
    pub bestie_count: u32,
    pub close_count: u32,
    pub acquaintance_count: u32,
    pub distant_count: u32,
    pub total_friends: u32,
    #[serde(default)]
    pub ranking: Vec<Friend>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friend_deserialize() {
        let json = r#"{"id":3,"name":"지수","intimacyScore":88,"intimacyTrend":"up",
            "badge":"bestie","replySpeed":"fast","initiator":"them","lastContactAt":null}"#;
        let friend: Friend = serde_json::from_str(json).unwrap();
        assert_eq!(friend.badge, Badge::Bestie);
        assert_eq!(friend.intimacy_trend, Trend::Up);
        assert_eq!(friend.initiator, Initiator::Them);
    }
}
