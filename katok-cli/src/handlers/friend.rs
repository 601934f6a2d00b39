//! Friend handlers.

use anyhow::Result;
use colored::Colorize;
use katok::models::{Badge, Friend, RelationshipStats, Trend};
use katok::{KatokClient, UserId};
use rust_i18n::t;
use serde::Serialize;

use crate::output::{format_time, PlainPrint, TableRow};

fn badge_label(badge: Badge) -> String {
    match badge {
        Badge::Bestie => t!("badge_bestie"),
        Badge::Close => t!("badge_close"),
        Badge::Acquaintance => t!("badge_acquaintance"),
        Badge::Distant => t!("badge_distant"),
    }
    .to_string()
}

fn trend_arrow(trend: Trend) -> &'static str {
    match trend {
        Trend::Up => "↑",
        Trend::Down => "↓",
        Trend::Stable => "→",
    }
}

/// Friend info.
#[derive(Debug, Clone, Serialize)]
pub struct FriendInfo {
    pub rank: usize,
    pub id: UserId,
    pub name: String,
    pub status_message: Option<String>,
    pub intimacy: u8,
    pub trend: Trend,
    pub badge: Badge,
    pub last_contact: String,
}

impl FriendInfo {
    fn new(rank: usize, f: &Friend) -> Self {
        Self {
            rank,
            id: f.id,
            name: f.name.clone(),
            status_message: f.status_message.clone().filter(|s| !s.is_empty()),
            intimacy: f.intimacy_score,
            trend: f.intimacy_trend,
            badge: f.badge,
            last_contact: format_time(f.last_contact_at.as_deref()),
        }
    }
}

impl TableRow for FriendInfo {
    fn headers() -> Vec<&'static str> {
        vec!["#", "ID", "Name", "Intimacy", "Badge", "Last Contact"]
    }
    fn row(&self) -> Vec<String> {
        vec![
            self.rank.to_string(),
            self.id.to_string(),
            self.name.clone(),
            format!("{} {}", self.intimacy, trend_arrow(self.trend)),
            badge_label(self.badge),
            self.last_contact.clone(),
        ]
    }
}

impl PlainPrint for FriendInfo {
    fn plain_print(&self) {
        println!(
            "{}. {} {} {} {}",
            self.rank,
            format!("[{}]", self.id).cyan(),
            self.name.bold(),
            format!("{}{}", self.intimacy, trend_arrow(self.trend)).yellow(),
            badge_label(self.badge).dimmed()
        );
        if let Some(status) = &self.status_message {
            println!("   {}", status.dimmed());
        }
    }
}

fn numbered(friends: &[Friend]) -> Vec<FriendInfo> {
    friends
        .iter()
        .enumerate()
        .map(|(i, f)| FriendInfo::new(i + 1, f))
        .collect()
}

/// Relationship summary across all friends.
#[derive(Debug, Clone, Serialize)]
pub struct StatsInfo {
    pub total: u32,
    pub bestie: u32,
    pub close: u32,
    pub acquaintance: u32,
    pub distant: u32,
}

impl From<&RelationshipStats> for StatsInfo {
    fn from(s: &RelationshipStats) -> Self {
        Self {
            total: s.total_friends,
            bestie: s.bestie_count,
            close: s.close_count,
            acquaintance: s.acquaintance_count,
            distant: s.distant_count,
        }
    }
}

impl PlainPrint for StatsInfo {
    fn plain_print(&self) {
        println!("{}", t!("friend_total", count = self.total).bold());
        for (badge, count) in [
            (Badge::Bestie, self.bestie),
            (Badge::Close, self.close),
            (Badge::Acquaintance, self.acquaintance),
            (Badge::Distant, self.distant),
        ] {
            println!("   {:<12} {}", badge_label(badge), count);
        }
    }
}

/// Fetch the friend list.
pub async fn list_friends(client: &KatokClient) -> Result<Vec<FriendInfo>> {
    Ok(numbered(&client.friends().list().await?))
}

/// Fetch friends ordered by intimacy.
pub async fn ranking(client: &KatokClient) -> Result<Vec<FriendInfo>> {
    Ok(numbered(&client.friends().ranking().await?))
}

/// Search friends by name.
pub async fn search_friends(client: &KatokClient, query: &str) -> Result<Vec<FriendInfo>> {
    Ok(numbered(&client.friends().search(query).await?))
}

/// Fetch the relationship summary.
pub async fn stats(client: &KatokClient) -> Result<StatsInfo> {
    Ok(StatsInfo::from(&client.friends().stats().await?))
}
