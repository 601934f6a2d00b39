//! Reply assistance handlers.

use anyhow::{Context, Result};
use colored::Colorize;
use katok::models::{EventAnalysis, GenerateReplyRequest, RelationshipAnalysis};
use katok::tone::{SuggestionSource, Suggestions};
use katok::{EventType, KatokClient, RoomId, Tone, ToneResolver};
use rust_i18n::t;
use serde::Serialize;

use crate::output::{PlainPrint, TableRow};

/// One reply option.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyInfo {
    pub index: usize,
    pub tone: String,
    pub text: String,
    pub recommended: bool,
    pub explanation: Option<String>,
}

impl ReplyInfo {
    pub fn from_suggestions(suggestions: &Suggestions) -> Vec<Self> {
        suggestions
            .options
            .iter()
            .enumerate()
            .map(|(i, o)| Self {
                index: i + 1,
                tone: o.label.clone(),
                text: o.text.clone(),
                recommended: i == suggestions.recommended,
                explanation: o.explanation.clone(),
            })
            .collect()
    }
}

impl TableRow for ReplyInfo {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Tone", "Reply", ""]
    }
    fn row(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            self.tone.clone(),
            self.text.clone(),
            if self.recommended { "★".to_string() } else { String::new() },
        ]
    }
}

impl PlainPrint for ReplyInfo {
    fn plain_print(&self) {
        let star = if self.recommended { " ★".yellow().to_string() } else { String::new() };
        println!("{}. {}{}", self.index, self.tone.cyan(), star);
        println!("   {}", self.text);
        if let Some(why) = &self.explanation {
            println!("   {}", why.dimmed());
        }
    }
}

/// Reply options for an event, with where they came from.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestResult {
    pub event: EventType,
    pub from_ai: bool,
    pub insight: Option<String>,
    pub replies: Vec<ReplyInfo>,
}

impl From<&Suggestions> for SuggestResult {
    fn from(s: &Suggestions) -> Self {
        Self {
            event: s.event,
            from_ai: s.source == SuggestionSource::Ai,
            insight: s.insight.clone(),
            replies: ReplyInfo::from_suggestions(s),
        }
    }
}

/// Reply options for `event` in `room`, falling back to canned replies.
pub async fn suggest(client: &KatokClient, room: RoomId, event: EventType, tone: Tone) -> Result<SuggestResult> {
    let me = super::me(client)?;
    let room = client.rooms().get(room).await?;
    let friend = room
        .counterpart(me)
        .context(t!("no_counterpart").to_string())?;
    let request = GenerateReplyRequest {
        chat_room_id: room.id,
        friend_id: friend.id,
        event_type: event,
    };
    let suggestions = ToneResolver::new(tone).suggest(client, &request).await;
    Ok(SuggestResult::from(&suggestions))
}

/// Classification of a piece of text.
#[derive(Debug, Clone, Serialize)]
pub struct DetectResult {
    pub text: String,
    pub local: Option<EventType>,
    pub server: Option<EventType>,
    pub confidence: f64,
    pub reasoning: Option<String>,
}

impl PlainPrint for DetectResult {
    fn plain_print(&self) {
        let label = |e: Option<EventType>| e.map(|e| e.to_string()).unwrap_or_else(|| "-".into());
        println!("{:<10} {}", t!("local_label"), label(self.local).cyan());
        println!(
            "{:<10} {} ({:.0}%)",
            t!("server_label"),
            label(self.server).cyan(),
            self.confidence * 100.0
        );
        if let Some(reason) = &self.reasoning {
            println!("   {}", reason.dimmed());
        }
    }
}

/// Classify `text` with both the local keyword table and the server.
pub async fn detect(client: &KatokClient, text: &str) -> Result<DetectResult> {
    let local = katok::detect::classify(text);
    let analysis: EventAnalysis = client.ai().detect_event(text).await?;
    Ok(DetectResult {
        text: text.to_string(),
        local,
        server: analysis.event(),
        confidence: analysis.confidence,
        reasoning: analysis.reasoning,
    })
}

/// Relationship summary for a direct room.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipInfo {
    pub room: RoomId,
    pub friend: String,
    #[serde(flatten)]
    pub analysis: RelationshipAnalysis,
}

impl PlainPrint for RelationshipInfo {
    fn plain_print(&self) {
        println!("{}", self.friend.bold());
        println!("   {}", self.analysis.relationship_type.cyan());
        println!("   {}", self.analysis.intimacy_level);
        println!("   {}", self.analysis.communication_style);
        if !self.analysis.summary.is_empty() {
            println!("   {}", self.analysis.summary.dimmed());
        }
    }
}

/// Ask the server to summarize the relationship in `room`.
pub async fn analyze(client: &KatokClient, room: RoomId) -> Result<RelationshipInfo> {
    let me = super::me(client)?;
    let room = client.rooms().get(room).await?;
    let friend = room
        .counterpart(me)
        .context(t!("no_counterpart").to_string())?;
    let analysis = client.ai().analyze_relationship(room.id, friend.id).await?;
    Ok(RelationshipInfo {
        room: room.id,
        friend: friend.name.clone(),
        analysis,
    })
}
