//! Reply assistance commands.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use katok::{EventType, RoomId, Tone};
use rust_i18n::t;

use super::settings::{parse_event, parse_tone};
use crate::config::{build_authed_client, cached_settings};
use crate::handlers::ai as handlers;
use crate::output::{print_one, print_table, OutputFormat};

#[derive(Subcommand)]
pub enum AiAction {
    /// Generate replies to an event in a room
    #[command(alias = "suggest")]
    Generate {
        /// Room ID
        room: RoomId,
        /// Event type (wedding, birthday, funeral, reunion, general)
        #[arg(value_parser = parse_event)]
        event: EventType,
        /// Tone for canned fallbacks (defaults to your setting)
        #[arg(short, long, value_parser = parse_tone)]
        tone: Option<Tone>,
    },

    /// Classify a piece of text
    Detect {
        /// Text to classify
        text: String,
    },

    /// Summarize the relationship in a direct room
    Analyze {
        /// Room ID
        room: RoomId,
    },
}

pub async fn handle(action: AiAction, format: OutputFormat, _verbose: bool) -> Result<()> {
    let client = build_authed_client()?;
    match action {
        AiAction::Generate { room, event, tone } => {
            let tone = match tone {
                Some(tone) => tone,
                None => cached_settings(&client).await?.get().default_tone,
            };
            let result = handlers::suggest(&client, room, event, tone).await?;
            if matches!(format, OutputFormat::Json) {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            let source = if result.from_ai { t!("source_ai") } else { t!("source_canned") };
            println!("{} ({})\n", t!("suggestions_for", event = result.event).bold(), source.dimmed());
            if let Some(insight) = &result.insight {
                println!("{}\n", insight.italic());
            }
            print_table(result.replies, format);
        }
        AiAction::Detect { text } => {
            print_one(&handlers::detect(&client, &text).await?, format);
        }
        AiAction::Analyze { room } => {
            print_one(&handlers::analyze(&client, room).await?, format);
        }
    }
    Ok(())
}
