//! Settings commands.

use anyhow::Result;
use clap::Subcommand;
use katok::models::MAX_THRESHOLD;
use katok::settings::SettingsBackend;
use katok::{EventType, ReplyMode, Tone};
use rust_i18n::t;

use crate::config::{build_authed_client, cached_settings};
use crate::handlers::settings::{SettingsChange, SettingsInfo};
use crate::output::{print_one, OutputFormat};

fn parse_mode(raw: &str) -> Result<ReplyMode, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(ReplyMode::Auto),
        "suggest" => Ok(ReplyMode::Suggest),
        other => Err(format!("unknown reply mode {:?} (auto, suggest)", other)),
    }
}

pub(crate) fn parse_tone(raw: &str) -> Result<Tone, String> {
    Tone::ALL
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| format!("unknown tone {:?} (polite, friendly, formal)", raw))
}

pub(crate) fn parse_event(raw: &str) -> Result<EventType, String> {
    EventType::parse(raw)
        .ok_or_else(|| format!("unknown event {:?} (wedding, birthday, funeral, reunion, general)", raw))
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show current settings
    Show,

    /// Change settings
    Set {
        /// Reply mode (auto, suggest)
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<ReplyMode>,
        /// Highest intimacy score that still gets automatic replies
        #[arg(short = 'T', long, value_parser = clap::value_parser!(u8).range(0..=MAX_THRESHOLD as i64))]
        threshold: Option<u8>,
        /// Default reply tone (polite, friendly, formal)
        #[arg(short, long, value_parser = parse_tone)]
        tone: Option<Tone>,
        /// Enable or disable notifications
        #[arg(long)]
        notifications: Option<bool>,
        /// Enable or disable sounds
        #[arg(long)]
        sound: Option<bool>,
    },

    /// Reload settings from the server
    Sync,
}

pub async fn handle(action: SettingsAction, format: OutputFormat, _verbose: bool) -> Result<()> {
    let client = build_authed_client()?;
    match action {
        SettingsAction::Show => {
            let settings = client.fetch_settings().await?;
            print_one(&SettingsInfo::from(&settings), format);
        }
        SettingsAction::Set {
            mode,
            threshold,
            tone,
            notifications,
            sound,
        } => {
            let change = SettingsChange {
                reply_mode: mode,
                threshold,
                tone,
                notifications,
                sound,
            };
            if change.is_empty() {
                println!("{}", t!("nothing_to_change"));
                return Ok(());
            }
            let store = cached_settings(&client).await?;
            store.sync(&client).await?;
            let wanted = store.update(|s| change.apply(s)).await;
            let saved = client.save_settings(&wanted).await?;
            println!("{}", t!("settings_saved"));
            print_one(&SettingsInfo::from(&saved), format);
        }
        SettingsAction::Sync => {
            let store = cached_settings(&client).await?;
            let settings = store.sync(&client).await?;
            print_one(&SettingsInfo::from(&settings), format);
        }
    }
    Ok(())
}
