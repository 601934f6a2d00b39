//! Katok messenger CLI.

mod commands;
mod config;
mod handlers;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{ai, chat, friend, message, room, settings};
use katok::RoomId;
use rust_i18n::t;

rust_i18n::i18n!("src/locales", fallback = "en");

/// Katok messenger CLI
#[derive(Parser)]
#[command(name = "katok")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "plain")]
    format: output::OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Language for output (en, ko)
    #[arg(short, long, global = true, default_value = "en")]
    lang: String,

    /// REST base URL
    #[arg(long, global = true, env = "KATOK_API_URL")]
    api_url: Option<String>,

    /// Push endpoint URL
    #[arg(long, global = true, env = "KATOK_WS_URL")]
    ws_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage authentication
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Chat room operations
    #[command(alias = "r")]
    Room {
        #[command(subcommand)]
        action: room::RoomAction,
    },

    /// Message operations
    #[command(alias = "m")]
    Message {
        #[command(subcommand)]
        action: message::MessageAction,
    },

    /// Friend operations
    #[command(alias = "f")]
    Friend {
        #[command(subcommand)]
        action: friend::FriendAction,
    },

    /// Reply settings
    #[command(alias = "s")]
    Settings {
        #[command(subcommand)]
        action: settings::SettingsAction,
    },

    /// Reply assistance
    Ai {
        #[command(subcommand)]
        action: ai::AiAction,
    },

    /// Open a live conversation
    #[command(alias = "c")]
    Chat {
        /// Room ID
        room: RoomId,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum AuthAction {
    /// Login with a user ID
    Login {
        /// Login ID
        login_id: String,
    },
    /// Logout
    Logout,
    /// Show current auth status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    rust_i18n::set_locale(&cli.lang);
    config::set_overrides(cli.api_url.clone(), cli.ws_url.clone());

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let command = cli
        .command
        .ok_or_else(|| anyhow::anyhow!("{}", t!("no_command")))?;

    let result = match command {
        Commands::Auth { action } => handle_auth(action).await,
        Commands::Room { action } => room::handle(action, cli.format, cli.verbose).await,
        Commands::Message { action } => message::handle(action, cli.format, cli.verbose).await,
        Commands::Friend { action } => friend::handle(action, cli.format, cli.verbose).await,
        Commands::Settings { action } => settings::handle(action, cli.format, cli.verbose).await,
        Commands::Ai { action } => ai::handle(action, cli.format, cli.verbose).await,
        Commands::Chat { room } => chat::run(room, cli.format, cli.verbose).await,
        Commands::Config => {
            let cfg = config::load_config()?;
            let client = config::build_client()?;
            println!(
                "{}",
                t!("config_file", path = config::config_path()?.display())
            );
            println!("{}", t!("api_url", url = &client.config().base_url));
            println!("{}", t!("push_url", url = &client.config().push_url));
            println!("{}", t!("authenticated", status = cfg.session.is_some()));
            if let Some(session) = &cfg.session {
                println!("{}", t!("user_id", uid = session.user_id));
            }
            Ok(())
        }
    };

    if let Err(e) = &result {
        if e.downcast_ref::<katok::Error>().is_some_and(katok::Error::is_auth_error) {
            eprintln!("{}", t!("session_expired").yellow());
        }
    }
    result
}

async fn handle_auth(action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Login { login_id } => {
            let client = config::build_client()?;
            let login = client
                .auth()
                .login(&login_id)
                .await
                .context(t!("login_failed").to_string())?;
            let session = login.session();

            let mut cfg = config::load_config()?;
            cfg.session = Some(session.clone());
            config::save_config(&cfg)?;

            // Seed the local settings cache from the server.
            let authed = client.with_session(session);
            let store = config::cached_settings(&authed).await?;
            if let Err(e) = store.sync(&authed).await {
                tracing::warn!("Failed to sync settings: {}", e);
            }

            println!("{}", t!("logged_in_as", name = login.name.green(), uid = login.id));
            if login.is_new_user {
                println!("{}", t!("welcome_new_user"));
            }
            Ok(())
        }
        AuthAction::Logout => {
            if let Ok(client) = config::build_authed_client() {
                if let Err(e) = client.auth().logout().await {
                    tracing::warn!("Server logout failed: {}", e);
                }
            }
            let mut cfg = config::load_config()?;
            cfg.session = None;
            config::save_config(&cfg)?;
            println!("{}", t!("logged_out"));
            Ok(())
        }
        AuthAction::Status => {
            let cfg = config::load_config()?;
            if let Some(session) = &cfg.session {
                println!(
                    "{}",
                    t!("logged_in_as", name = session.login_id.green(), uid = session.user_id)
                );
            } else {
                println!("{}", t!("not_logged_in"));
            }
            Ok(())
        }
    }
}
