//! Interactive conversation.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use katok::models::MessageKey;
use katok::tone::Suggestions;
use katok::{ChatSession, EventType, Message, RoomId, SessionEvent, TransportMode};
use rust_i18n::t;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::config::{build_authed_client, settings_store};
use crate::handlers::ai::ReplyInfo;
use crate::handlers::message::MessageInfo;
use crate::output::{print_plain, OutputFormat, PlainPrint};

/// A line typed at the prompt.
#[derive(Debug, PartialEq)]
enum Input {
    Send(String),
    Suggest(Option<EventType>),
    Pick(usize),
    Accept,
    Edit,
    Cancel,
    History,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(Input::Send(line.to_string()));
        };
        let mut parts = command.split_whitespace();
        let input = match (parts.next().unwrap_or(""), parts.next()) {
            ("suggest" | "s", event) => Input::Suggest(event.and_then(EventType::parse)),
            ("pick" | "p", Some(n)) => match n.parse::<usize>() {
                Ok(n) if n >= 1 => Input::Pick(n - 1),
                _ => Input::Unknown(line.to_string()),
            },
            ("accept" | "a", None) => Input::Accept,
            ("edit" | "e", None) => Input::Edit,
            ("cancel" | "c", None) => Input::Cancel,
            ("history" | "h", None) => Input::History,
            ("help" | "?", None) => Input::Help,
            ("quit" | "exit" | "q", None) => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        };
        Some(input)
    }
}

fn print_help() {
    println!("{}", t!("chat_help").dimmed());
}

fn print_suggestions(suggestions: &Suggestions) {
    println!("{}", t!("suggestions_for", event = suggestions.event).bold());
    if let Some(insight) = &suggestions.insight {
        println!("   {}", insight.italic());
    }
    print_plain(&ReplyInfo::from_suggestions(suggestions));
    println!("{}", t!("pick_hint").dimmed());
}

/// Prints confirmed messages once each.
struct Transcript {
    shown: HashSet<MessageKey>,
}

impl Transcript {
    fn new() -> Self {
        Self { shown: HashSet::new() }
    }

    fn catch_up(&mut self, messages: &[Message]) {
        for message in messages.iter().filter(|m| !m.is_pending()) {
            if self.shown.insert(message.key.clone()) {
                MessageInfo::from(message).plain_print();
            }
        }
    }
}

pub async fn run(room: RoomId, _format: OutputFormat, _verbose: bool) -> Result<()> {
    let client = build_authed_client()?;
    let session = client
        .session()
        .cloned()
        .context("Authentication required. Run 'katok auth login' first.")?;
    let settings = settings_store(&client).await?;
    let chat_room = client.rooms().get(room).await?;
    let hub = client.push_hub()?;

    println!("{}", t!("chat_opened", name = chat_room.name.bold()));
    print_help();

    let chat = ChatSession::new(chat_room, &session, Arc::new(client.clone()), settings);
    let mut events = chat.subscribe();
    chat.open(Some(&hub))
        .await
        .context(t!("chat_load_failed").to_string())?;
    if let Err(e) = client.rooms().mark_read(room).await {
        tracing::debug!("mark_read failed: {}", e);
    }

    let mut transcript = Transcript::new();
    transcript.catch_up(&chat.messages());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(input) = Input::parse(&line) else { continue };
                if !handle_input(&chat, input).await {
                    break;
                }
                transcript.catch_up(&chat.messages());
            }
            event = events.recv() => match event {
                Ok(event) => on_event(&chat, &mut transcript, event),
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!("skipped {} session events", n);
                    transcript.catch_up(&chat.messages());
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    chat.close();
    hub.shutdown().await;
    println!("{}", t!("chat_closed"));
    Ok(())
}

/// Returns `false` when the user asked to leave.
async fn handle_input(chat: &ChatSession, input: Input) -> bool {
    match input {
        Input::Send(text) => {
            if let Err(e) = chat.send(text).await {
                eprintln!("{}", t!("send_failed", error = e).red());
                if e.is_retryable() {
                    eprintln!("{}", t!("retry_hint").dimmed());
                }
            }
        }
        Input::Suggest(event) => {
            let suggestions = chat.generate_reply(event).await;
            print_suggestions(&suggestions);
        }
        Input::Pick(index) => {
            if let Err(e) = chat.pick_suggestion(index).await {
                eprintln!("{}", t!("send_failed", error = e).red());
            }
        }
        Input::Accept => match chat.accept_auto_reply().await {
            Ok(Some(_)) => {}
            Ok(None) => println!("{}", t!("no_auto_reply")),
            Err(e) => eprintln!("{}", t!("send_failed", error = e).red()),
        },
        Input::Edit => match chat.prepare_auto_reply() {
            Some(text) => println!("{}\n{}", t!("edit_hint").dimmed(), text),
            None => println!("{}", t!("no_auto_reply")),
        },
        Input::Cancel => {
            if !chat.cancel_auto_reply() {
                chat.dismiss_prompt();
            }
        }
        Input::History => {
            let messages: Vec<MessageInfo> = chat.messages().iter().map(MessageInfo::from).collect();
            print_plain(&messages);
        }
        Input::Help => print_help(),
        Input::Quit => return false,
        Input::Unknown(line) => println!("{}", t!("unknown_command", input = line)),
    }
    true
}

fn on_event(chat: &ChatSession, transcript: &mut Transcript, event: SessionEvent) {
    match event {
        SessionEvent::MessagesChanged => transcript.catch_up(&chat.messages()),
        SessionEvent::EventDetected { event, .. } => {
            println!("{}", t!("event_detected", event = event).magenta());
        }
        SessionEvent::AutoReplyProposed(p) => {
            println!("{}", t!("auto_reply_proposed", text = p.text).yellow());
        }
        SessionEvent::SuggestionsReady(s) => print_suggestions(&s),
        SessionEvent::SendFailed { content, error } => {
            eprintln!("{}", t!("send_rolled_back", content = content, error = error).red());
        }
        SessionEvent::TransportChanged(mode) => {
            let label = match mode {
                TransportMode::Push => t!("transport_push"),
                TransportMode::Polling => t!("transport_polling"),
                TransportMode::None => t!("transport_none"),
            };
            println!("{}", label.dimmed());
        }
        SessionEvent::StateChanged(state) => tracing::debug!("session state: {:?}", state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_input() {
        assert_eq!(Input::parse("  "), None);
        assert_eq!(Input::parse("안녕"), Some(Input::Send("안녕".into())));
        assert_eq!(Input::parse("/suggest"), Some(Input::Suggest(None)));
        assert_eq!(
            Input::parse("/suggest wedding"),
            Some(Input::Suggest(Some(EventType::Wedding)))
        );
        assert_eq!(Input::parse("/pick 2"), Some(Input::Pick(1)));
        assert_eq!(Input::parse("/pick 0"), Some(Input::Unknown("/pick 0".into())));
        assert_eq!(Input::parse("/q"), Some(Input::Quit));
        assert_eq!(Input::parse("/nope"), Some(Input::Unknown("/nope".into())));
    }
}
