//! Minimal STOMP 1.2 frame codec.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::models::{RoomId, UserId};

/// Destination prefix of per-room topics.
pub const TOPIC_PREFIX: &str = "/topic/chat/";

/// Topic destination for a room.
pub fn room_topic(room: RoomId) -> String {
    format!("{}{}", TOPIC_PREFIX, room)
}

/// Parse the room out of a topic destination.
pub fn topic_room(destination: &str) -> Option<RoomId> {
    destination.strip_prefix(TOPIC_PREFIX)?.parse().ok()
}

/// STOMP frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "CONNECT" | "STOMP" => Command::Connect,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            _ => return None,
        })
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Add a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame authenticating as `user_id`.
    pub fn connect(host: &str, user_id: UserId, heartbeat_ms: u64) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", format!("{},{}", heartbeat_ms, heartbeat_ms))
            .header("userId", user_id.to_string())
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    /// Serialize to wire text, including the trailing NUL.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        // CONNECT headers are not escaped.
        let escape = self.command != Command::Connect;
        for (k, v) in &self.headers {
            if escape {
                let _ = writeln!(out, "{}:{}", escape_header(k), escape_header(v));
            } else {
                let _ = writeln!(out, "{}:{}", k, v);
            }
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            let _ = writeln!(out, "content-length:{}", self.body.len());
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(Error::stomp(format!("invalid header escape: \\{:?}", other)));
            }
        }
    }
    Ok(out)
}

/// Decode every frame in a WebSocket text message.
///
/// Heart-beats (bare EOLs) produce no frames.
pub fn decode(text: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            break;
        }
        let (frame, remaining) = decode_one(rest)?;
        frames.push(frame);
        rest = remaining;
    }

    Ok(frames)
}

/// Split at the first blank line, whichever line ending it uses.
fn split_head(text: &str) -> Option<(&str, &str)> {
    let lf = text.find("\n\n").map(|i| (i, 2));
    let crlf = text.find("\r\n\r\n").map(|i| (i, 4));
    let (at, len) = match (lf, crlf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b)?,
    };
    Some((&text[..at], &text[at + len..]))
}

fn decode_one(text: &str) -> Result<(Frame, &str)> {
    let (head, after_head) =
        split_head(text).ok_or_else(|| Error::stomp("frame has no header terminator"))?;

    let mut lines = head.lines();
    let command_line = lines.next().unwrap_or_default().trim_end_matches('\r');
    let command = Command::parse(command_line)
        .ok_or_else(|| Error::stomp(format!("unknown command {:?}", command_line)))?;
    let escape = !matches!(command, Command::Connect | Command::Connected);

    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let (k, v) = line
            .split_once(':')
            .ok_or_else(|| Error::stomp(format!("malformed header {:?}", line)))?;
        if escape {
            headers.push((unescape_header(k)?, unescape_header(v)?));
        } else {
            headers.push((k.to_owned(), v.to_owned()));
        }
    }

    let length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.trim().parse::<usize>().ok());

    let (body, remaining) = match length {
        Some(len) if after_head.len() >= len && after_head.is_char_boundary(len) => {
            let remaining = &after_head[len..];
            (&after_head[..len], remaining.strip_prefix('\0').unwrap_or(remaining))
        }
        _ => match after_head.split_once('\0') {
            Some((body, remaining)) => (body, remaining),
            None => (after_head, ""),
        },
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_owned(),
        },
        remaining,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_topic_round_trip_parse() {
        assert_eq!(room_topic(RoomId(12)), "/topic/chat/12");
        assert_eq!(topic_room("/topic/chat/12"), Some(RoomId(12)));
        assert_eq!(topic_room("/queue/other"), None);
    }

    #[test]
    fn test_encode_connect() {
        let text = Frame::connect("localhost", UserId(5), 10000).encode();
        assert!(text.starts_with("CONNECT\n"));
        assert!(text.contains("accept-version:1.2\n"));
        assert!(text.contains("userId:5\n"));
        assert!(text.contains("heart-beat:10000,10000\n"));
        assert!(text.ends_with("\n\n\0"));
    }

    #[test]
    fn test_decode_message_frame() {
        let body = r#"{"id":1,"content":"결혼해"}"#;
        let text = format!(
            "MESSAGE\ndestination:/topic/chat/3\nsubscription:sub-0\nmessage-id:a\\cb\ncontent-length:{}\n\n{}\0",
            body.len(),
            body
        );
        let frames = decode(&text).unwrap();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("destination"), Some("/topic/chat/3"));
        assert_eq!(frame.get("message-id"), Some("a:b"));
        assert_eq!(frame.body, body);
    }

    #[test]
    fn test_decode_heartbeat_and_batched_frames() {
        assert!(decode("\n").unwrap().is_empty());
        let text = "RECEIPT\nreceipt-id:1\n\n\0\nERROR\nmessage:boom\n\nbad things\0";
        let frames = decode(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].command, Command::Error);
        assert_eq!(frames[1].body, "bad things");
    }

    #[test]
    fn test_decode_crlf_headers_with_blank_line_in_body() {
        let text = "MESSAGE\r\ndestination:/topic/chat/3\r\nsubscription:sub-0\r\n\r\n첫 줄\n\n셋째 줄\0";
        let frames = decode(text).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].get("subscription"), Some("sub-0"));
        assert_eq!(frames[0].body, "첫 줄\n\n셋째 줄");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("HELLO\n\n\0").is_err());
        assert!(decode("MESSAGE\nno-terminator").is_err());
    }
}
