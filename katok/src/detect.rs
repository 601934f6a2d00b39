//! Life-event detection over a conversation.

use crate::models::{EventType, Message, Sender};

/// Keyword table, in priority order. Matching is a case-sensitive substring test.
pub const EVENT_KEYWORDS: &[(EventType, &[&str])] = &[
    (EventType::Wedding, &["결혼", "결혼해", "청첩장", "식 올려", "웨딩"]),
    (EventType::Birthday, &["생일", "생파", "생일 축하"]),
    (EventType::Funeral, &["부고", "돌아가", "장례"]),
    (EventType::Reunion, &["오랜만", "연락 안 했", "잘 지냈"]),
];

/// Outcome of running detection over a message list.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<'a> {
    /// Detected event type.
    pub kind: EventType,
    /// Index of the message that triggered detection.
    pub index: usize,
    /// The message itself.
    pub message: &'a Message,
    /// Whether the server annotated the event (as opposed to keyword fallback).
    pub from_server: bool,
}

/// Classify free text by keyword table.
pub fn classify(content: &str) -> Option<EventType> {
    EVENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| content.contains(k)))
        .map(|(kind, _)| *kind)
}

/// Examine the most recent counterpart message for a life event.
///
/// A server annotation wins; keyword matching is used only when the message
/// carries none.
pub fn detect<'a, I>(messages: I) -> Option<Detection<'a>>
where
    I: IntoIterator<Item = &'a Message>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    let (index, message) = messages
        .into_iter()
        .enumerate()
        .rev()
        .find(|(_, m)| m.sender == Sender::Other)?;

    if let Some(event) = message.event.filter(|e| e.detected) {
        return Some(Detection {
            kind: event.kind,
            index,
            message,
            from_server: true,
        });
    }

    classify(&message.content).map(|kind| Detection {
        kind,
        index,
        message,
        from_server: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectedEvent, MessageId, MessagePayload, RoomId, TempId, UserId};
    use pretty_assertions::assert_eq;

    const ME: UserId = UserId(1);

    fn other(id: i64, content: &str) -> Message {
        Message::from_payload(
            MessagePayload {
                id: MessageId(id),
                chat_room_id: RoomId(1),
                sender_id: UserId(2),
                content: content.into(),
                ..Default::default()
            },
            ME,
        )
    }

    fn mine(content: &str) -> Message {
        Message::optimistic(TempId::generate(), content, false)
    }

    #[test]
    fn test_keyword_fallback() {
        let msgs = vec![other(1, "다음 달에 결혼해!")];
        let d = detect(&msgs).unwrap();
        assert_eq!(d.kind, EventType::Wedding);
        assert!(!d.from_server);
        assert_eq!(d.index, 0);
    }

    #[test]
    fn test_no_event() {
        assert!(detect(&[other(1, "밥 먹자")]).is_none());
        assert!(detect(&Vec::new()).is_none());
    }

    #[test]
    fn test_only_latest_counterpart_message() {
        let msgs = vec![other(1, "생일이야"), other(2, "밥 먹자"), mine("결혼 축하해")];
        assert!(detect(&msgs).is_none());

        let msgs = vec![other(1, "밥 먹자"), other(2, "생일이야"), mine("축하해")];
        let d = detect(&msgs).unwrap();
        assert_eq!(d.kind, EventType::Birthday);
        assert_eq!(d.index, 1);
    }

    #[test]
    fn test_server_annotation_wins() {
        let mut msg = other(1, "결혼해");
        msg.event = Some(DetectedEvent::detected(EventType::Reunion));
        let msgs = [msg];
        let d = detect(&msgs).unwrap();
        assert_eq!(d.kind, EventType::Reunion);
        assert!(d.from_server);
    }

    #[test]
    fn test_table_order_breaks_ties() {
        assert_eq!(classify("생일날 결혼해"), Some(EventType::Wedding));
        assert_eq!(classify("오랜만이야, 장례식 소식 들었어"), Some(EventType::Funeral));
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(classify("WEDDING"), None);
    }
}
