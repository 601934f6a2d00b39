//! Reply text selection for detected events.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AiReplies, EventType, GenerateReplyRequest, Tone};

/// Canned reply for an event in a given tone. Offline and infallible.
pub fn canned_reply(event: EventType, tone: Tone) -> &'static str {
    match (event, tone) {
        (EventType::Wedding, Tone::Polite) => {
            "와 정말 축하해! 너무 기쁜 소식이다 😊 당연히 갈게! 청첩장 보내줘~"
        }
        (EventType::Wedding, Tone::Friendly) => {
            "헐 대박!! 축하해 친구야!! 🎉💕 꼭 갈게 진짜!! 신랑/신부 누구야?!"
        }
        (EventType::Wedding, Tone::Formal) => "결혼 축하해. 그날 일정 확인해보고 연락할게.",
        (EventType::Birthday, Tone::Polite) => "생일 축하해! 좋은 하루 보내 🎂",
        (EventType::Birthday, Tone::Friendly) => "생일 축하해!! 🎉🎈 올해도 건강하고 행복하자!",
        (EventType::Birthday, Tone::Formal) => "생일 축하드립니다. 좋은 한 해 되세요.",
        (EventType::Funeral, Tone::Polite) => "정말 안타깝네. 삼가 고인의 명복을 빕니다.",
        (EventType::Funeral, Tone::Friendly) => {
            "많이 힘들겠다... 옆에 있어줄게. 필요한 거 있으면 말해."
        }
        (EventType::Funeral, Tone::Formal) => {
            "깊은 위로의 말씀을 전합니다. 삼가 고인의 명복을 빕니다."
        }
        (EventType::Reunion, Tone::Polite) => "오랜만이야! 잘 지냈어? 반가워 😊",
        (EventType::Reunion, Tone::Friendly) => "헐 진짜 오랜만!! 어떻게 지냈어?! 😄",
        (EventType::Reunion, Tone::Formal) => "오랜만이네요. 잘 지내셨나요?",
        (EventType::General, Tone::Polite) => "응 알겠어!",
        (EventType::General, Tone::Friendly) => "ㅇㅋㅇㅋ!!",
        (EventType::General, Tone::Formal) => "네, 알겠습니다.",
    }
}

/// Canned reply for a raw tone key; unknown keys fall back to polite.
pub fn canned_reply_for_key(event: EventType, tone_key: &str) -> &'static str {
    canned_reply(event, Tone::from_key(tone_key))
}

/// Source of AI-generated reply options.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(&self, request: &GenerateReplyRequest) -> Result<AiReplies>;
}

#[async_trait]
impl ReplyGenerator for crate::KatokClient {
    async fn generate_reply(&self, request: &GenerateReplyRequest) -> Result<AiReplies> {
        self.ai().generate_reply(request).await
    }
}

/// Where a set of suggestions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    Ai,
    Canned,
}

/// One reply the user can pick.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestedReply {
    /// Label shown to the user.
    pub label: String,
    /// Canonical tone, when the label maps to one.
    pub tone: Option<Tone>,
    pub text: String,
    pub explanation: Option<String>,
}

/// Reply options for one detected event.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestions {
    pub event: EventType,
    pub options: Vec<SuggestedReply>,
    /// Index into `options`; always in range.
    pub recommended: usize,
    pub insight: Option<String>,
    pub source: SuggestionSource,
}

impl Suggestions {
    /// The three canned tones, recommending `preferred`.
    pub fn canned(event: EventType, preferred: Tone) -> Self {
        let options = Tone::ALL
            .iter()
            .map(|&tone| SuggestedReply {
                label: tone.as_str().to_owned(),
                tone: Some(tone),
                text: canned_reply(event, tone).to_owned(),
                explanation: None,
            })
            .collect();
        let recommended = Tone::ALL.iter().position(|t| *t == preferred).unwrap_or(0);

        Self {
            event,
            options,
            recommended,
            insight: None,
            source: SuggestionSource::Canned,
        }
    }

    /// Build from an AI response. `None` when the response has no usable options.
    pub fn from_ai(event: EventType, replies: AiReplies) -> Option<Self> {
        let recommended_text = replies
            .replies
            .get(replies.recommended_index)
            .map(|r| r.message.clone());

        let mut options: Vec<SuggestedReply> = replies
            .replies
            .into_iter()
            .filter(|r| !r.message.trim().is_empty())
            .map(|r| SuggestedReply {
                tone: Tone::from_label(&r.tone),
                label: r.tone,
                text: r.message,
                explanation: Some(r.explanation).filter(|e| !e.is_empty()),
            })
            .collect();

        if options.is_empty() {
            return None;
        }

        // Present in polite, friendly, formal order when every label is known.
        if options.iter().all(|o| o.tone.is_some()) {
            options.sort_by_key(|o| o.tone.map(|t| t as u8));
        }

        let recommended = recommended_text
            .and_then(|text| options.iter().position(|o| o.text == text))
            .unwrap_or(0);

        Some(Self {
            event,
            options,
            recommended,
            insight: replies.ai_insight.filter(|s| !s.is_empty()),
            source: SuggestionSource::Ai,
        })
    }

    pub fn get(&self, index: usize) -> Option<&SuggestedReply> {
        self.options.get(index)
    }

    pub fn recommended(&self) -> Option<&SuggestedReply> {
        self.options.get(self.recommended)
    }
}

/// Produces reply text for detected events.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToneResolver {
    default_tone: Tone,
}

impl ToneResolver {
    pub fn new(default_tone: Tone) -> Self {
        Self { default_tone }
    }

    /// Auto mode: a canned reply in the configured tone.
    pub fn resolve_auto(&self, event: EventType) -> &'static str {
        canned_reply(event, self.default_tone)
    }

    /// Suggest mode: AI options, falling back to the canned table on any failure.
    pub async fn suggest<G>(&self, generator: &G, request: &GenerateReplyRequest) -> Suggestions
    where
        G: ReplyGenerator + ?Sized,
    {
        let event = request.event_type;
        match generator.generate_reply(request).await {
            Ok(replies) => match Suggestions::from_ai(event, replies) {
                Some(suggestions) => suggestions,
                None => {
                    log::warn!("AI returned no reply options for {}; using canned replies", event);
                    Suggestions::canned(event, self.default_tone)
                }
            },
            Err(e) => {
                log::warn!("AI reply generation failed: {}; using canned replies", e);
                Suggestions::canned(event, self.default_tone)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{ReplyOption, RoomId, UserId};
    use pretty_assertions::assert_eq;

    struct Fixed(Option<AiReplies>);

    #[async_trait]
    impl ReplyGenerator for Fixed {
        async fn generate_reply(&self, _: &GenerateReplyRequest) -> Result<AiReplies> {
            self.0.clone().ok_or_else(|| Error::api(500, "down"))
        }
    }

    fn request(event: EventType) -> GenerateReplyRequest {
        GenerateReplyRequest {
            chat_room_id: RoomId(1),
            friend_id: UserId(2),
            event_type: event,
        }
    }

    fn option(tone: &str, message: &str) -> ReplyOption {
        ReplyOption {
            tone: tone.into(),
            message: message.into(),
            explanation: String::new(),
        }
    }

    #[test]
    fn test_unknown_tone_key_is_polite() {
        assert_eq!(
            canned_reply_for_key(EventType::Wedding, "xyz"),
            canned_reply(EventType::Wedding, Tone::Polite)
        );
    }

    #[test]
    fn test_resolve_auto_uses_default_tone() {
        let resolver = ToneResolver::new(Tone::Formal);
        assert_eq!(resolver.resolve_auto(EventType::Birthday), "생일 축하드립니다. 좋은 한 해 되세요.");
    }

    #[tokio::test]
    async fn test_suggest_falls_back_on_error() {
        let resolver = ToneResolver::new(Tone::Friendly);
        let s = resolver.suggest(&Fixed(None), &request(EventType::Funeral)).await;
        assert_eq!(s.source, SuggestionSource::Canned);
        assert_eq!(s.options.len(), 3);
        assert_eq!(s.recommended().and_then(|o| o.tone), Some(Tone::Friendly));
    }

    #[tokio::test]
    async fn test_suggest_falls_back_on_empty_options() {
        let resolver = ToneResolver::default();
        let s = resolver
            .suggest(&Fixed(Some(AiReplies::default())), &request(EventType::Reunion))
            .await;
        assert_eq!(s.source, SuggestionSource::Canned);
    }

    #[tokio::test]
    async fn test_suggest_prefers_ai() {
        let replies = AiReplies {
            replies: vec![
                option("공식적", "C"),
                option("정중한", "A"),
                option("친근한", "B"),
            ],
            recommended_index: 2,
            ai_insight: Some("가까운 사이".into()),
            relationship_analysis: None,
        };
        let s = ToneResolver::default()
            .suggest(&Fixed(Some(replies)), &request(EventType::Wedding))
            .await;

        assert_eq!(s.source, SuggestionSource::Ai);
        let texts: Vec<&str> = s.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
        assert_eq!(s.recommended().map(|o| o.text.as_str()), Some("B"));
        assert_eq!(s.insight.as_deref(), Some("가까운 사이"));
    }

    #[test]
    fn test_free_form_labels_keep_server_order() {
        let replies = AiReplies {
            replies: vec![option("내 스타일", "X"), option("조금 더 격식있게", "Y")],
            recommended_index: 9,
            ..Default::default()
        };
        let s = Suggestions::from_ai(EventType::General, replies).unwrap();
        assert_eq!(s.options[0].text, "X");
        assert_eq!(s.recommended, 0);
    }
}
