//! Data models for Katok entities.

mod ai;
mod chat_room;
mod event;
mod friend;
mod ids;
pub(crate) mod message;
mod settings;
mod user;

pub use ai::{AiReplies, AutoReplyDecision, GenerateReplyRequest, RelationshipAnalysis, ReplyOption};
pub use chat_room::{ChatRoom, CreateRoomRequest, MemberRole, RoomMember, RoomType};
pub use event::{DetectedEvent, EventAnalysis, EventType};
pub use friend::{Badge, Friend, Initiator, RelationshipStats, ReplySpeed, Trend};
pub use ids::{MessageId, RoomId, UserId};
pub use message::{
    parse_timestamp, Message, MessageKey, MessageKind, MessagePayload, SendMessageRequest, Sender,
    TempId,
};
pub use settings::{ReplyMode, Settings, SettingsUpdate, Tone, MAX_THRESHOLD};
pub use user::{Login, ProfileUpdate, User, UserStatus};
