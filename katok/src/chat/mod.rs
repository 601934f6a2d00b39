//! Per-conversation orchestration.

mod backend;
mod session;

pub use backend::ChatBackend;
pub use session::{
    AutoReplyProposal, ChatConfig, ChatSession, ReplyPrompt, SessionEvent, SessionState,
    TransportMode,
};
