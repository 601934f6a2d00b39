//! API modules.

mod ai;
mod auth;
mod chat_room;
mod friend;
mod message;
mod user;

pub use ai::AiApi;
pub use auth::AuthApi;
pub use chat_room::{ChatRoomApi, CreateRoomBuilder};
pub use friend::FriendApi;
pub use message::{MessageApi, MessagePageBuilder, SendMessageBuilder};
pub use user::UserApi;
