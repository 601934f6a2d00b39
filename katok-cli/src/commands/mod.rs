//! Subcommand definitions and their printers.

pub mod ai;
pub mod chat;
pub mod friend;
pub mod message;
pub mod room;
pub mod settings;
