//! Conversation state
//!
//! The store keeps which users are engaged and what was said, in memory
//! only. State is lost on restart.

pub mod conversation;
pub mod message;

pub use conversation::ConversationStore;
pub use message::{Message, Sender, UserId};
