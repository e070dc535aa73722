//! Chat platform integrations for operator-desk
//!
//! Handlers feed end-user messages into the relay's inbound queue and
//! deliver operator replies back to the platform.

pub mod base;
pub mod manager;
pub mod telegram;

pub use base::{BaseChannel, ChannelError, ChannelHandler, ChannelHandlerPtr, Result};
pub use manager::ChannelManager;
pub use telegram::TelegramHandler;
