//! Event types for the relay bus

use crate::store::{Message, UserId};
use serde::{Deserialize, Serialize};

/// What a platform delivered for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum InboundKind {
    /// The user opened the conversation (e.g. Telegram `/start`)
    SessionStart,
    /// A text message
    Text(String),
}

/// Message received from a chat channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel identifier (e.g., "telegram")
    pub channel: String,
    /// User identifier
    pub sender_id: UserId,
    /// Payload
    pub kind: InboundKind,
}

impl InboundMessage {
    /// Create an inbound text message
    pub fn text(channel: impl Into<String>, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            sender_id,
            kind: InboundKind::Text(content.into()),
        }
    }

    /// Create a session-start signal
    pub fn session_start(channel: impl Into<String>, sender_id: UserId) -> Self {
        Self {
            channel: channel.into(),
            sender_id,
            kind: InboundKind::SessionStart,
        }
    }
}

/// Message to send to a chat channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Channel identifier
    pub channel: String,
    /// Target chat identifier
    pub chat_id: String,
    /// Message text content
    pub content: String,
}

impl OutboundMessage {
    /// Create a new outbound message
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
        }
    }
}

/// State change published to live observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RelayEvent {
    NewUser(UserId),
    #[serde(rename_all = "camelCase")]
    NewMessage {
        user_id: UserId,
        message: Message,
    },
    ChatEnded(UserId),
    ChatCleared(UserId),
    #[serde(rename_all = "camelCase")]
    UserRenamed {
        old_user_id: UserId,
        new_user_id: UserId,
    },
}

impl RelayEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::NewUser(_) => "newUser",
            RelayEvent::NewMessage { .. } => "newMessage",
            RelayEvent::ChatEnded(_) => "chatEnded",
            RelayEvent::ChatCleared(_) => "chatCleared",
            RelayEvent::UserRenamed { .. } => "userRenamed",
        }
    }

    /// JSON payload without the event name
    pub fn payload(&self) -> serde_json::Value {
        match self {
            RelayEvent::NewUser(id) | RelayEvent::ChatEnded(id) | RelayEvent::ChatCleared(id) => {
                serde_json::json!(id)
            }
            RelayEvent::NewMessage { user_id, message } => serde_json::json!({
                "userId": user_id,
                "message": message,
            }),
            RelayEvent::UserRenamed {
                old_user_id,
                new_user_id,
            } => serde_json::json!({
                "oldUserId": old_user_id,
                "newUserId": new_user_id,
            }),
        }
    }
}
