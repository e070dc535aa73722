//! Base trait for channel handlers

use async_trait::async_trait;
use operator_desk_core::bus::{InboundMessage, OutboundMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Trait for channel handlers
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Check if the channel is running
    fn is_running(&self) -> bool;

    /// Start the channel handler
    async fn start(&mut self) -> Result<()>;

    /// Stop the channel handler
    async fn stop(&mut self) -> Result<()>;

    /// Send a message
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Set the inbound message sender
    fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>);

    /// Check if a sender is allowed
    fn is_allowed(&self, sender_id: &str) -> bool;
}

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel error: {0}")]
    Error(String),

    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Channel not running: {0}")]
    NotRunning(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Send error: {0}")]
    SendError(String),

    #[error("Access denied for sender: {0}")]
    AccessDenied(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

impl From<ChannelError> for operator_desk_core::Error {
    fn from(err: ChannelError) -> Self {
        operator_desk_core::Error::Channel(err.to_string())
    }
}

/// State shared by every channel implementation
#[derive(Clone)]
pub struct BaseChannel {
    /// Channel name
    pub name: String,
    /// Allowed senders list (empty = allow all)
    pub allow_from: Vec<String>,
    /// Inbound message sender
    pub inbound_tx: Option<mpsc::Sender<InboundMessage>>,
}

impl BaseChannel {
    /// Create a new base channel
    pub fn new(name: impl Into<String>, allow_from: Vec<String>) -> Self {
        Self {
            name: name.into(),
            allow_from,
            inbound_tx: None,
        }
    }

    /// Set the inbound message sender
    pub fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>) {
        self.inbound_tx = Some(tx);
    }

    /// Check if a sender is allowed
    pub fn is_allowed(&self, sender_id: &str) -> bool {
        if self.allow_from.is_empty() {
            return true;
        }

        if self.allow_from.iter().any(|allowed| allowed == sender_id) {
            return true;
        }

        // Compound IDs (e.g., "12345|username")
        sender_id.contains('|')
            && sender_id
                .split('|')
                .any(|part| !part.is_empty() && self.allow_from.iter().any(|a| a == part))
    }

    /// Pass a message received from the platform on to the relay
    ///
    /// `access_key` is what the allow list is matched against; it may carry
    /// more than the user id (e.g. "12345|username").
    pub async fn forward(&self, access_key: &str, msg: InboundMessage) -> Result<()> {
        if !self.is_allowed(access_key) {
            tracing::warn!(
                "Access denied for sender {} on channel {}. Add them to allow_from to grant access.",
                access_key,
                self.name
            );
            return Err(ChannelError::AccessDenied(access_key.to_string()));
        }

        let tx = self
            .inbound_tx
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(format!("{} has no inbound sender", self.name)))?;

        tx.send(msg)
            .await
            .map_err(|e| ChannelError::SendError(e.to_string()))
    }
}

/// Shared channel handler type
pub type ChannelHandlerPtr = Arc<RwLock<dyn ChannelHandler>>;

#[cfg(test)]
mod tests {
    use super::*;
    use operator_desk_core::bus::InboundKind;
    use operator_desk_core::store::UserId;

    #[test]
    fn test_base_channel_is_allowed_empty_list() {
        let channel = BaseChannel::new("test", vec![]);

        assert!(channel.is_allowed("user1"));
        assert!(channel.is_allowed("12345"));
        assert!(channel.is_allowed("anyone"));
    }

    #[test]
    fn test_base_channel_is_allowed_with_list() {
        let channel = BaseChannel::new("test", vec!["user1".to_string(), "12345".to_string()]);

        assert!(channel.is_allowed("user1"));
        assert!(channel.is_allowed("12345"));
        assert!(!channel.is_allowed("user2"));
        assert!(!channel.is_allowed("99999"));
    }

    #[test]
    fn test_base_channel_is_allowed_compound_id() {
        let channel = BaseChannel::new("test", vec!["user1".to_string(), "12345".to_string()]);

        assert!(channel.is_allowed("12345|user1"));
        assert!(channel.is_allowed("99999|user1"));
        assert!(!channel.is_allowed("99999|unknown"));
    }

    #[tokio::test]
    async fn test_forward_delivers_allowed_messages() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut channel = BaseChannel::new("telegram", vec!["42".to_string()]);
        channel.set_inbound_sender(tx);

        let user = UserId::from(42i64);
        channel
            .forward("42|alice", InboundMessage::text("telegram", user.clone(), "hi"))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.sender_id, user);
        assert_eq!(received.kind, InboundKind::Text("hi".to_string()));
    }

    #[tokio::test]
    async fn test_forward_rejects_unknown_sender() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut channel = BaseChannel::new("telegram", vec!["42".to_string()]);
        channel.set_inbound_sender(tx);

        let err = channel
            .forward("7", InboundMessage::session_start("telegram", UserId::from(7i64)))
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::AccessDenied(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::NotConfigured("test".to_string());
        assert_eq!(err.to_string(), "Channel not configured: test");

        let err = ChannelError::AccessDenied("user1".to_string());
        assert_eq!(err.to_string(), "Access denied for sender: user1");
    }

    #[test]
    fn test_channel_error_converts_to_core_error() {
        let err: operator_desk_core::Error = ChannelError::ApiError("bot blocked".to_string()).into();
        assert!(matches!(err, operator_desk_core::Error::Channel(_)));
        assert!(err.to_string().contains("bot blocked"));
    }
}
