//! Channel manager

use crate::base::{ChannelError, ChannelHandler, ChannelHandlerPtr, Result};
use crate::telegram::TelegramHandler;
use async_trait::async_trait;
use operator_desk_core::bus::{InboundMessage, OutboundMessage};
use operator_desk_core::config::ChannelsConfig;
use operator_desk_core::engine::Outbound;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Channel manager that owns every platform handler and routes outbound
/// messages by channel name
pub struct ChannelManager {
    /// Configuration
    config: ChannelsConfig,
    /// Channel handlers
    handlers: RwLock<HashMap<String, ChannelHandlerPtr>>,
    /// Inbound message sender
    inbound_tx: Option<mpsc::Sender<InboundMessage>>,
}

impl ChannelManager {
    /// Create a new channel manager
    pub fn new(config: ChannelsConfig) -> Self {
        Self {
            config,
            handlers: RwLock::new(HashMap::new()),
            inbound_tx: None,
        }
    }

    /// Set the inbound message sender
    pub fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>) {
        self.inbound_tx = Some(tx);
    }

    /// Initialize channels based on configuration
    pub async fn initialize(&self) -> Result<()> {
        let telegram = &self.config.telegram;
        if telegram.enabled {
            if !telegram.token.is_empty() {
                self.register(TelegramHandler::new(telegram)).await;
                tracing::info!("Telegram channel initialized");
            } else {
                tracing::warn!("Telegram channel enabled but token not configured");
            }
        }

        Ok(())
    }

    /// Add a handler, wiring it to the inbound queue
    pub async fn register<H>(&self, mut handler: H)
    where
        H: ChannelHandler + 'static,
    {
        if let Some(ref tx) = self.inbound_tx {
            handler.set_inbound_sender(tx.clone());
        }
        let name = handler.name().to_string();
        let mut handlers = self.handlers.write().await;
        handlers.insert(name, Arc::new(RwLock::new(handler)) as ChannelHandlerPtr);
    }

    /// Start all channel handlers
    pub async fn start_all(&self) -> Result<()> {
        let handlers = self.handlers.read().await;

        for (name, handler) in handlers.iter() {
            tracing::info!("Starting {} channel...", name);
            let mut handler = handler.write().await;
            if let Err(e) = handler.start().await {
                tracing::error!("Failed to start {} channel: {}", name, e);
            }
        }

        Ok(())
    }

    /// Stop all channel handlers
    pub async fn stop_all(&self) -> Result<()> {
        let mut handlers = self.handlers.write().await;

        for (name, handler) in handlers.iter_mut() {
            tracing::info!("Stopping {} channel...", name);
            let mut handler = handler.write().await;
            if let Err(e) = handler.stop().await {
                tracing::error!("Failed to stop {} channel: {}", name, e);
            }
        }

        handlers.clear();
        Ok(())
    }

    /// Send a message through a specific channel
    pub async fn send(&self, channel: &str, message: OutboundMessage) -> Result<()> {
        let handlers = self.handlers.read().await;
        let handler = handlers
            .get(channel)
            .ok_or_else(|| ChannelError::NotConfigured(format!("Channel {} not found", channel)))?;

        let handler = handler.read().await;
        handler.send(message).await
    }

    /// Check if a channel is running
    pub async fn is_channel_running(&self, name: &str) -> bool {
        let handlers = self.handlers.read().await;
        match handlers.get(name) {
            Some(handler) => handler.read().await.is_running(),
            None => false,
        }
    }

    /// Get list of registered channels
    pub async fn list_channels(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        handlers.keys().cloned().collect()
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new(ChannelsConfig::default())
    }
}

#[async_trait]
impl Outbound for ChannelManager {
    async fn deliver(&self, message: OutboundMessage) -> operator_desk_core::Result<()> {
        let channel = message.channel.clone();
        self.send(&channel, message)
            .await
            .map_err(|e| operator_desk_core::Error::Delivery(e.to_string()))
    }
}
