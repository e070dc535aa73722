//! Telegram channel integration

use crate::base::{BaseChannel, ChannelError, ChannelHandler, Result};
use async_trait::async_trait;
use operator_desk_core::bus::{InboundMessage, OutboundMessage};
use operator_desk_core::config::TelegramConfig;
use operator_desk_core::store::UserId;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const CHANNEL_NAME: &str = "telegram";

const HELP_TEXT: &str = "Send a message and an operator will get back to you here.\n\n/start - Begin a conversation\n/help - Show this help message";

/// Telegram bot commands
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
enum Command {
    #[command(description = "Begin a conversation")]
    Start,
    #[command(description = "Show this help message")]
    Help,
}

/// Telegram channel handler (long polling)
pub struct TelegramHandler {
    base: BaseChannel,
    /// Bot token
    token: String,
    /// Bot instance
    bot: Option<Bot>,
    /// Running state
    running: bool,
    /// Dispatcher handle
    dispatcher_handle: Option<JoinHandle<()>>,
}

impl TelegramHandler {
    /// Create a new Telegram handler from config
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            base: BaseChannel::new(CHANNEL_NAME, config.allow_from.clone()),
            token: config.token.clone(),
            bot: None,
            running: false,
            dispatcher_handle: None,
        }
    }

    /// Allow-list key for a chat: the id, plus the username when known
    fn access_key(chat_id: i64, username: Option<&str>) -> String {
        match username {
            Some(username) => format!("{}|{}", chat_id, username),
            None => chat_id.to_string(),
        }
    }

    /// Turn a plain (non-command) update into an inbound text message
    ///
    /// Captions stand in for text on media messages; anything else carries
    /// nothing to relay.
    fn text_message(chat_id: i64, text: Option<&str>, caption: Option<&str>) -> Option<InboundMessage> {
        let content = text.or(caption)?;
        if content.trim().is_empty() {
            return None;
        }
        Some(InboundMessage::text(CHANNEL_NAME, UserId::from(chat_id), content))
    }

    /// Telegram chat id for an outbound recipient
    fn parse_chat_id(raw: &str) -> Result<ChatId> {
        raw.trim()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| ChannelError::InvalidRecipient(format!("not a Telegram chat id: {}", raw)))
    }
}

#[async_trait]
impl ChannelHandler for TelegramHandler {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn start(&mut self) -> Result<()> {
        if self.token.is_empty() {
            return Err(ChannelError::NotConfigured(
                "Telegram token not configured".to_string(),
            ));
        }

        if self.running {
            return Ok(());
        }

        tracing::info!("Starting Telegram bot (polling mode)...");

        let bot = Bot::new(&self.token);

        let commands = vec![
            BotCommand::new("start", "Begin a conversation"),
            BotCommand::new("help", "Show this help message"),
        ];
        if let Err(e) = bot.set_my_commands(commands).await {
            tracing::warn!("Failed to set bot commands: {}", e);
        }

        match bot.get_me().await {
            Ok(me) => {
                let username = me.username.clone().unwrap_or_else(|| "unknown".to_string());
                tracing::info!("Telegram bot @{} connected", username);
            }
            Err(e) => {
                return Err(ChannelError::ApiError(format!(
                    "Failed to get bot info: {}",
                    e
                )));
            }
        }

        let base_cmd = self.base.clone();
        let base_msg = self.base.clone();

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let base = base_cmd.clone();
                        async move {
                            let chat_id = msg.chat.id;
                            let key = TelegramHandler::access_key(chat_id.0, msg.chat.username());
                            match cmd {
                                Command::Start => {
                                    let inbound =
                                        InboundMessage::session_start(CHANNEL_NAME, UserId::from(chat_id.0));
                                    if let Err(e) = base.forward(&key, inbound).await {
                                        tracing::debug!("Dropped /start from {}: {}", key, e);
                                    }
                                }
                                Command::Help => {
                                    if base.is_allowed(&key) {
                                        if let Err(e) = bot.send_message(chat_id, HELP_TEXT).await {
                                            tracing::error!("Error handling /help: {}", e);
                                        }
                                    }
                                }
                            }
                            Ok::<(), teloxide::RequestError>(())
                        }
                    }),
            )
            .branch(Update::filter_message().endpoint(move |msg: Message| {
                let base = base_msg.clone();
                async move {
                    let chat_id = msg.chat.id.0;
                    let key = TelegramHandler::access_key(chat_id, msg.chat.username());
                    match TelegramHandler::text_message(chat_id, msg.text(), msg.caption()) {
                        Some(inbound) => {
                            if let Err(e) = base.forward(&key, inbound).await {
                                tracing::debug!("Dropped message from {}: {}", key, e);
                            }
                        }
                        None => tracing::debug!("Ignoring non-text update from {}", key),
                    }
                    Ok::<(), teloxide::RequestError>(())
                }
            }));

        self.bot = Some(bot.clone());
        self.running = true;

        let dispatcher_handle = tokio::spawn(async move {
            Dispatcher::builder(bot, handler).build().dispatch().await;
        });
        self.dispatcher_handle = Some(dispatcher_handle);

        tracing::info!("Telegram bot started successfully");

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        tracing::info!("Stopping Telegram bot...");

        if let Some(handle) = self.dispatcher_handle.take() {
            handle.abort();
        }

        self.bot = None;
        self.running = false;

        tracing::info!("Telegram bot stopped");

        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let bot = self
            .bot
            .as_ref()
            .ok_or_else(|| ChannelError::NotRunning("Telegram bot not running".to_string()))?;

        let chat_id = Self::parse_chat_id(&message.chat_id)?;

        bot.send_message(chat_id, message.content)
            .await
            .map_err(|e| ChannelError::ApiError(format!("Failed to send message: {}", e)))?;
        Ok(())
    }

    fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>) {
        self.base.set_inbound_sender(tx);
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.base.is_allowed(sender_id)
    }
}
