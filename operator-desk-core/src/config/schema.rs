//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for operator-desk
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relay behaviour
    #[serde(default)]
    pub relay: RelayConfig,
    /// Channel configuration
    #[serde(default)]
    pub channels: ChannelsConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Keep-alive pinger
    #[serde(default)]
    pub keepalive: KeepAliveConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Relay engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Channel that outbound operator messages are routed to
    #[serde(default = "default_relay_channel")]
    pub channel: String,
    /// Notice delivered to the user when an operator ends the chat
    #[serde(default = "default_end_notice")]
    pub end_notice: String,
    /// Automatic replies; an empty string disables the greeting
    #[serde(default)]
    pub greetings: GreetingsConfig,
    /// Capacity of the live event buffer per observer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_relay_channel() -> String {
    "telegram".to_string()
}

fn default_end_notice() -> String {
    "Chat ended.".to_string()
}

fn default_event_buffer() -> usize {
    256
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel: default_relay_channel(),
            end_notice: default_end_notice(),
            greetings: GreetingsConfig::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Greeting texts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetingsConfig {
    /// Sent on every session start (`/start`)
    #[serde(default = "default_session_start_greeting")]
    pub session_start: String,
    /// Sent when a user who was not active writes for the first time
    #[serde(default = "default_first_message_greeting")]
    pub first_message: String,
}

fn default_session_start_greeting() -> String {
    "Welcome! An operator will be with you shortly.".to_string()
}

fn default_first_message_greeting() -> String {
    "Welcome! How can we help?".to_string()
}

impl Default for GreetingsConfig {
    fn default() -> Self {
        Self {
            session_start: default_session_start_greeting(),
            first_message: default_first_message_greeting(),
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub allow_from: Vec<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with the dashboard's static files, served as fallback
    #[serde(default)]
    pub static_dir: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

/// Keep-alive pinger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    #[serde(default)]
    pub enabled: bool,
    /// URL to GET; defaults to the local health endpoint when unset
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_keepalive_interval")]
    pub interval_secs: u64,
}

fn default_keepalive_interval() -> u64 {
    15 * 60
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            interval_secs: default_keepalive_interval(),
        }
    }
}

impl Config {
    /// URL the keep-alive pinger should hit
    pub fn keepalive_url(&self) -> String {
        match &self.keepalive.url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => format!("http://127.0.0.1:{}/api/health", self.server.port),
        }
    }
}
