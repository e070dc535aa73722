//! Error types for operator-desk

use thiserror::Error;

/// The main error type for operator-desk operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Channel communication errors (queues, dispatcher)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Missing or malformed required fields; never reaches the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation references an unknown active user
    #[error("Not found: {0}")]
    NotFound(String),

    /// The messaging platform rejected an outbound message
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Rename target already denotes a distinct user
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Channel(_) => "channel",
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Delivery(_) => "delivery",
            Error::Conflict(_) => "conflict",
            Error::Internal(_) => "internal",
        }
    }
}

/// A specialized Result type for operator-desk operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
