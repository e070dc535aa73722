//! Core types and services for operator-desk
//!
//! This crate holds the conversation store, the relay engine, the event
//! hub, configuration and logging shared by the channel, server and CLI
//! crates.

pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod keepalive;
pub mod logging;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
