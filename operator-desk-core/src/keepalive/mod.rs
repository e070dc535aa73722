//! Keep-alive pinger for hosts that idle out quiet services

pub mod service;

pub use service::KeepAliveService;
