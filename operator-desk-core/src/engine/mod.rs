//! Relay engine
//!
//! Translates platform and operator actions into conversation store
//! mutations and live events.

pub mod outbound;
pub mod relay;

pub use outbound::Outbound;
pub use relay::RelayEngine;
