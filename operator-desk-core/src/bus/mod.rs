//! Relay bus
//!
//! Typed inbound/outbound messages exchanged with chat channels, and the
//! broadcast hub that fans relay events out to live observers.

pub mod events;
pub mod hub;

pub use events::{InboundKind, InboundMessage, OutboundMessage, RelayEvent};
pub use hub::{EventHub, EventSubscriber, DEFAULT_EVENT_BUFFER};
