//! Live fan-out of relay events

use super::events::RelayEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of events buffered per observer
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Broadcast channel delivering every relay event to all current observers
///
/// Publishing never blocks and never fails towards the caller. Observers only
/// see events published after they subscribed; a lagging observer drops the
/// overflow without affecting anyone else.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to every connected observer
    pub fn publish(&self, event: RelayEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => debug!("Published {} to {} observer(s)", name, receivers),
            Err(_) => debug!("Published {} with no observers connected", name),
        }
    }

    /// Register a new observer
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of connected observers
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

/// One observer's view of the event stream
pub struct EventSubscriber {
    rx: broadcast::Receiver<RelayEvent>,
}

impl EventSubscriber {
    /// Wait for the next event; `None` once the hub is gone
    ///
    /// Lag is logged and skipped.
    pub async fn recv(&mut self) -> Option<RelayEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Observer lagged behind, {} event(s) dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive used by tests and pollers
    pub fn try_recv(&mut self) -> Option<RelayEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Observer lagged behind, {} event(s) dropped", skipped);
                }
                Err(_) => return None,
            }
        }
    }

    /// Unwrap into the raw receiver, for stream adapters
    pub fn into_inner(self) -> broadcast::Receiver<RelayEvent> {
        self.rx
    }
}
