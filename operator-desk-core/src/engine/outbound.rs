//! Outbound adapter seam

use crate::bus::OutboundMessage;
use async_trait::async_trait;

/// Delivers operator-originated text to an end user on the platform
///
/// One attempt per call; the result is final. Implementations report any
/// failure as an error, the engine turns it into a delivery error.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn deliver(&self, message: OutboundMessage) -> crate::Result<()>;
}
