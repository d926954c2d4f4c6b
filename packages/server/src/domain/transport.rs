//! Inbound transport contract.

use async_trait::async_trait;
use thiserror::Error;

/// The underlying transport failed on the inbound path.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Inbound half of one client connection.
///
/// `Ok(None)` means the peer is gone, whether it closed cleanly or the
/// transport was torn down. Either way the owning session moves to its
/// closing state. The outbound half of a connection is its
/// [`super::ConnectionHandle`] queue.
#[async_trait]
pub trait MessageStream: Send {
    /// Wait for the next inbound text payload.
    async fn next_text(&mut self) -> Result<Option<String>, TransportError>;
}
