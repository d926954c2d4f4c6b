//! Per-connection delivery handles.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;

/// Process-unique identifier for one live connection.
///
/// A user who reconnects gets a fresh id, which is how the presence
/// registry tells a stale unregistration apart from a current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Close signal sent to a client when the server ends the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// No credential token was supplied.
    AuthRequired,
    /// The token was rejected or the account is inactive.
    AuthFailed,
    /// The requested room does not exist.
    RoomNotFound,
    /// The username already has a live connection in the room.
    UserAlreadyConnected,
    /// A server-side failure ended the session.
    Internal,
}

impl CloseReason {
    /// WebSocket close code for this reason.
    pub fn code(self) -> u16 {
        match self {
            Self::AuthRequired | Self::AuthFailed | Self::UserAlreadyConnected => 1008,
            Self::RoomNotFound => 1007,
            Self::Internal => 1011,
        }
    }

    /// Human-readable text carried in the close frame.
    pub fn text(self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication required",
            Self::AuthFailed => "Authentication failed",
            Self::RoomNotFound => "Room not found",
            Self::UserAlreadyConnected => "User already connected",
            Self::Internal => "Internal server error",
        }
    }
}

/// One item queued for delivery on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A JSON wire payload, delivered as a text frame.
    Frame(String),
    /// End the connection with a close frame.
    Close(CloseReason),
}

/// Sending half of a connection's outbound queue.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// Receiving half, drained by the connection's pusher task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// The delivery target's outbound queue is gone.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("connection outbound queue is closed")]
pub struct DeliveryError;

/// Delivery handle for one live connection.
///
/// Clones share the same id and queue: the presence registry holds one
/// clone per room member while the owning session keeps its own for
/// direct sends. Sends are fire-and-forget, they enqueue onto the
/// unbounded outbound queue and never wait for the transport to flush,
/// so a slow reader cannot stall a broadcast.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnId,
    tx: OutboundSender,
}

impl ConnectionHandle {
    /// Wrap the sending half of an outbound queue, assigning a fresh id.
    pub fn new(tx: OutboundSender) -> Self {
        Self {
            id: ConnId::next(),
            tx,
        }
    }

    /// Create a handle together with the queue it feeds.
    pub fn channel() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Queue a payload for delivery.
    pub fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        self.tx
            .send(Outbound::Frame(payload.to_owned()))
            .map_err(|_| DeliveryError)
    }

    /// Queue a close frame. Payloads queued earlier are still delivered
    /// first; anything sent after this is dropped by the pusher.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.tx.send(Outbound::Close(reason));
    }
}
