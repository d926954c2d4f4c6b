//! Broadcast router: room-wide fan-out over the presence registry.

use std::sync::Arc;

use crate::{domain::RoomId, registry::PresenceRegistry, wire::WireMessage};

/// Delivers wire payloads to every live connection in a room.
///
/// Fan-out is fire-and-forget: each recipient gets the payload queued on
/// its own connection in queue order, and one dead or slow connection
/// never blocks the rest. A failed delivery is logged and skipped; the
/// dead connection's own session unregisters it when it observes the
/// failure on its transport.
#[derive(Debug, Clone)]
pub struct BroadcastRouter {
    registry: Arc<PresenceRegistry>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// Queue one payload on every live connection in the room, the sender
    /// included.
    pub async fn broadcast_message(&self, room_id: RoomId, payload: &str) {
        for handle in self.registry.handles(room_id).await {
            if handle.send(payload).is_err() {
                tracing::warn!(
                    "Failed to deliver to connection {} in room {}",
                    handle.id(),
                    room_id
                );
            }
        }
    }

    /// Broadcast the room's current member list.
    ///
    /// Sent after every join and after every unregistration, so remaining
    /// members converge on the membership even when updates overlap.
    pub async fn broadcast_presence(&self, room_id: RoomId) {
        let users = self.registry.snapshot(room_id).await;
        let payload = WireMessage::active_users_update(&users).to_json();
        self.broadcast_message(room_id, &payload).await;
    }
}
