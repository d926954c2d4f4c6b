//! Presence registry: the source of truth for who is connected where.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::{ConnId, ConnectionHandle, RoomId, Username};

/// Rejection from [`PresenceRegistry::add`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    /// The username already has a live connection in this room. The new
    /// connection is rejected; the existing registration is untouched.
    #[error("user '{0}' is already connected to this room")]
    UserAlreadyConnected(Username),
}

#[derive(Debug, Default)]
struct RoomPresence {
    /// At most one live connection per username.
    members: HashMap<Username, ConnectionHandle>,
}

/// Live connections of every room, keyed by room and username.
///
/// A single async mutex guards the whole map, so add, remove, and the
/// read operations are atomic with respect to each other. A room has an
/// entry only while it has at least one live connection; removing the
/// last member deletes the entry.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    rooms: Mutex<HashMap<RoomId, RoomPresence>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, creating the room entry if this is the
    /// room's first member.
    pub async fn add(
        &self,
        room_id: RoomId,
        username: Username,
        handle: ConnectionHandle,
    ) -> Result<(), JoinError> {
        let mut rooms = self.rooms.lock().await;
        let presence = rooms.entry(room_id).or_default();
        if presence.members.contains_key(&username) {
            return Err(JoinError::UserAlreadyConnected(username));
        }
        presence.members.insert(username, handle);
        Ok(())
    }

    /// Unregister a connection and prune the room entry if it was the
    /// last member. Returns whether a registration was removed.
    ///
    /// The stored handle is removed only when it belongs to the same
    /// connection (`conn_id`), so a late unregistration from a dead
    /// session cannot evict the user's newer connection.
    pub async fn remove(&self, room_id: RoomId, username: &Username, conn_id: ConnId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let Some(presence) = rooms.get_mut(&room_id) else {
            return false;
        };
        let removed = match presence.members.get(username) {
            Some(handle) if handle.id() == conn_id => {
                presence.members.remove(username);
                true
            }
            _ => false,
        };
        if presence.members.is_empty() {
            rooms.remove(&room_id);
        }
        removed
    }

    /// Usernames currently connected to the room, sorted. Empty for a
    /// room with no live connections.
    pub async fn snapshot(&self, room_id: RoomId) -> Vec<Username> {
        let rooms = self.rooms.lock().await;
        let mut users: Vec<Username> = rooms
            .get(&room_id)
            .map(|presence| presence.members.keys().cloned().collect())
            .unwrap_or_default();
        users.sort();
        users
    }

    /// Delivery handles of every live connection in the room.
    pub async fn handles(&self, room_id: RoomId) -> Vec<ConnectionHandle> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(&room_id)
            .map(|presence| presence.members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one live connection.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Number of live connections in the room.
    pub async fn member_count(&self, room_id: RoomId) -> usize {
        self.rooms
            .lock()
            .await
            .get(&room_id)
            .map_or(0, |presence| presence.members.len())
    }
}
