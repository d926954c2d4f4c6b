//! Persistence collaborator contracts.

use async_trait::async_trait;
use thiserror::Error;

use super::{RoomId, RoomRecord, StoredMessage, Username};

/// Failure inside a persistence collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced room does not exist.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    /// A room with this name already exists.
    #[error("room '{0}' already exists")]
    NameTaken(String),
    /// The backing store failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Room lookup and management.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Whether the room exists.
    async fn room_exists(&self, room_id: RoomId) -> Result<bool, StoreError>;

    /// Create a room; names are unique across the directory.
    async fn create_room(&self, name: &str) -> Result<RoomRecord, StoreError>;

    /// Fetch one room.
    async fn get_room(&self, room_id: RoomId) -> Result<Option<RoomRecord>, StoreError>;

    /// All rooms, in creation order.
    async fn list_rooms(&self) -> Result<Vec<RoomRecord>, StoreError>;
}

/// Durable message history for rooms.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The most recent `limit` messages in the room, newest first.
    async fn fetch_recent(
        &self,
        room_id: RoomId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// Store a new message and return its canonical stored form, with the
    /// id and timestamp the store assigned.
    async fn store_message(
        &self,
        room_id: RoomId,
        sender: &Username,
        text: &str,
    ) -> Result<StoredMessage, StoreError>;
}
