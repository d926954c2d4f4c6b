//! In-memory chat store: room directory and message history in one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use agora_shared::time::Clock;

use crate::domain::{
    MessageId, MessageStore, RoomDirectory, RoomId, RoomRecord, StoreError, StoredMessage,
    Username,
};

#[derive(Debug, Default)]
struct StoreInner {
    next_room_id: i64,
    next_message_id: u64,
    /// Rooms in creation order; names are unique.
    rooms: Vec<RoomRecord>,
    messages: HashMap<RoomId, Vec<StoredMessage>>,
}

impl StoreInner {
    fn room_exists(&self, room_id: RoomId) -> bool {
        self.rooms.iter().any(|room| room.id == room_id)
    }

    fn push_message(
        &mut self,
        room_id: RoomId,
        sender: &Username,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> StoredMessage {
        self.next_message_id += 1;
        let message = StoredMessage {
            id: MessageId::new(self.next_message_id),
            room_id,
            sender_username: sender.clone(),
            text: text.to_owned(),
            timestamp,
        };
        self.messages.entry(room_id).or_default().push(message.clone());
        message
    }
}

/// In-memory implementation of both persistence collaborators.
///
/// Message timestamps come from the injected [`Clock`], so tests can pin
/// them with a fixed clock.
pub struct InMemoryChatStore {
    clock: Arc<dyn Clock>,
    inner: Mutex<StoreInner>,
}

impl InMemoryChatStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Insert a message with an explicit timestamp. Seeding hook for tests
    /// and demos; the id is still assigned by the store.
    pub async fn seed_message(
        &self,
        room_id: RoomId,
        sender: &Username,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> StoredMessage {
        self.inner
            .lock()
            .await
            .push_message(room_id, sender, text, timestamp)
    }
}

#[async_trait]
impl RoomDirectory for InMemoryChatStore {
    async fn room_exists(&self, room_id: RoomId) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.room_exists(room_id))
    }

    async fn create_room(&self, name: &str) -> Result<RoomRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.rooms.iter().any(|room| room.name == name) {
            return Err(StoreError::NameTaken(name.to_owned()));
        }
        inner.next_room_id += 1;
        let room = RoomRecord {
            id: RoomId::new(inner.next_room_id),
            name: name.to_owned(),
        };
        inner.rooms.push(room.clone());
        Ok(room)
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Option<RoomRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .rooms
            .iter()
            .find(|room| room.id == room_id)
            .cloned())
    }

    async fn list_rooms(&self) -> Result<Vec<RoomRecord>, StoreError> {
        Ok(self.inner.lock().await.rooms.clone())
    }
}

#[async_trait]
impl MessageStore for InMemoryChatStore {
    async fn fetch_recent(
        &self,
        room_id: RoomId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(messages) = inner.messages.get(&room_id) else {
            return Ok(Vec::new());
        };
        let mut recent = messages.clone();
        recent.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn store_message(
        &self,
        room_id: RoomId,
        sender: &Username,
        text: &str,
    ) -> Result<StoredMessage, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.room_exists(room_id) {
            return Err(StoreError::RoomNotFound(room_id));
        }
        let timestamp = self.clock.now();
        Ok(inner.push_message(room_id, sender, text, timestamp))
    }
}
