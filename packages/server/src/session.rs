//! Room session: the per-connection state machine.
//!
//! One session runs per WebSocket connection: authenticate, join the
//! room, replay recent history, then pump inbound messages until the peer
//! disconnects or a fatal error ends the session. All shared state lives
//! in the presence registry; the only connection a session writes to
//! directly is its own.

use std::sync::Arc;

use crate::{
    broadcast::BroadcastRouter,
    domain::{
        AuthError, CloseReason, ConnectionHandle, Identity, IdentityProvider, MessageStore,
        MessageStream, RoomDirectory, RoomId, Username,
    },
    registry::PresenceRegistry,
    wire::{self, WireMessage},
};

/// How many stored messages are replayed to a freshly joined connection.
pub const HISTORY_REPLAY_LIMIT: usize = 50;

/// Why the active phase ended. Every variant funnels through the same
/// closing path: unregister, then broadcast presence to whoever is left.
enum Exit {
    /// The peer disconnected or its transport failed.
    PeerGone,
    /// The session's own outbound queue is gone.
    QueueClosed,
    /// A persistence collaborator failed; fatal to this connection only.
    StoreFailed,
}

/// The per-connection state machine.
pub struct RoomSession {
    room_id: RoomId,
    registry: Arc<PresenceRegistry>,
    router: BroadcastRouter,
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn RoomDirectory>,
    store: Arc<dyn MessageStore>,
}

impl RoomSession {
    pub fn new(
        room_id: RoomId,
        registry: Arc<PresenceRegistry>,
        router: BroadcastRouter,
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn RoomDirectory>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            room_id,
            registry,
            router,
            identity,
            directory,
            store,
        }
    }

    /// Drive one accepted connection from handshake to close.
    ///
    /// `stream` is the inbound half of the transport; `handle` is the
    /// outbound half, which this session owns and registers in the
    /// presence registry for the duration of its active phase. `token` is
    /// the credential the client supplied, if any.
    pub async fn run<S: MessageStream>(
        self,
        stream: &mut S,
        handle: ConnectionHandle,
        token: Option<&str>,
    ) {
        let identity = match self.authenticate(token).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!(
                    "Rejecting connection {} to room {}: {}",
                    handle.id(),
                    self.room_id,
                    err
                );
                handle.close(close_reason_for(&err));
                return;
            }
        };
        let username = identity.username;

        match self.directory.room_exists(self.room_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    "User '{}' tried to join unknown room {}",
                    username,
                    self.room_id
                );
                handle.close(CloseReason::RoomNotFound);
                return;
            }
            Err(err) => {
                tracing::error!("Room lookup failed for room {}: {}", self.room_id, err);
                handle.close(CloseReason::Internal);
                return;
            }
        }

        if let Err(err) = self
            .registry
            .add(self.room_id, username.clone(), handle.clone())
            .await
        {
            tracing::warn!(
                "Rejecting connection {} to room {}: {}",
                handle.id(),
                self.room_id,
                err
            );
            handle.close(CloseReason::UserAlreadyConnected);
            return;
        }
        tracing::info!(
            "User '{}' joined room {} (connection {})",
            username,
            self.room_id,
            handle.id()
        );

        let exit = self.active(stream, &handle, &username).await;

        // Closing: unregister first, then tell the remaining members. The
        // handle-identity check in remove keeps a late arrival of this
        // cleanup from touching a newer connection of the same user.
        if self
            .registry
            .remove(self.room_id, &username, handle.id())
            .await
        {
            self.router.broadcast_presence(self.room_id).await;
        }
        if let Exit::StoreFailed = exit {
            handle.close(CloseReason::Internal);
        }
        tracing::info!(
            "User '{}' left room {} (connection {})",
            username,
            self.room_id,
            handle.id()
        );
    }

    /// Replay history, announce the join, then pump inbound messages.
    async fn active<S: MessageStream>(
        &self,
        stream: &mut S,
        handle: &ConnectionHandle,
        username: &Username,
    ) -> Exit {
        match self.store.fetch_recent(self.room_id, HISTORY_REPLAY_LIMIT).await {
            Ok(history) => {
                // Fetched newest first, replayed oldest first.
                for message in history.iter().rev() {
                    let payload = WireMessage::chat_message(message).to_json();
                    if handle.send(&payload).is_err() {
                        return Exit::QueueClosed;
                    }
                }
            }
            Err(err) => {
                tracing::error!("History fetch failed for room {}: {}", self.room_id, err);
                return Exit::StoreFailed;
            }
        }
        self.router.broadcast_presence(self.room_id).await;

        loop {
            let text = match stream.next_text().await {
                Ok(Some(text)) => text,
                Ok(None) => return Exit::PeerGone,
                Err(err) => {
                    tracing::debug!("Connection {} transport error: {}", handle.id(), err);
                    return Exit::PeerGone;
                }
            };

            let inbound = match wire::parse_inbound(&text) {
                Ok(inbound) => inbound,
                Err(err) => {
                    // Malformed input bounces back to the sender alone;
                    // the room never sees it.
                    tracing::debug!(
                        "Malformed payload from '{}' in room {}: {}",
                        username,
                        self.room_id,
                        err
                    );
                    let notice = WireMessage::invalid_format().to_json();
                    if handle.send(&notice).is_err() {
                        return Exit::QueueClosed;
                    }
                    continue;
                }
            };

            let stored = match self
                .store
                .store_message(self.room_id, username, &inbound.text)
                .await
            {
                Ok(stored) => stored,
                Err(err) => {
                    tracing::error!(
                        "Storing message from '{}' in room {} failed: {}",
                        username,
                        self.room_id,
                        err
                    );
                    return Exit::StoreFailed;
                }
            };
            let payload = WireMessage::chat_message(&stored).to_json();
            self.router.broadcast_message(self.room_id, &payload).await;
        }
    }

    async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let Some(token) = token else {
            return Err(AuthError::MissingToken);
        };
        let identity = self.identity.resolve_identity(token).await?;
        if !identity.is_active {
            return Err(AuthError::InactiveUser(identity.username.to_string()));
        }
        Ok(identity)
    }
}

fn close_reason_for(err: &AuthError) -> CloseReason {
    match err {
        AuthError::MissingToken => CloseReason::AuthRequired,
        AuthError::InvalidToken | AuthError::InactiveUser(_) => CloseReason::AuthFailed,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    use agora_shared::time::FixedClock;

    use super::*;
    use crate::domain::{
        MockMessageStore, MockRoomDirectory, Outbound, OutboundReceiver, StoreError,
        TransportError,
    };
    use crate::infrastructure::{InMemoryChatStore, InMemoryIdentityProvider};

    /// Inbound transport fed from a channel: send payloads through the
    /// sender, drop it to disconnect the peer.
    struct ChannelStream {
        rx: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl MessageStream for ChannelStream {
        async fn next_text(&mut self) -> Result<Option<String>, TransportError> {
            Ok(self.rx.recv().await)
        }
    }

    struct Harness {
        registry: Arc<PresenceRegistry>,
        router: BroadcastRouter,
        identity: Arc<InMemoryIdentityProvider>,
        store: Arc<InMemoryChatStore>,
        room_id: RoomId,
    }

    struct Client {
        inbound: mpsc::UnboundedSender<String>,
        outbound: OutboundReceiver,
        task: JoinHandle<()>,
    }

    impl Harness {
        /// Registry, router, and a seeded store with one room and the
        /// users alice and bob (tokens equal to "<name>-token").
        async fn new() -> Self {
            let registry = Arc::new(PresenceRegistry::new());
            let router = BroadcastRouter::new(registry.clone());
            let identity = Arc::new(InMemoryIdentityProvider::new());
            identity.register_with_token("alice-token", "alice", true).await;
            identity.register_with_token("bob-token", "bob", true).await;
            identity.register_with_token("carol-token", "carol", false).await;
            let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
            let store = Arc::new(InMemoryChatStore::new(Arc::new(clock)));
            let room = store.create_room("lobby").await.unwrap();
            Self {
                registry,
                router,
                identity,
                store,
                room_id: room.id,
            }
        }

        fn session(&self, room_id: RoomId) -> RoomSession {
            RoomSession::new(
                room_id,
                self.registry.clone(),
                self.router.clone(),
                self.identity.clone(),
                self.store.clone(),
                self.store.clone(),
            )
        }

        fn session_with_store(&self, store: Arc<dyn MessageStore>) -> RoomSession {
            RoomSession::new(
                self.room_id,
                self.registry.clone(),
                self.router.clone(),
                self.identity.clone(),
                self.store.clone(),
                store,
            )
        }

        /// Spawn a session for `token` against `room_id`, as the transport
        /// layer would.
        fn connect_to(&self, room_id: RoomId, token: Option<&str>) -> Client {
            let session = self.session(room_id);
            self.spawn(session, token)
        }

        fn connect(&self, token: Option<&str>) -> Client {
            self.connect_to(self.room_id, token)
        }

        fn spawn(&self, session: RoomSession, token: Option<&str>) -> Client {
            let (inbound, rx) = mpsc::unbounded_channel();
            let (handle, outbound) = ConnectionHandle::channel();
            let token = token.map(str::to_owned);
            let task = tokio::spawn(async move {
                let mut stream = ChannelStream { rx };
                session.run(&mut stream, handle, token.as_deref()).await;
            });
            Client {
                inbound,
                outbound,
                task,
            }
        }
    }

    impl Client {
        async fn next(&mut self) -> Outbound {
            timeout(Duration::from_secs(1), self.outbound.recv())
                .await
                .expect("timed out waiting for outbound item")
                .expect("outbound queue closed unexpectedly")
        }

        async fn next_wire(&mut self) -> WireMessage {
            match self.next().await {
                Outbound::Frame(payload) => serde_json::from_str(&payload).unwrap(),
                Outbound::Close(reason) => panic!("expected frame, got close: {reason:?}"),
            }
        }

        async fn expect_close(&mut self, reason: CloseReason) {
            match self.next().await {
                Outbound::Close(actual) => assert_eq!(actual, reason),
                Outbound::Frame(payload) => panic!("expected close, got frame: {payload}"),
            }
        }

        /// Drain frames until the presence update that contains exactly
        /// `users` arrives.
        async fn wait_for_presence(&mut self, users: &[&str]) {
            loop {
                if let WireMessage::ActiveUsersUpdate { users: actual } = self.next_wire().await {
                    if actual == users {
                        return;
                    }
                }
            }
        }

        fn send(&self, payload: &str) {
            self.inbound.send(payload.to_owned()).unwrap();
        }

        fn disconnect(self) -> JoinHandle<()> {
            drop(self.inbound);
            self.task
        }
    }

    #[tokio::test]
    async fn test_missing_token_closes_with_auth_required() {
        // given
        let harness = Harness::new().await;

        // when
        let mut client = harness.connect(None);

        // then
        client.expect_close(CloseReason::AuthRequired).await;
        assert_eq!(harness.registry.member_count(harness.room_id).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_token_closes_with_auth_failed() {
        // given
        let harness = Harness::new().await;

        // when
        let mut client = harness.connect(Some("wrong-token"));

        // then
        client.expect_close(CloseReason::AuthFailed).await;
    }

    #[tokio::test]
    async fn test_inactive_user_closes_with_auth_failed() {
        // given: carol's account is deactivated
        let harness = Harness::new().await;

        // when
        let mut client = harness.connect(Some("carol-token"));

        // then
        client.expect_close(CloseReason::AuthFailed).await;
    }

    #[tokio::test]
    async fn test_unknown_room_closes_with_room_not_found() {
        // given
        let harness = Harness::new().await;

        // when
        let mut client = harness.connect_to(RoomId::new(99), Some("alice-token"));

        // then
        client.expect_close(CloseReason::RoomNotFound).await;
        assert_eq!(harness.registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_replays_history_then_presence() {
        // given: three stored messages
        let harness = Harness::new().await;
        let alice = Username::new("alice");
        let t = |minute| Utc.with_ymd_and_hms(2025, 6, 1, 11, minute, 0).unwrap();
        harness.store.seed_message(harness.room_id, &alice, "one", t(1)).await;
        harness.store.seed_message(harness.room_id, &alice, "two", t(2)).await;
        harness.store.seed_message(harness.room_id, &alice, "three", t(3)).await;

        // when
        let mut client = harness.connect(Some("bob-token"));

        // then: history in chronological order, then the member list
        for expected in ["one", "two", "three"] {
            match client.next_wire().await {
                WireMessage::ChatMessage { text, .. } => assert_eq!(text, expected),
                other => panic!("expected chat message, got {other:?}"),
            }
        }
        assert_eq!(
            client.next_wire().await,
            WireMessage::ActiveUsersUpdate {
                users: vec!["bob".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_replay_is_capped_at_limit() {
        // given: more stored messages than the replay window
        let harness = Harness::new().await;
        let alice = Username::new("alice");
        for i in 0..(HISTORY_REPLAY_LIMIT as u32 + 10) {
            let ts = Utc
                .with_ymd_and_hms(2025, 6, 1, 10, 0, 0)
                .unwrap()
                + chrono::Duration::seconds(i64::from(i));
            harness
                .store
                .seed_message(harness.room_id, &alice, &format!("m{i}"), ts)
                .await;
        }

        // when
        let mut client = harness.connect(Some("bob-token"));

        // then: exactly the newest 50, oldest of those first
        let mut replayed = Vec::new();
        loop {
            match client.next_wire().await {
                WireMessage::ChatMessage { text, .. } => replayed.push(text),
                WireMessage::ActiveUsersUpdate { .. } => break,
                other => panic!("unexpected message: {other:?}"),
            }
        }
        assert_eq!(replayed.len(), HISTORY_REPLAY_LIMIT);
        assert_eq!(replayed.first().map(String::as_str), Some("m10"));
        assert_eq!(replayed.last().map(String::as_str), Some("m59"));
    }

    #[tokio::test]
    async fn test_join_announces_presence_to_everyone() {
        // given: alice is already in the room
        let harness = Harness::new().await;
        let mut alice = harness.connect(Some("alice-token"));
        alice.wait_for_presence(&["alice"]).await;

        // when: bob joins
        let mut bob = harness.connect(Some("bob-token"));

        // then: both see the updated member list
        alice.wait_for_presence(&["alice", "bob"]).await;
        bob.wait_for_presence(&["alice", "bob"]).await;
        assert_eq!(harness.registry.member_count(harness.room_id).await, 2);
    }

    #[tokio::test]
    async fn test_chat_message_is_stored_and_broadcast_to_all() {
        // given
        let harness = Harness::new().await;
        let mut alice = harness.connect(Some("alice-token"));
        alice.wait_for_presence(&["alice"]).await;
        let mut bob = harness.connect(Some("bob-token"));
        bob.wait_for_presence(&["alice", "bob"]).await;
        alice.wait_for_presence(&["alice", "bob"]).await;

        // when
        alice.send(r#"{"text":"hello room"}"#);

        // then: the sender hears its own message too
        for client in [&mut alice, &mut bob] {
            match client.next_wire().await {
                WireMessage::ChatMessage {
                    sender_username,
                    text,
                    message_id,
                    ..
                } => {
                    assert_eq!(sender_username, "alice");
                    assert_eq!(text, "hello room");
                    assert_eq!(message_id, 1);
                }
                other => panic!("expected chat message, got {other:?}"),
            }
        }
        let stored = harness.store.fetch_recent(harness.room_id, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "hello room");
    }

    #[tokio::test]
    async fn test_malformed_payload_bounces_to_sender_only() {
        // given
        let harness = Harness::new().await;
        let mut alice = harness.connect(Some("alice-token"));
        alice.wait_for_presence(&["alice"]).await;
        let mut bob = harness.connect(Some("bob-token"));
        bob.wait_for_presence(&["alice", "bob"]).await;
        alice.wait_for_presence(&["alice", "bob"]).await;

        // when: alice sends garbage, then a valid message
        alice.send("{}");
        alice.send(r#"{"text":"still here"}"#);

        // then: alice gets the error notice and the session stays up
        assert_eq!(
            alice.next_wire().await,
            WireMessage::Error {
                message: "Invalid message format".to_string(),
            }
        );
        match alice.next_wire().await {
            WireMessage::ChatMessage { text, .. } => assert_eq!(text, "still here"),
            other => panic!("expected chat message, got {other:?}"),
        }
        // bob sees only the valid message, never the notice
        match bob.next_wire().await {
            WireMessage::ChatMessage { text, .. } => assert_eq!(text, "still here"),
            other => panic!("expected chat message, got {other:?}"),
        }
        // nothing was stored for the garbage payload
        let stored = harness.store.fetch_recent(harness.room_id, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected_and_original_survives() {
        // given
        let harness = Harness::new().await;
        let mut first = harness.connect(Some("alice-token"));
        first.wait_for_presence(&["alice"]).await;

        // when: a second connection authenticates as the same user
        let mut second = harness.connect(Some("alice-token"));

        // then: the newcomer is closed, the original stays registered
        second.expect_close(CloseReason::UserAlreadyConnected).await;
        assert_eq!(harness.registry.member_count(harness.room_id).await, 1);

        // and the original still works
        first.send(r#"{"text":"ping"}"#);
        match first.next_wire().await {
            WireMessage::ChatMessage { text, .. } => assert_eq!(text, "ping"),
            other => panic!("expected chat message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_unregisters_and_updates_presence() {
        // given
        let harness = Harness::new().await;
        let mut alice = harness.connect(Some("alice-token"));
        alice.wait_for_presence(&["alice"]).await;
        let mut bob = harness.connect(Some("bob-token"));
        bob.wait_for_presence(&["alice", "bob"]).await;
        alice.wait_for_presence(&["alice", "bob"]).await;

        // when
        let task = bob.disconnect();
        task.await.unwrap();

        // then: alice is told, and the registration is gone
        alice.wait_for_presence(&["alice"]).await;
        assert_eq!(harness.registry.member_count(harness.room_id).await, 1);
    }

    #[tokio::test]
    async fn test_last_leave_prunes_the_room() {
        // given
        let harness = Harness::new().await;
        let mut alice = harness.connect(Some("alice-token"));
        alice.wait_for_presence(&["alice"]).await;

        // when
        alice.disconnect().await.unwrap();

        // then
        assert_eq!(harness.registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_history_fetch_failure_closes_with_internal_error() {
        // given: a message store that fails on fetch
        let harness = Harness::new().await;
        let mut failing = MockMessageStore::new();
        failing
            .expect_fetch_recent()
            .returning(|_, _| Err(StoreError::Unavailable("down".to_string())));
        let session = harness.session_with_store(Arc::new(failing));

        // when
        let mut client = harness.spawn(session, Some("alice-token"));

        // then: the connection is closed and nothing stays registered
        client.expect_close(CloseReason::Internal).await;
        client.task.await.unwrap();
        assert_eq!(harness.registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_mid_session_unregisters_before_closing() {
        // given: history works, storing a message does not
        let harness = Harness::new().await;
        let mut failing = MockMessageStore::new();
        failing.expect_fetch_recent().returning(|_, _| Ok(Vec::new()));
        failing
            .expect_store_message()
            .returning(|_, _, _| Err(StoreError::Unavailable("down".to_string())));
        let session = harness.session_with_store(Arc::new(failing));
        let mut client = harness.spawn(session, Some("alice-token"));
        client.wait_for_presence(&["alice"]).await;

        // when
        client.send(r#"{"text":"doomed"}"#);

        // then
        client.expect_close(CloseReason::Internal).await;
        client.task.await.unwrap();
        assert_eq!(harness.registry.member_count(harness.room_id).await, 0);
    }

    #[tokio::test]
    async fn test_room_lookup_failure_closes_with_internal_error() {
        // given: a directory that errors on lookup
        let mut failing = MockRoomDirectory::new();
        failing
            .expect_room_exists()
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));

        let harness = Harness::new().await;
        let session = RoomSession::new(
            harness.room_id,
            harness.registry.clone(),
            harness.router.clone(),
            harness.identity.clone(),
            Arc::new(failing),
            harness.store.clone(),
        );

        // when
        let mut client = harness.spawn(session, Some("alice-token"));

        // then
        client.expect_close(CloseReason::Internal).await;
        assert_eq!(harness.registry.room_count().await, 0);
    }
}
