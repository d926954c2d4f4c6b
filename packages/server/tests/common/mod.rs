#![allow(dead_code)]

//! Shared harness for integration tests: an in-process server bound to an
//! ephemeral port, seeded with one room and two users.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use agora_server::{
    broadcast::BroadcastRouter,
    domain::RoomDirectory,
    infrastructure::{InMemoryChatStore, InMemoryIdentityProvider},
    registry::PresenceRegistry,
    ui::{Server, state::AppState},
};
use agora_shared::time::SystemClock;

pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<InMemoryChatStore>,
    pub identity: Arc<InMemoryIdentityProvider>,
    pub registry: Arc<PresenceRegistry>,
    server: JoinHandle<()>,
}

impl TestApp {
    /// Start a server with the room "lobby" (id 1) and the active users
    /// alice and bob, whose tokens are "alice-token" and "bob-token".
    pub async fn spawn() -> Self {
        let store = Arc::new(InMemoryChatStore::new(Arc::new(SystemClock)));
        store.create_room("lobby").await.unwrap();

        let identity = Arc::new(InMemoryIdentityProvider::new());
        identity
            .register_with_token("alice-token", "alice", true)
            .await;
        identity.register_with_token("bob-token", "bob", true).await;

        let registry = Arc::new(PresenceRegistry::new());
        let router = BroadcastRouter::new(registry.clone());

        let state = AppState {
            registry: registry.clone(),
            router,
            identity: identity.clone(),
            directory: store.clone(),
            store: store.clone(),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            Server::new(state).serve(listener).await.unwrap();
        });

        Self {
            addr,
            store,
            identity,
            registry,
            server,
        }
    }

    pub fn ws_url(&self, room_id: i64, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws/chat/{}?token={}", self.addr, room_id, token),
            None => format!("ws://{}/ws/chat/{}", self.addr, room_id),
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}
