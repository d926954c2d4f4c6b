//! Room-based WebSocket chat server.
//!
//! Serves the chat endpoint at `/ws/chat/{room_id}?token=<token>` and a
//! small room management API under `/api`. Rooms and users given on the
//! command line are seeded at startup; each seeded user gets a bearer
//! token logged to stdout.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin agora-server
//! cargo run --bin agora-server -- --host 0.0.0.0 --port 3000 --room lobby --room dev
//! ```

use std::sync::Arc;

use clap::Parser;

use agora_server::{
    broadcast::BroadcastRouter,
    domain::RoomDirectory,
    infrastructure::{InMemoryChatStore, InMemoryIdentityProvider},
    registry::PresenceRegistry,
    ui::{Server, state::AppState},
};
use agora_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "agora-server")]
#[command(about = "Room-based WebSocket chat server with live presence", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Room to create at startup (repeatable)
    #[arg(long = "room", default_values_t = [String::from("lobby")])]
    rooms: Vec<String>,

    /// User to register at startup (repeatable); the minted token is
    /// logged so clients can pick it up
    #[arg(long = "user", default_values_t = [String::from("alice"), String::from("bob")])]
    users: Vec<String>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Persistence (room directory + message store)
    // 2. Identity provider
    // 3. Presence registry and broadcast router
    // 4. AppState
    // 5. Server

    let store = Arc::new(InMemoryChatStore::new(Arc::new(SystemClock)));
    for name in &args.rooms {
        match store.create_room(name).await {
            Ok(room) => tracing::info!("Room '{}' created with id {}", room.name, room.id),
            Err(e) => tracing::warn!("Skipping room '{}': {}", name, e),
        }
    }

    let identity = Arc::new(InMemoryIdentityProvider::new());
    for name in &args.users {
        let token = identity.register(name, true).await;
        tracing::info!("User '{}' registered, token: {}", name, token);
    }

    let registry = Arc::new(PresenceRegistry::new());
    let router = BroadcastRouter::new(registry.clone());

    let state = AppState {
        registry,
        router,
        identity,
        directory: store.clone(),
        store,
    };

    let server = Server::new(state);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
