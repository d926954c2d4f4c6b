//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{create_room, get_room, health_check, list_rooms, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// WebSocket chat server
///
/// Wraps the shared application state and serves the WebSocket chat
/// endpoint next to the room management API.
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Build the router over the shared state.
    fn app(&self) -> Router {
        Router::new()
            // WebSocket endpoint
            .route("/ws/chat/{room_id}", get(websocket_handler))
            // HTTP endpoints
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(list_rooms).post(create_room))
            .route("/api/rooms/{room_id}", get(get_room))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the WebSocket chat server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified
    /// address or if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), std::io::Error> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Chat server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws/chat/{{room_id}}?token=<token>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener).await
    }

    /// Serve on an already-bound listener. Integration tests bind port 0
    /// themselves and pass the listener in.
    pub async fn serve(self, listener: TcpListener) -> Result<(), std::io::Error> {
        axum::serve(listener, self.app())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
