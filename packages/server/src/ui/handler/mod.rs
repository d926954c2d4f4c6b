//! Request handlers for the HTTP API and the WebSocket endpoint.

mod http;
mod websocket;

pub use http::{create_room, get_room, health_check, list_rooms};
pub use websocket::websocket_handler;
