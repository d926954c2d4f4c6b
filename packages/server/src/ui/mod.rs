//! Axum transport layer: the WebSocket endpoint and the HTTP API.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
