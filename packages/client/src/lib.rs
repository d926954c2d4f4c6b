//! agora chat client library.
//!
//! WebSocket CLI client for agora chat rooms: joins a room with a bearer
//! token, renders history, presence, and live messages, and sends stdin
//! lines as chat messages. Reconnects after connection loss; rejections
//! the server signals with a close frame are treated as final.

mod error;
mod formatter;
mod runner;
mod session;
mod ui;

pub use error::ClientError;
pub use runner::run_client;
