//! Error types for the chat client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the session with a close frame. Retrying will
    /// not help: the token is bad, the room does not exist, or the user
    /// is already connected.
    #[error("Connection rejected (close code {code}): {reason}")]
    Rejected { code: u16, reason: String },

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),
}
