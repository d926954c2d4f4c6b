//! Wire messages exchanged with chat clients.
//!
//! Everything on the socket is JSON with a `type` tag. Inbound payloads
//! are validated here, before they reach the session state machine; a
//! payload that fails validation never produces a broadcast.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{StoredMessage, Username};

/// Server-to-client wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// A chat message, either replayed history or a live broadcast. Both
    /// take this same shape, so clients render them identically.
    ChatMessage {
        message_id: u64,
        sender_username: String,
        text: String,
        /// RFC 3339 timestamp assigned by the message store.
        timestamp: String,
    },
    /// The full member list of a room after it changed.
    ActiveUsersUpdate { users: Vec<String> },
    /// A notice to a single client about its own malformed input.
    Error { message: String },
}

impl WireMessage {
    /// Wire form of a stored chat message.
    pub fn chat_message(message: &StoredMessage) -> Self {
        Self::ChatMessage {
            message_id: message.id.value(),
            sender_username: message.sender_username.as_str().to_owned(),
            text: message.text.clone(),
            timestamp: message.timestamp.to_rfc3339(),
        }
    }

    /// Wire form of a presence snapshot.
    pub fn active_users_update(users: &[Username]) -> Self {
        Self::ActiveUsersUpdate {
            users: users.iter().map(|u| u.as_str().to_owned()).collect(),
        }
    }

    /// The notice returned for an unparseable client payload.
    pub fn invalid_format() -> Self {
        Self::Error {
            message: "Invalid message format".to_owned(),
        }
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("wire message is always serializable")
    }
}

/// Inbound client payload: a chat message submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Inbound {
    pub text: String,
}

/// Rejection of an inbound payload.
#[derive(Debug, Error)]
pub enum InboundError {
    /// Not a JSON object of the expected shape.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The text field is present but empty.
    #[error("message text is empty")]
    EmptyText,
}

/// Validate a raw inbound payload into a chat message submission.
pub fn parse_inbound(raw: &str) -> Result<Inbound, InboundError> {
    let inbound: Inbound = serde_json::from_str(raw)?;
    if inbound.text.is_empty() {
        return Err(InboundError::EmptyText);
    }
    Ok(inbound)
}
