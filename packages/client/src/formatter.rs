//! Message formatting utilities for client display.

use chrono::{DateTime, Local};

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a chat message, marking the current user's own messages.
    ///
    /// `timestamp` is the RFC 3339 string from the wire; it is rendered
    /// as local wall-clock time, or verbatim if it does not parse.
    pub fn format_chat_message(
        sender: &str,
        text: &str,
        timestamp: &str,
        current_user: &str,
    ) -> String {
        let me_suffix = if sender == current_user { " (me)" } else { "" };
        format!(
            "\n[{}] {}{}: {}\n",
            Self::display_time(timestamp),
            sender,
            me_suffix,
            text
        )
    }

    /// Format the room's active-user list.
    pub fn format_active_users(users: &[String], current_user: &str) -> String {
        if users.is_empty() {
            return "\n* Active users: (none)\n".to_string();
        }
        let rendered: Vec<String> = users
            .iter()
            .map(|user| {
                if user == current_user {
                    format!("{} (me)", user)
                } else {
                    user.clone()
                }
            })
            .collect();
        format!("\n* Active users: {}\n", rendered.join(", "))
    }

    /// Format a notice the server sent about this client's own input.
    pub fn format_server_notice(message: &str) -> String {
        format!("\n! Server: {}\n", message)
    }

    /// Format a raw text message (when parsing fails)
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }

    fn display_time(timestamp: &str) -> String {
        match DateTime::parse_from_rfc3339(timestamp) {
            Ok(parsed) => parsed
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
            Err(_) => timestamp.to_string(),
        }
    }
}
