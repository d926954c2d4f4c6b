//! Client execution logic with reconnection support.

use std::time::Duration;

use super::{error::ClientError, session::run_client_session};

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL_SECS: u64 = 5;

/// Run the chat client with reconnection logic
pub async fn run_client(
    url: String,
    room_id: i64,
    token: String,
    username: String,
) -> Result<(), ClientError> {
    let mut reconnect_count = 0;

    loop {
        tracing::info!(
            "Connecting to {} room {} as '{}' (attempt {}/{})",
            url,
            room_id,
            username,
            reconnect_count + 1,
            MAX_RECONNECT_ATTEMPTS
        );

        match run_client_session(&url, room_id, &token, &username).await {
            Ok(()) => {
                tracing::info!("Client session ended normally");
                // If the session ended normally (user exit), don't reconnect
                break;
            }
            Err(e @ ClientError::Rejected { .. }) => {
                // The server said no; reconnecting would just repeat it
                tracing::error!("{}", e);
                tracing::error!("Server rejected the connection. Exiting.");
                std::process::exit(1);
            }
            Err(e) => {
                tracing::warn!("Connection lost: {}", e);
                reconnect_count += 1;

                if reconnect_count >= MAX_RECONNECT_ATTEMPTS {
                    tracing::error!(
                        "Failed to reconnect after {} attempts. Exiting.",
                        MAX_RECONNECT_ATTEMPTS
                    );
                    std::process::exit(1);
                }

                tracing::info!(
                    "Reconnecting in {} seconds... (attempt {}/{})",
                    RECONNECT_INTERVAL_SECS,
                    reconnect_count + 1,
                    MAX_RECONNECT_ATTEMPTS
                );

                tokio::time::sleep(Duration::from_secs(RECONNECT_INTERVAL_SECS)).await;
            }
        }
    }

    Ok(())
}
