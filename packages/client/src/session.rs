//! WebSocket client session management.

use futures_util::{SinkExt, StreamExt};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use agora_server::wire::WireMessage;

use super::{error::ClientError, formatter::MessageFormatter, ui::redisplay_prompt};

/// Close codes the server uses for rejections that a retry cannot fix:
/// 1007 is room-not-found, 1008 covers the auth and duplicate-user cases.
fn is_fatal_close(code: u16) -> bool {
    matches!(code, 1007 | 1008)
}

/// Run one client session against a room.
pub async fn run_client_session(
    url: &str,
    room_id: i64,
    token: &str,
    username: &str,
) -> Result<(), ClientError> {
    // Construct URL with the room path and token as query parameter
    let url = format!("{}/ws/chat/{}?token={}", url, room_id, token);

    let (ws_stream, _response) = connect_async(&url)
        .await
        .map_err(|e| ClientError::Connection(e.to_string()))?;

    tracing::info!("Connected to chat server!");
    println!(
        "\nYou are '{}' in room {}. Type messages and press Enter to send. Press Ctrl+C to exit.\n",
        username, room_id
    );

    let (mut write, mut read) = ws_stream.split();

    // Clone username for read task
    let username_for_read = username.to_string();

    // Spawn a task to handle incoming messages
    let mut read_task = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let formatted = match serde_json::from_str::<WireMessage>(&text) {
                        Ok(WireMessage::ChatMessage {
                            sender_username,
                            text,
                            timestamp,
                            ..
                        }) => MessageFormatter::format_chat_message(
                            &sender_username,
                            &text,
                            &timestamp,
                            &username_for_read,
                        ),
                        Ok(WireMessage::ActiveUsersUpdate { users }) => {
                            MessageFormatter::format_active_users(&users, &username_for_read)
                        }
                        Ok(WireMessage::Error { message }) => {
                            MessageFormatter::format_server_notice(&message)
                        }
                        // Unknown payloads are displayed as raw text
                        Err(_) => MessageFormatter::format_raw_message(&text),
                    };
                    print!("{}", formatted);
                    redisplay_prompt(&username_for_read);
                }
                Ok(Message::Close(frame)) => {
                    return match frame {
                        Some(frame) if is_fatal_close(frame.code.into()) => {
                            Err(ClientError::Rejected {
                                code: frame.code.into(),
                                reason: frame.reason.to_string(),
                            })
                        }
                        _ => {
                            tracing::info!("Server closed the connection");
                            Err(ClientError::Connection(
                                "server closed the connection".to_string(),
                            ))
                        }
                    };
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return Err(ClientError::Connection(e.to_string()));
                }
                _ => {}
            }
        }
        Err(ClientError::Connection("connection closed".to_string()))
    });

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let prompt_name = username.to_string();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", prompt_name);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Forward stdin lines to the WebSocket as chat submissions
    let mut write_task = tokio::spawn(async move {
        while let Some(line) = input_rx.recv().await {
            let payload = serde_json::json!({ "text": line }).to_string();
            if let Err(e) = write.send(Message::Text(payload.into())).await {
                tracing::warn!("Failed to send message: {}", e);
                return Err(ClientError::Connection(e.to_string()));
            }
        }
        // Input ended (Ctrl+C / Ctrl+D); leave the session normally
        Ok(())
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            read_result
                .unwrap_or_else(|e| Err(ClientError::Connection(e.to_string())))?;
        }
        write_result = &mut write_task => {
            read_task.abort();
            write_result
                .unwrap_or_else(|e| Err(ClientError::Connection(e.to_string())))?;
        }
    }

    Ok(())
}
