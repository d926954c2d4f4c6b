//! WebSocket connection handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;

use crate::{
    domain::{ConnectionHandle, MessageStream, Outbound, OutboundReceiver, RoomId, TransportError},
    session::RoomSession,
    ui::state::AppState,
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Bearer token identifying the user. Optional here so that its
    /// absence reaches the session, which closes the socket with its own
    /// policy instead of failing the HTTP upgrade.
    pub token: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    let room_id = RoomId::new(room_id);
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, query.token))
}

/// Spawns a task that drains a connection's outbound queue into the
/// WebSocket sender.
///
/// Frames go out in queue order. A `Close` item emits the close frame and
/// ends the task; the task also ends when every sender clone is dropped
/// or the socket dies under it.
fn pusher_loop(
    mut rx: OutboundReceiver,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Frame(payload) => {
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(reason) => {
                    let frame = CloseFrame {
                        code: reason.code(),
                        reason: reason.text().into(),
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    })
}

/// Inbound half of an upgraded WebSocket.
///
/// Text frames become session input. Ping/pong and binary frames are
/// skipped; a close frame or a dead socket reads as a disconnect.
struct WsMessageStream {
    receiver: futures_util::stream::SplitStream<WebSocket>,
}

#[async_trait]
impl MessageStream for WsMessageStream {
    async fn next_text(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.receiver.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError(e.to_string())),
            }
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    room_id: RoomId,
    token: Option<String>,
) {
    let (sender, receiver) = socket.split();

    // The session writes through the handle; the pusher owns the sink.
    let (handle, rx) = ConnectionHandle::channel();
    let pusher = pusher_loop(rx, sender);

    let conn_id = handle.id();
    tracing::debug!("Connection {} opened for room {}", conn_id, room_id);

    let mut stream = WsMessageStream { receiver };
    let session = RoomSession::new(
        room_id,
        state.registry.clone(),
        state.router.clone(),
        state.identity.clone(),
        state.directory.clone(),
        state.store.clone(),
    );
    session.run(&mut stream, handle, token.as_deref()).await;

    // The session dropped its handle and the registry entry is gone, so
    // the pusher drains whatever is still queued and exits on its own.
    if let Err(e) = pusher.await {
        tracing::debug!("Pusher task for connection {} panicked: {}", conn_id, e);
    }
    tracing::debug!("Connection {} closed", conn_id);
}
