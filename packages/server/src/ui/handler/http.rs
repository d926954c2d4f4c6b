//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{RoomId, RoomRecord, StoreError},
    ui::state::AppState,
};

/// Room as returned by the list and create endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub id: i64,
    pub name: String,
}

/// Room detail, including who is connected right now.
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: i64,
    pub name: String,
    pub active_users: Vec<String>,
}

/// Body for creating a room.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of rooms
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoomSummaryDto>>, StatusCode> {
    let rooms = state.directory.list_rooms().await.map_err(|e| {
        tracing::error!("Listing rooms failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(rooms.into_iter().map(room_summary).collect()))
}

/// Create a room with a unique name
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomSummaryDto>), StatusCode> {
    if body.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    match state.directory.create_room(&body.name).await {
        Ok(room) => Ok((StatusCode::CREATED, Json(room_summary(room)))),
        Err(StoreError::NameTaken(name)) => {
            tracing::warn!("Room '{}' already exists. Rejecting creation.", name);
            Err(StatusCode::BAD_REQUEST)
        }
        Err(e) => {
            tracing::error!("Creating room failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get room detail by ID, with the currently connected users
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let room_id = RoomId::new(room_id);
    match state.directory.get_room(room_id).await {
        Ok(Some(room)) => {
            let active_users = state
                .registry
                .snapshot(room_id)
                .await
                .into_iter()
                .map(|u| u.to_string())
                .collect();
            Ok(Json(RoomDetailDto {
                id: room.id.value(),
                name: room.name,
                active_users,
            }))
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Room lookup failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn room_summary(room: RoomRecord) -> RoomSummaryDto {
    RoomSummaryDto {
        id: room.id.value(),
        name: room.name,
    }
}
