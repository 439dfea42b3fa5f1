use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use super::types::{
    CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, JoinRoomResponse, KickPlayerRequest,
    LeaderboardEntry, PresenceRequest,
};
use crate::identity;
use crate::room::models::RoomModel;
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /rooms
/// Returns the room code and the (possibly minted) host id
#[instrument(name = "create_room", skip(state, request))]
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    let host_id = request.host_id.unwrap_or_else(identity::host_id);
    let room = state.room_service.create_room(host_id.clone()).await?;

    info!(room_code = %room.code, "Room created via HTTP");

    Ok(Json(CreateRoomResponse {
        room_code: room.code,
        host_id,
    }))
}

/// HTTP handler for fetching a full room snapshot
///
/// GET /rooms/{code}
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state.room_service.get_room(&room_code).await?;
    Ok(Json(room))
}

/// HTTP handler for the derived, score-ranked leaderboard
///
/// GET /rooms/{code}/leaderboard
#[instrument(name = "get_leaderboard", skip(state))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let room = state.room_service.get_room(&room_code).await?;
    Ok(Json(LeaderboardEntry::ranking(&room)))
}

/// HTTP handler for joining a room
///
/// POST /rooms/{code}/join
#[instrument(name = "join_room", skip(state, request))]
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    let player_id = request.player_id.unwrap_or_else(identity::player_id);
    let room = state
        .room_service
        .join_room(&room_code, player_id.clone(), request.name, request.avatar)
        .await?;

    Ok(Json(JoinRoomResponse { player_id, room }))
}

/// HTTP handler for the host kicking a player
///
/// POST /rooms/{code}/kick
#[instrument(name = "kick_player", skip(state, request))]
pub async fn kick_player(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<KickPlayerRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .room_service
        .kick_player(&room_code, &request.host_id, &request.player_id)
        .await?;
    Ok(Json(room))
}

/// HTTP handler for presence updates (connect/disconnect)
///
/// POST /rooms/{code}/presence
#[instrument(name = "set_presence", skip(state, request))]
pub async fn set_presence(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<PresenceRequest>,
) -> Result<Json<RoomModel>, AppError> {
    let room = state
        .room_service
        .set_connected(&room_code, &request.player_id, request.connected)
        .await?;
    Ok(Json(room))
}
