//! Axum WebSocket upgrade handler for room joins.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app_state::AppState;
use crate::domain::{Role, RoomId};
use crate::error::{ErrorResponse, RelayError};

/// Query parameters for `GET /api/v1/ws/room/join`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct JoinParams {
    /// Target room id.
    pub room_id: String,
    /// `publisher` or `observer`.
    pub role: String,
}

/// `GET /ws/room/join` — Upgrade to WebSocket and join a room.
///
/// The room id and role are validated before the upgrade so malformed
/// requests fail with a plain HTTP 400. Membership failures (publisher
/// conflict, capacity) happen after the upgrade and are reported in-band.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRoomId`] or [`RelayError::InvalidRole`].
#[utoipa::path(
    get,
    path = "/api/v1/ws/room/join",
    tag = "Rooms",
    summary = "Join a room over WebSocket",
    description = "Upgrades to a WebSocket and joins the room as publisher or observer. A rejected join receives a `join_rejected` control frame followed by a close frame with code 4000 + (error code % 1000).",
    params(JoinParams),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 400, description = "Invalid room id or role", body = ErrorResponse),
    )
)]
pub async fn join_room_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<JoinParams>,
) -> Result<impl IntoResponse, RelayError> {
    let room_id = RoomId::parse(&params.room_id)?;
    let role: Role = params.role.parse()?;

    tracing::debug!(%room_id, %role, "ws join requested");
    let relay = std::sync::Arc::clone(&state.relay);
    Ok(ws.on_upgrade(move |socket| async move {
        relay.join_room(room_id, role, socket).await;
    }))
}
