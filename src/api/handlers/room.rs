//! Room handlers: create and list.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ApiResponse, CreateRoomRequest, CreateRoomResponse, RoomListQuery, RoomSummaryDto,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `POST /room/create` — Create a room.
///
/// # Errors
///
/// Returns [`RelayError`] on a malformed request, an id collision or when
/// the room cap is reached.
#[utoipa::path(
    post,
    path = "/api/v1/room/create",
    tag = "Rooms",
    summary = "Create a room",
    description = "Creates an empty room. When `id` is omitted a short random id is generated.",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = ApiResponse<CreateRoomResponse>),
        (status = 400, description = "Invalid room id or labels", body = ErrorResponse),
        (status = 409, description = "Room id already in use", body = ErrorResponse),
        (status = 503, description = "Room limit reached", body = ErrorResponse),
    )
)]
pub async fn create_room(
    State(state): State<AppState>,
    body: Option<Json<CreateRoomRequest>>,
) -> Result<impl IntoResponse, RelayError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let (requested, metadata) = req.into_parts()?;
    let room_id = state.relay.create_room(requested, metadata).await?;
    Ok(Json(ApiResponse::ok(CreateRoomResponse { room_id })))
}

/// `GET /room/list` — List rooms, optionally filtered by group.
#[utoipa::path(
    get,
    path = "/api/v1/room/list",
    tag = "Rooms",
    summary = "List rooms",
    description = "Returns every live room ordered by creation time.",
    params(RoomListQuery),
    responses(
        (status = 200, description = "Room list", body = ApiResponse<Vec<RoomSummaryDto>>),
    )
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<RoomListQuery>,
) -> impl IntoResponse {
    let rooms: Vec<RoomSummaryDto> = state
        .relay
        .list_rooms(query.group.as_deref())
        .await
        .into_iter()
        .map(RoomSummaryDto::from)
        .collect();
    Json(ApiResponse::ok(rooms))
}

/// Room routes (nested under `/api/v1`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/room/create", post(create_room))
        .route("/room/list", get(list_rooms))
}
