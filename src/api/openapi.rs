//! OpenAPI document for the REST and WebSocket endpoints.

use utoipa::OpenApi;

use crate::api::dto::{CreateRoomRequest, CreateRoomResponse, RoomSummaryDto};
use crate::api::handlers::{log, room, system};
use crate::error::{ErrorBody, ErrorResponse};
use crate::storage::LogFileMeta;
use crate::ws::handler;

/// Generated OpenAPI document, served by Swagger UI at `/swagger-ui`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "spy-relay", description = "Room-based relay for remote debugging sessions"),
    paths(
        room::create_room,
        room::list_rooms,
        handler::join_room_handler,
        log::upload_log,
        log::download_log,
        log::delete_log,
        system::health_handler,
    ),
    components(schemas(
        CreateRoomRequest,
        CreateRoomResponse,
        RoomSummaryDto,
        LogFileMeta,
        system::HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Rooms", description = "Room management and WebSocket join"),
        (name = "Logs", description = "Uploaded log archives"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;
