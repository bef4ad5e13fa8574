//! REST endpoint handlers organized by resource.

pub mod log;
pub mod room;
pub mod system;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;
use crate::ws::handler::join_room_handler;

/// Composes all resource routes under `/api/v1`.
pub fn routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(room::routes())
        .merge(log::routes(upload_max_bytes))
        .merge(system::routes())
        .route("/ws/room/join", get(join_room_handler))
}
