//! Log file handlers: upload, download, delete.

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tokio_util::io::ReaderStream;

use crate::api::dto::{ApiResponse, FileIdQuery};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};
use crate::storage::LogFileMeta;

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "log";

/// `POST /log/upload` — Store an uploaded log archive.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] when the `log` field is missing
/// or unreadable, or [`RelayError::StorageError`] on write failure.
#[utoipa::path(
    post,
    path = "/api/v1/log/upload",
    tag = "Logs",
    summary = "Upload a log file",
    description = "Accepts a multipart form with the file in the `log` field.",
    request_body(content_type = "multipart/form-data", description = "Form with a `log` file field"),
    responses(
        (status = 200, description = "File stored", body = ApiResponse<LogFileMeta>),
        (status = 400, description = "Missing or unreadable `log` field", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn upload_log(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, RelayError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| RelayError::InvalidRequest(e.body_text()))?;
        let Some(field) = field else {
            return Err(RelayError::InvalidRequest(format!(
                "missing multipart field `{UPLOAD_FIELD}`"
            )));
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| RelayError::InvalidRequest(e.body_text()))?;
        let meta = state.storage.create_file(&name, &bytes).await?;
        return Ok(Json(ApiResponse::ok(meta)));
    }
}

/// `GET /local/log/download` — Stream a stored log file as an attachment.
///
/// # Errors
///
/// Returns [`RelayError::FileNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/local/log/download",
    tag = "Logs",
    summary = "Download a log file",
    params(FileIdQuery),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown file id", body = ErrorResponse),
    )
)]
pub async fn download_log(
    State(state): State<AppState>,
    Query(query): Query<FileIdQuery>,
) -> Result<impl IntoResponse, RelayError> {
    let stored = state.storage.get_file(&query.file_id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        stored.meta.name.replace(['"', '\\'], "_")
    );
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_LENGTH, stored.meta.size.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(stored.file))))
}

/// `DELETE /local/log/delete` — Delete a stored log file.
///
/// # Errors
///
/// Returns [`RelayError::FileNotFound`] for unknown ids.
#[utoipa::path(
    delete,
    path = "/api/v1/local/log/delete",
    tag = "Logs",
    summary = "Delete a log file",
    params(FileIdQuery),
    responses(
        (status = 200, description = "File deleted", body = ApiResponse<bool>),
        (status = 404, description = "Unknown file id", body = ErrorResponse),
    )
)]
pub async fn delete_log(
    State(state): State<AppState>,
    Query(query): Query<FileIdQuery>,
) -> Result<impl IntoResponse, RelayError> {
    state.storage.delete_file(&query.file_id).await?;
    Ok(Json(ApiResponse::ok(true)))
}

/// Log routes (nested under `/api/v1`). The upload route carries its own
/// body limit.
pub fn routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/log/upload",
            post(upload_log).layer(axum::extract::DefaultBodyLimit::max(upload_max_bytes)),
        )
        .route("/local/log/download", get(download_log))
        .route("/local/log/delete", delete(delete_log))
}
