//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Each variant maps
//! to a specific HTTP status code and structured JSON error response, and to
//! a WebSocket close code for failures that happen after upgrade.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::RoomId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "room already exists: abc",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RelayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                     |
/// |-----------|---------------------|---------------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request                 |
/// | 2000–2099 | Not Found           | 404 Not Found                   |
/// | 2100–2199 | Membership conflict | 409 Conflict                    |
/// | 2200–2299 | Capacity            | 503 Service Unavailable         |
/// | 3000–3999 | Server / transport  | 500 Internal Server Error       |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Malformed room identifier.
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),

    /// Unknown connection role.
    #[error("invalid role: {0:?} (expected publisher or observer)")]
    InvalidRole(String),

    /// Room with the given id does not exist and the operation does not
    /// imply creation.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// Log file with the given id does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Explicitly requested room id collides with a live room.
    #[error("room already exists: {0}")]
    RoomAlreadyExists(RoomId),

    /// A publisher is already joined to the room.
    #[error("room {0} already has an active publisher")]
    PublisherConflict(RoomId),

    /// The connection is already a member of the room.
    #[error("connection already joined: {0}")]
    AlreadyJoined(String),

    /// The room was removed from the registry while the join was in flight.
    #[error("room {0} is closing")]
    RoomRetired(RoomId),

    /// A room or registry limit was reached.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Read or write failure on one connection's transport.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Log file storage failure.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidRoomId(_) => 1002,
            Self::InvalidRole(_) => 1003,
            Self::RoomNotFound(_) => 2001,
            Self::FileNotFound(_) => 2002,
            Self::RoomAlreadyExists(_) => 2101,
            Self::PublisherConflict(_) => 2102,
            Self::AlreadyJoined(_) => 2103,
            Self::RoomRetired(_) => 2104,
            Self::CapacityExceeded(_) => 2201,
            Self::Internal(_) => 3000,
            Self::TransportError(_) => 3001,
            Self::StorageError(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidRoomId(_) | Self::InvalidRole(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::RoomNotFound(_) | Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::RoomAlreadyExists(_)
            | Self::PublisherConflict(_)
            | Self::AlreadyJoined(_)
            | Self::RoomRetired(_) => StatusCode::CONFLICT,
            Self::CapacityExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::TransportError(_) | Self::StorageError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the WebSocket close code used when a join is rejected after
    /// upgrade: `4000 + (error_code % 1000)`, inside the application range.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        4000 + (self.error_code() % 1000) as u16
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn room_id() -> RoomId {
        let Ok(id) = RoomId::parse("abc") else {
            panic!("valid id");
        };
        id
    }

    #[test]
    fn conflict_variants_map_to_409() {
        for err in [
            RelayError::RoomAlreadyExists(room_id()),
            RelayError::PublisherConflict(room_id()),
            RelayError::AlreadyJoined("x".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn close_codes_stay_in_application_range() {
        assert_eq!(RelayError::PublisherConflict(room_id()).close_code(), 4102);
        assert_eq!(RelayError::RoomNotFound(room_id()).close_code(), 4001);
        assert_eq!(RelayError::Internal(String::new()).close_code(), 4000);
    }

    #[test]
    fn message_includes_room_id() {
        let err = RelayError::RoomAlreadyExists(room_id());
        assert_eq!(err.to_string(), "room already exists: abc");
    }

    #[tokio::test]
    async fn into_response_renders_error_body() {
        let response = RelayError::RoomNotFound(room_id()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let Ok(bytes) = axum::body::to_bytes(response.into_body(), 4096).await else {
            panic!("body should be readable");
        };
        let Ok(json) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("body should be JSON");
        };
        assert_eq!(json["error"]["code"], 2001);
        assert_eq!(json["error"]["message"], "room not found: abc");
    }
}
