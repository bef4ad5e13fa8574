//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Success envelope wrapping every non-error REST response:
/// `{"success": true, "data": …}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Always `true`; failures use [`crate::error::ErrorResponse`].
    pub success: bool,
    /// Endpoint-specific payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wraps `data` in a success envelope.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Query parameter naming a stored log file.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct FileIdQuery {
    /// File id returned by the upload endpoint.
    pub file_id: String,
}
