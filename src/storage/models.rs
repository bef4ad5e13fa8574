//! Stored log file models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Metadata recorded for one uploaded log file.
///
/// Persisted as the JSON sidecar next to the file contents and returned
/// by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LogFileMeta {
    /// Opaque file identifier.
    pub file_id: Uuid,
    /// Original file name, reduced to its final path component.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,
}

/// An opened log file ready to be streamed.
#[derive(Debug)]
pub struct StoredLogFile {
    /// Open handle positioned at the start of the contents.
    pub file: tokio::fs::File,
    /// Recorded metadata.
    pub meta: LogFileMeta,
}
