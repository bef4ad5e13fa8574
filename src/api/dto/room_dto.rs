//! Room DTOs for create and list operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{RoomId, RoomMetadata, RoomSummary};
use crate::error::RelayError;

/// Maximum length of a room name or group label.
const MAX_LABEL_LEN: usize = 100;

/// Request body for `POST /room/create`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    /// Requested room id. A fresh id is generated when omitted.
    #[serde(default)]
    pub id: Option<String>,
    /// Optional display name (max 100 chars).
    #[serde(default)]
    pub name: Option<String>,
    /// Optional grouping key (max 100 chars).
    #[serde(default)]
    pub group: Option<String>,
}

impl CreateRoomRequest {
    /// Validates the request into a room id and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRoomId`] for a malformed id or
    /// [`RelayError::InvalidRequest`] for an over-long label.
    pub fn into_parts(self) -> Result<(Option<RoomId>, RoomMetadata), RelayError> {
        let id = self.id.as_deref().map(RoomId::parse).transpose()?;
        let metadata = RoomMetadata {
            name: check_label("name", self.name)?,
            group: check_label("group", self.group)?,
        };
        Ok((id, metadata))
    }
}

fn check_label(field: &str, value: Option<String>) -> Result<Option<String>, RelayError> {
    match value {
        Some(v) if v.chars().count() > MAX_LABEL_LEN => Err(RelayError::InvalidRequest(format!(
            "{field} exceeds {MAX_LABEL_LEN} characters"
        ))),
        Some(v) if v.trim().is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Response payload for `POST /room/create`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoomResponse {
    /// Identifier of the new room.
    #[schema(value_type = String)]
    pub room_id: RoomId,
}

/// Room summary for list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSummaryDto {
    /// Room identifier.
    #[schema(value_type = String)]
    pub room_id: RoomId,
    /// Display name.
    pub name: Option<String>,
    /// Grouping key.
    pub group: Option<String>,
    /// Joined publishers (0 or 1).
    pub publishers: usize,
    /// Joined observers.
    pub observers: usize,
    /// Whether a publisher is streaming.
    pub live: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last join, leave or broadcast.
    pub last_activity_at: DateTime<Utc>,
}

impl From<RoomSummary> for RoomSummaryDto {
    fn from(s: RoomSummary) -> Self {
        Self {
            room_id: s.id,
            name: s.name,
            group: s.group,
            publishers: s.publishers,
            observers: s.observers,
            live: s.live,
            created_at: s.created_at,
            last_activity_at: s.last_activity_at,
        }
    }
}

/// Query parameters for `GET /room/list`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RoomListQuery {
    /// Only list rooms in this group.
    #[serde(default)]
    pub group: Option<String>,
}
