//! Type-safe, human-shareable room identifier.
//!
//! [`RoomId`] is a validated newtype around a short string. Clients either
//! request a specific id (which must satisfy [`RoomId::parse`]) or let the
//! registry synthesize one with [`RoomId::generate`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Maximum length of a room identifier.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Length of a generated room identifier.
const GENERATED_LEN: usize = 8;

/// Unique identifier for a relay room.
///
/// Generated once at room creation and immutable thereafter. Used as the key
/// in [`super::RoomRegistry`] and as the `room_id` query parameter of the
/// join endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Synthesizes a fresh random id: 8 lowercase hex characters taken from
    /// a UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(GENERATED_LEN)
            .collect();
        Self(id)
    }

    /// Validates a client-supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRoomId`] if the id is empty, longer than
    /// [`MAX_ROOM_ID_LEN`], or contains characters outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ROOM_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(RelayError::InvalidRoomId(raw.to_string()))
        }
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomId {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_short_hex() {
        let id = RoomId::generate();
        assert_eq!(id.as_str().len(), GENERATED_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_is_unique_enough() {
        assert_ne!(RoomId::generate(), RoomId::generate());
    }

    #[test]
    fn parse_accepts_shareable_ids() {
        for raw in ["abc", "room-1", "Team_Debug_42"] {
            let Ok(id) = RoomId::parse(raw) else {
                panic!("{raw} should be valid");
            };
            assert_eq!(id.as_str(), raw);
        }
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        let too_long = "a".repeat(MAX_ROOM_ID_LEN + 1);
        for raw in ["", "has space", "slash/id", "ünicode", too_long.as_str()] {
            assert!(
                matches!(RoomId::parse(raw), Err(RelayError::InvalidRoomId(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<RoomId, _> = serde_json::from_str("\"abc\"");
        assert!(ok.is_ok());
        let bad: Result<RoomId, _> = serde_json::from_str("\"a b\"");
        assert!(bad.is_err());
    }

    #[test]
    fn display_matches_inner() {
        let Ok(id) = RoomId::parse("abc") else {
            panic!("valid id");
        };
        assert_eq!(format!("{id}"), "abc");
    }
}
