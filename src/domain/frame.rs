//! Wire frames exchanged between the relay and its clients.
//!
//! Every frame is a JSON text message of the shape
//! `{"type": "control" | "data", "sender_role": ..., "payload": ...}`.
//! Data frames carry the publisher's (or an observer's) debugging payload
//! verbatim; control frames carry a [`ControlEvent`] produced by the relay
//! itself and are never subject to drop-oldest eviction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConnectionId, RoomId};
use crate::error::RelayError;

/// Role a connection declares when joining a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Originates the debugging event stream. At most one per room.
    Publisher,
    /// Receives the relayed stream.
    Observer,
}

impl Role {
    /// Returns the role as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publisher" => Ok(Self::Publisher),
            "observer" => Ok(Self::Observer),
            other => Err(RelayError::InvalidRole(other.to_string())),
        }
    }
}

/// Frame type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Relay-generated room metadata. Never dropped under backpressure.
    Control,
    /// Relayed client payload. May be dropped under the drop-oldest policy.
    Data,
}

/// Relay-generated control messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    /// Sent to a connection once it has joined a room.
    JoinAck {
        /// Room the connection joined.
        room_id: RoomId,
        /// Server-assigned connection id.
        connection_id: ConnectionId,
        /// Role the connection joined with.
        role: Role,
        /// Whether the room has an active publisher after this join.
        has_publisher: bool,
    },
    /// Sent to a connection whose join was refused, right before close.
    JoinRejected {
        /// Room the connection attempted to join.
        room_id: RoomId,
        /// Numeric error code (see [`RelayError::error_code`]).
        code: u32,
        /// Human-readable reason.
        message: String,
    },
    /// Sent to existing members when a connection joins.
    MemberJoined {
        /// Id of the joining connection.
        connection_id: ConnectionId,
        /// Role of the joining connection.
        role: Role,
    },
    /// Sent to remaining members when a connection leaves.
    MemberLeft {
        /// Id of the departing connection.
        connection_id: ConnectionId,
        /// Role of the departing connection.
        role: Role,
    },
    /// Sent to every member when the room is torn down.
    RoomClosed {
        /// Room being closed.
        room_id: RoomId,
        /// Why the room was closed.
        reason: String,
    },
}

/// One discrete message unit exchanged over a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Control or data.
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Role of the originating connection; `None` for relay-generated frames.
    pub sender_role: Option<Role>,
    /// Frame body.
    pub payload: serde_json::Value,
    /// Server timestamp at which the relay accepted the frame.
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    /// Builds a data frame originating from a connection with `sender_role`.
    #[must_use]
    pub fn data(sender_role: Role, payload: serde_json::Value) -> Self {
        Self {
            kind: FrameKind::Data,
            sender_role: Some(sender_role),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Builds a relay-generated control frame.
    #[must_use]
    pub fn control(event: &ControlEvent) -> Self {
        Self {
            kind: FrameKind::Control,
            sender_role: None,
            payload: serde_json::to_value(event).unwrap_or_default(),
            timestamp: Utc::now(),
        }
    }

    /// Returns `true` for control frames.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.kind == FrameKind::Control
    }

    /// Decodes the payload of a control frame back into a [`ControlEvent`].
    #[must_use]
    pub fn control_event(&self) -> Option<ControlEvent> {
        if !self.is_control() {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }

    /// Serializes the frame for the wire.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
