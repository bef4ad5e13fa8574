//! Transport-free connection handle shared between a room and a session.
//!
//! A [`Connection`] is what a [`super::Room`] holds for each member: its
//! identity, role, lifecycle state, and outbound [`SendQueue`]. The WebSocket
//! session that owns the actual transport (see `crate::ws::connection`)
//! drains the queue and watches the cancellation token; nothing else is
//! shared between the read and write loops.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::send_queue::{OverflowPolicy, PushOutcome, SendQueue};
use super::{Frame, Role, RoomId};

/// Unique identifier for one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Created, not yet attached to a room.
    Connecting = 0,
    /// Attached to a room and relaying.
    Joined = 1,
    /// Teardown in progress; loops are stopping.
    Closing = 2,
    /// Terminal. All resources released.
    Closed = 3,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Joined,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Per-connection settings taken from the relay configuration.
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    /// Outbound queue capacity.
    pub capacity: usize,
    /// Behaviour when the queue is full.
    pub policy: OverflowPolicy,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 256,
            policy: OverflowPolicy::DropOldest,
        }
    }
}

/// Room-side handle to one client session.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    room_id: RoomId,
    role: Role,
    state: AtomicU8,
    queue: SendQueue,
    cancel: CancellationToken,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Creates a handle in the [`ConnectionState::Connecting`] state.
    #[must_use]
    pub fn new(room_id: RoomId, role: Role, settings: QueueSettings) -> Self {
        Self {
            id: ConnectionId::new(),
            room_id,
            role,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            queue: SendQueue::new(settings.capacity, settings.policy),
            cancel: CancellationToken::new(),
            connected_at: Utc::now(),
        }
    }

    /// Connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Room this connection targets.
    #[must_use]
    pub const fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Declared role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// When the handle was created.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Outbound queue drained by the session's write loop.
    #[must_use]
    pub const fn queue(&self) -> &SendQueue {
        &self.queue
    }

    /// Token cancelled when the connection starts closing.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `connecting -> joined`. Returns `false` if the connection already
    /// moved past `connecting`.
    pub fn mark_joined(&self) -> bool {
        self.transition(ConnectionState::Connecting, ConnectionState::Joined)
    }

    /// Starts teardown: moves to `closing`, cancels both loops and closes
    /// the queue. Only the first caller gets `true`; later calls are no-ops.
    pub async fn close(&self, reason: &str) -> bool {
        let from_joined = self.transition(ConnectionState::Joined, ConnectionState::Closing);
        let first = from_joined
            || self.transition(ConnectionState::Connecting, ConnectionState::Closing);
        if !first {
            return false;
        }
        tracing::debug!(connection_id = %self.id, room_id = %self.room_id, reason, "connection closing");
        self.cancel.cancel();
        self.queue.close().await;
        true
    }

    /// `closing -> closed`. Called once both loops have terminated.
    pub fn mark_closed(&self) -> bool {
        self.transition(ConnectionState::Closing, ConnectionState::Closed)
    }

    /// Returns `true` while the connection is joined and accepting frames.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.state() == ConnectionState::Joined
    }

    /// Enqueues a frame for delivery.
    pub async fn deliver(&self, frame: Frame) -> PushOutcome {
        let outcome = self.queue.push(frame).await;
        if outcome == PushOutcome::DroppedOldest {
            tracing::debug!(connection_id = %self.id, "send queue full, dropped oldest data frame");
        }
        outcome
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
