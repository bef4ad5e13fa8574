//! A single relay room: membership bookkeeping and fan-out.
//!
//! Membership lives behind a [`tokio::sync::RwLock`]. `join`, `leave` and
//! retirement take the write lock; `broadcast` takes the read lock only long
//! enough to snapshot the recipients and delivers outside of it, so one slow
//! recipient never holds up membership changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;

use super::connection::{Connection, ConnectionId};
use super::send_queue::PushOutcome;
use super::{ControlEvent, Frame, Role, RoomId};
use crate::error::RelayError;

/// Optional labels supplied when a room is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoomMetadata {
    /// Display name.
    pub name: Option<String>,
    /// Grouping key used to filter the room list.
    pub group: Option<String>,
}

#[derive(Debug)]
struct Members {
    connections: Vec<Arc<Connection>>,
    retired: bool,
    empty_since: Option<Instant>,
}

/// Point-in-time view of a room for list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    /// Room identifier.
    pub id: RoomId,
    /// Display name.
    pub name: Option<String>,
    /// Grouping key.
    pub group: Option<String>,
    /// Number of joined publishers (0 or 1).
    pub publishers: usize,
    /// Number of joined observers.
    pub observers: usize,
    /// Whether a publisher is present.
    pub live: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last join, leave or broadcast.
    pub last_activity_at: DateTime<Utc>,
}

/// Addressable group of connections for one debugging session.
///
/// # Invariants
///
/// - At most one joined publisher.
/// - No connection id appears twice.
/// - Once retired, a room accepts no further joins.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    metadata: RoomMetadata,
    created_at: DateTime<Utc>,
    last_activity_ms: AtomicI64,
    max_members: usize,
    members: RwLock<Members>,
}

impl Room {
    /// Creates an empty room. `max_members == 0` means unlimited.
    #[must_use]
    pub fn new(id: RoomId, metadata: RoomMetadata, max_members: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            metadata,
            created_at: now,
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
            max_members,
            members: RwLock::new(Members {
                connections: Vec::new(),
                retired: false,
                empty_since: Some(Instant::now()),
            }),
        }
    }

    /// Room id.
    #[must_use]
    pub const fn id(&self) -> &RoomId {
        &self.id
    }

    /// Creation metadata.
    #[must_use]
    pub const fn metadata(&self) -> &RoomMetadata {
        &self.metadata
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Timestamp of the last join, leave or broadcast.
    #[must_use]
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity_ms.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// Attaches a connection and announces it to the other members.
    ///
    /// # Errors
    ///
    /// - [`RelayError::RoomRetired`] if the room was removed from the registry.
    /// - [`RelayError::AlreadyJoined`] if the connection id is already a member.
    /// - [`RelayError::PublisherConflict`] if a publisher is already joined.
    /// - [`RelayError::CapacityExceeded`] if the member cap is reached.
    /// - [`RelayError::TransportError`] if the connection closed before joining.
    pub async fn join(&self, connection: Arc<Connection>) -> Result<(), RelayError> {
        let mut members = self.members.write().await;
        if members.retired {
            return Err(RelayError::RoomRetired(self.id.clone()));
        }
        if members.connections.iter().any(|c| c.id() == connection.id()) {
            return Err(RelayError::AlreadyJoined(connection.id().to_string()));
        }
        if connection.role() == Role::Publisher
            && members
                .connections
                .iter()
                .any(|c| c.role() == Role::Publisher)
        {
            return Err(RelayError::PublisherConflict(self.id.clone()));
        }
        if self.max_members > 0 && members.connections.len() >= self.max_members {
            return Err(RelayError::CapacityExceeded(format!(
                "room {} is full ({} members)",
                self.id, self.max_members
            )));
        }
        if !connection.mark_joined() {
            return Err(RelayError::TransportError(format!(
                "connection {} closed before joining",
                connection.id()
            )));
        }

        let has_publisher = connection.role() == Role::Publisher
            || members
                .connections
                .iter()
                .any(|c| c.role() == Role::Publisher);
        // Ack goes in before the connection is visible to broadcast snapshots.
        connection
            .deliver(Frame::control(&ControlEvent::JoinAck {
                room_id: self.id.clone(),
                connection_id: connection.id(),
                role: connection.role(),
                has_publisher,
            }))
            .await;
        let others = members.connections.clone();
        members.connections.push(Arc::clone(&connection));
        members.empty_since = None;
        drop(members);
        self.touch();

        let notice = Frame::control(&ControlEvent::MemberJoined {
            connection_id: connection.id(),
            role: connection.role(),
        });
        fan_out(&others, &notice).await;

        tracing::info!(
            room_id = %self.id,
            connection_id = %connection.id(),
            role = %connection.role(),
            "member joined"
        );
        Ok(())
    }

    /// Detaches a connection. Returns the removed handle, or `None` if the
    /// id was not a member.
    pub async fn leave(&self, connection_id: ConnectionId) -> Option<Arc<Connection>> {
        let mut members = self.members.write().await;
        let position = members
            .connections
            .iter()
            .position(|c| c.id() == connection_id)?;
        let removed = members.connections.remove(position);
        if members.connections.is_empty() {
            members.empty_since = Some(Instant::now());
        }
        let remaining = members.connections.clone();
        drop(members);
        self.touch();

        let notice = Frame::control(&ControlEvent::MemberLeft {
            connection_id,
            role: removed.role(),
        });
        fan_out(&remaining, &notice).await;

        if removed.role() == Role::Publisher {
            tracing::info!(room_id = %self.id, %connection_id, "publisher left, room orphaned");
        } else {
            tracing::info!(room_id = %self.id, %connection_id, "member left");
        }
        Some(removed)
    }

    /// Relays `frame` from `sender_id` to every other joined member.
    ///
    /// Recipients are snapshotted under the read lock; delivery happens
    /// outside it and concurrently per recipient, so a full queue under the
    /// backpressure policy only stalls its own delivery. Returns the number
    /// of recipients that accepted the frame. A sender that is not a member
    /// relays nothing.
    pub async fn broadcast(&self, sender_id: ConnectionId, frame: Frame) -> usize {
        let recipients: Vec<Arc<Connection>> = {
            let members = self.members.read().await;
            if !members.connections.iter().any(|c| c.id() == sender_id) {
                return 0;
            }
            members
                .connections
                .iter()
                .filter(|c| c.id() != sender_id && c.is_joined())
                .map(Arc::clone)
                .collect()
        };
        self.touch();
        fan_out(&recipients, &frame).await
    }

    /// Number of joined members.
    pub async fn member_count(&self) -> usize {
        self.members.read().await.connections.len()
    }

    /// `true` if a publisher is joined ("live"), `false` if orphaned.
    pub async fn has_publisher(&self) -> bool {
        self.members
            .read()
            .await
            .connections
            .iter()
            .any(|c| c.role() == Role::Publisher)
    }

    /// Returns `(publishers, observers)`.
    pub async fn role_counts(&self) -> (usize, usize) {
        let members = self.members.read().await;
        let publishers = members
            .connections
            .iter()
            .filter(|c| c.role() == Role::Publisher)
            .count();
        (publishers, members.connections.len() - publishers)
    }

    /// Builds a list-view summary.
    pub async fn summary(&self) -> RoomSummary {
        let (publishers, observers) = self.role_counts().await;
        RoomSummary {
            id: self.id.clone(),
            name: self.metadata.name.clone(),
            group: self.metadata.group.clone(),
            publishers,
            observers,
            live: publishers > 0,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at(),
        }
    }

    /// How long the room has been empty, or `None` if it has members.
    pub async fn idle_for(&self) -> Option<Duration> {
        self.members
            .read()
            .await
            .empty_since
            .map(|since| since.elapsed())
    }

    /// Retires the room if it has been empty for at least `min_idle`.
    /// Returns `true` if this call retired it. Called by the registry while
    /// it holds its map lock.
    pub async fn try_retire(&self, min_idle: Duration) -> bool {
        let mut members = self.members.write().await;
        let idle_long_enough = members
            .empty_since
            .is_some_and(|since| since.elapsed() >= min_idle);
        if members.retired || !members.connections.is_empty() || !idle_long_enough {
            return false;
        }
        members.retired = true;
        true
    }

    /// Returns `true` once the room has been retired.
    pub async fn is_retired(&self) -> bool {
        self.members.read().await.retired
    }

    /// Retires the room, tells every member it is closing and closes their
    /// connections. Returns the number of evicted members.
    pub async fn evict_all(&self, reason: &str) -> usize {
        let evicted = {
            let mut members = self.members.write().await;
            members.retired = true;
            members.empty_since = Some(Instant::now());
            std::mem::take(&mut members.connections)
        };
        let notice = Frame::control(&ControlEvent::RoomClosed {
            room_id: self.id.clone(),
            reason: reason.to_string(),
        });
        for connection in &evicted {
            connection.deliver(notice.clone()).await;
            connection.close(reason).await;
        }
        if !evicted.is_empty() {
            tracing::info!(room_id = %self.id, count = evicted.len(), reason, "room evicted");
        }
        evicted.len()
    }

    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

/// Delivers `frame` to each connection concurrently; returns how many
/// accepted it.
async fn fan_out(recipients: &[Arc<Connection>], frame: &Frame) -> usize {
    if recipients.is_empty() {
        return 0;
    }
    let outcomes = join_all(
        recipients
            .iter()
            .map(|connection| connection.deliver(frame.clone())),
    )
    .await;
    outcomes
        .into_iter()
        .filter(|outcome| matches!(outcome, PushOutcome::Queued | PushOutcome::DroppedOldest))
        .count()
}
