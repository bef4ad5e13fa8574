//! Process-wide table of active rooms.
//!
//! [`RoomRegistry`] stores every room in a `HashMap` behind a
//! [`tokio::sync::RwLock`]. Creation-on-miss and removal both run under the
//! map's write lock, and removal retires the room inside that same scope, so
//! a join can never attach to a room that has already left the table.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;

use super::RoomId;
use super::room::{Room, RoomMetadata, RoomSummary};
use crate::error::RelayError;

/// Upper bounds enforced by the registry. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryLimits {
    /// Maximum number of rooms.
    pub max_rooms: usize,
    /// Maximum members per room.
    pub max_room_members: usize,
}

/// Central store for all active rooms.
///
/// # Concurrency
///
/// - Lookups share the read lock.
/// - `create_room`, `get_or_create`, `remove` and `drain` serialize on the
///   write lock; at most one room is ever created per id.
/// - Once drained the registry is closed and creates no further rooms.
/// - Lock order is always map, then room.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
    limits: RegistryLimits,
    /// Set by `drain` under the write lock.
    closed: AtomicBool,
}

impl RoomRegistry {
    /// Creates an empty registry without limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry enforcing `limits`.
    #[must_use]
    pub fn with_limits(limits: RegistryLimits) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            limits,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a room under `requested` or, if `None`, under a freshly
    /// generated id.
    ///
    /// # Errors
    ///
    /// - [`RelayError::RoomAlreadyExists`] if `requested` is already in use.
    /// - [`RelayError::CapacityExceeded`] if the room cap is reached or the
    ///   registry has been drained.
    pub async fn create_room(
        &self,
        requested: Option<RoomId>,
        metadata: RoomMetadata,
    ) -> Result<Arc<Room>, RelayError> {
        let mut map = self.rooms.write().await;
        self.ensure_open()?;
        self.check_room_capacity(map.len())?;

        let room_id = match requested {
            Some(id) if map.contains_key(&id) => {
                return Err(RelayError::RoomAlreadyExists(id));
            }
            Some(id) => id,
            None => loop {
                let candidate = RoomId::generate();
                if !map.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let room = Arc::new(Room::new(
            room_id.clone(),
            metadata,
            self.limits.max_room_members,
        ));
        map.insert(room_id.clone(), Arc::clone(&room));
        drop(map);

        tracing::info!(%room_id, "room created");
        Ok(room)
    }

    /// Returns the room registered under `room_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RoomNotFound`] if no such room exists.
    pub async fn get(&self, room_id: &RoomId) -> Result<Arc<Room>, RelayError> {
        let map = self.rooms.read().await;
        map.get(room_id)
            .cloned()
            .ok_or_else(|| RelayError::RoomNotFound(room_id.clone()))
    }

    /// Returns the room registered under `room_id`, creating an empty one on
    /// miss. Concurrent callers for the same id all observe the same room.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CapacityExceeded`] if a room must be created
    /// and the room cap is reached or the registry has been drained.
    pub async fn get_or_create(&self, room_id: &RoomId) -> Result<Arc<Room>, RelayError> {
        if let Some(room) = self.rooms.read().await.get(room_id) {
            return Ok(Arc::clone(room));
        }

        let mut map = self.rooms.write().await;
        if let Some(room) = map.get(room_id) {
            return Ok(Arc::clone(room));
        }
        self.ensure_open()?;
        self.check_room_capacity(map.len())?;
        let room = Arc::new(Room::new(
            room_id.clone(),
            RoomMetadata::default(),
            self.limits.max_room_members,
        ));
        map.insert(room_id.clone(), Arc::clone(&room));
        drop(map);

        tracing::info!(%room_id, "room created on join");
        Ok(room)
    }

    /// Returns summaries of all rooms, optionally filtered by group, oldest
    /// first.
    ///
    /// The set of rooms is fixed under the read lock; rooms created or
    /// removed afterwards are not reflected.
    pub async fn list(&self, group_filter: Option<&str>) -> Vec<RoomSummary> {
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            if let Some(group) = group_filter
                && room.metadata().group.as_deref() != Some(group)
            {
                continue;
            }
            summaries.push(room.summary().await);
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    /// Removes the room if it is empty. Returns `true` if it was removed;
    /// a room that has members (or is unknown) is left untouched.
    pub async fn remove(&self, room_id: &RoomId) -> bool {
        self.remove_if_idle(room_id, Duration::ZERO).await
    }

    /// Removes every room that has been empty for at least `grace`.
    /// Returns the number of rooms reaped.
    pub async fn sweep_idle(&self, grace: Duration) -> usize {
        let candidates: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();

        let mut reaped = 0;
        for room in candidates {
            let idle = room.idle_for().await;
            if idle.is_some_and(|idle| idle >= grace)
                && self.remove_if_idle(room.id(), grace).await
            {
                reaped += 1;
            }
        }
        if reaped > 0 {
            tracing::info!(reaped, "idle rooms reaped");
        }
        reaped
    }

    /// Empties and closes the registry, handing back every room so the
    /// caller can evict their members. Used at shutdown.
    pub async fn drain(&self) -> Vec<Arc<Room>> {
        let mut map = self.rooms.write().await;
        self.closed.store(true, Ordering::Release);
        map.drain().map(|(_, room)| room).collect()
    }

    /// Returns `true` once [`RoomRegistry::drain`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the number of rooms in the registry.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Returns `true` if the registry contains no rooms.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    fn ensure_open(&self) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::CapacityExceeded(
                "registry is closed".to_string(),
            ));
        }
        Ok(())
    }

    async fn remove_if_idle(&self, room_id: &RoomId, min_idle: Duration) -> bool {
        let mut map = self.rooms.write().await;
        let Some(room) = map.get(room_id).cloned() else {
            return false;
        };
        if !room.try_retire(min_idle).await {
            return false;
        }
        map.remove(room_id);
        drop(map);

        tracing::debug!(%room_id, "room removed");
        true
    }

    fn check_room_capacity(&self, current: usize) -> Result<(), RelayError> {
        if self.limits.max_rooms > 0 && current >= self.limits.max_rooms {
            return Err(RelayError::CapacityExceeded(format!(
                "room limit of {} reached",
                self.limits.max_rooms
            )));
        }
        Ok(())
    }
}
