//! Relay facade: the entry point the routing layer calls for room
//! creation, listing and joining.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::domain::{
    Connection, QueueSettings, Role, Room, RoomId, RoomMetadata, RoomRegistry, RoomSummary,
};
use crate::error::RelayError;
use crate::ws::connection::{SessionSettings, reject, run_session};

/// How many times a join retries after losing a race with the reaper.
const MAX_JOIN_ATTEMPTS: usize = 3;

/// A connection that has been attached to a room and is ready for its
/// session loops.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Room the connection joined.
    pub room: Arc<Room>,
    /// The joined connection handle.
    pub connection: Arc<Connection>,
}

/// Coordinates the [`RoomRegistry`] and connection lifecycle.
///
/// Owns the idle reaper and the shutdown signal. Cloning is not needed:
/// handlers share it behind an `Arc` in [`crate::app_state::AppState`].
#[derive(Debug)]
pub struct Relay {
    registry: Arc<RoomRegistry>,
    auto_create: bool,
    idle_grace: Duration,
    sweep_interval: Duration,
    queue_settings: QueueSettings,
    session: SessionSettings,
    shutdown: CancellationToken,
}

impl Relay {
    /// Creates a relay over `registry` configured from `config`.
    #[must_use]
    pub fn new(registry: Arc<RoomRegistry>, config: &RelayConfig) -> Self {
        Self {
            registry,
            auto_create: config.room_auto_create,
            idle_grace: config.room_idle_grace,
            sweep_interval: config.room_sweep_interval,
            queue_settings: config.queue_settings(),
            session: SessionSettings::from(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns a reference to the inner [`RoomRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Returns summaries of all rooms, optionally filtered by group.
    pub async fn list_rooms(&self, group: Option<&str>) -> Vec<RoomSummary> {
        self.registry.list(group).await
    }

    /// Creates a room, under `requested` if given.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RoomAlreadyExists`] if `requested` collides with
    /// a live room, or [`RelayError::CapacityExceeded`] if the room cap is
    /// reached or the relay is shutting down.
    pub async fn create_room(
        &self,
        requested: Option<RoomId>,
        metadata: RoomMetadata,
    ) -> Result<RoomId, RelayError> {
        self.ensure_running()?;
        let room = self.registry.create_room(requested, metadata).await?;
        Ok(room.id().clone())
    }

    /// Resolves the target room and joins a fresh connection handle to it.
    ///
    /// With auto-create enabled an unknown id creates the room; otherwise it
    /// fails with [`RelayError::RoomNotFound`]. A room retired by the reaper
    /// between lookup and join is retried against the registry.
    ///
    /// # Errors
    ///
    /// Returns any join failure from [`Room::join`] or the registry.
    pub async fn admit(&self, room_id: &RoomId, role: Role) -> Result<Admission, RelayError> {
        self.ensure_running()?;
        for attempt in 1..=MAX_JOIN_ATTEMPTS {
            let room = if self.auto_create {
                self.registry.get_or_create(room_id).await?
            } else {
                self.registry.get(room_id).await?
            };
            let connection = Arc::new(Connection::new(
                room_id.clone(),
                role,
                self.queue_settings,
            ));
            match room.join(Arc::clone(&connection)).await {
                Ok(()) => return Ok(Admission { room, connection }),
                Err(RelayError::RoomRetired(_)) => {
                    tracing::debug!(%room_id, attempt, "room retired during join, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(RelayError::Internal(format!(
            "room {room_id} kept closing during join"
        )))
    }

    /// Joins an upgraded WebSocket to `room_id` and drives it until it
    /// closes. A failed join is reported to the client with a
    /// `join_rejected` control frame and a close frame carrying the error's
    /// close code.
    pub async fn join_room(&self, room_id: RoomId, role: Role, socket: WebSocket) {
        match self.admit(&room_id, role).await {
            Ok(admission) => run_session(socket, admission, self.session).await,
            Err(err) => {
                tracing::info!(%room_id, %role, error = %err, "join rejected");
                reject(socket, &room_id, &err, self.session.write_timeout).await;
            }
        }
    }

    /// Spawns the idle reaper. It sweeps the registry every
    /// `sweep_interval` until [`Relay::shutdown`] is called.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(relay.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = relay.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        relay.registry.sweep_idle(relay.idle_grace).await;
                    }
                }
            }
            tracing::debug!("room reaper stopped");
        })
    }

    /// Stops the reaper, drains the registry and evicts every member.
    /// Returns the number of evicted connections. Idempotent.
    ///
    /// The drained registry refuses new rooms, so an [`Relay::admit`] racing
    /// shutdown either joins a room that is then evicted or fails.
    pub async fn shutdown(&self) -> usize {
        self.shutdown.cancel();
        let rooms = self.registry.drain().await;
        let mut evicted = 0;
        for room in rooms {
            evicted += room.evict_all("relay shutting down").await;
        }
        tracing::info!(evicted, "relay shut down");
        evicted
    }

    /// Returns `true` once [`Relay::shutdown`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn ensure_running(&self) -> Result<(), RelayError> {
        if self.is_shutting_down() {
            return Err(RelayError::CapacityExceeded(
                "relay is shutting down".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionState, ControlEvent, Frame};

    fn id(raw: &str) -> RoomId {
        let Ok(id) = RoomId::parse(raw) else {
            panic!("valid id");
        };
        id
    }

    fn relay_with(config: &RelayConfig) -> Arc<Relay> {
        Arc::new(Relay::new(
            Arc::new(RoomRegistry::with_limits(config.registry_limits())),
            config,
        ))
    }

    fn relay() -> Arc<Relay> {
        relay_with(&RelayConfig::default())
    }

    #[tokio::test]
    async fn create_room_scenario() {
        let relay = relay();
        let Ok(room_id) = relay
            .create_room(Some(id("abc")), RoomMetadata::default())
            .await
        else {
            panic!("first create should succeed");
        };
        assert_eq!(room_id, id("abc"));

        let second = relay
            .create_room(Some(id("abc")), RoomMetadata::default())
            .await;
        assert!(matches!(second, Err(RelayError::RoomAlreadyExists(_))));
    }

    #[tokio::test]
    async fn create_without_id_synthesizes_one() {
        let relay = relay();
        let Ok(room_id) = relay.create_room(None, RoomMetadata::default()).await else {
            panic!("create should succeed");
        };
        assert_eq!(relay.list_rooms(None).await.len(), 1);
        assert!(relay.registry().get(&room_id).await.is_ok());
    }

    #[tokio::test]
    async fn admit_creates_room_on_demand() {
        let relay = relay();
        let Ok(admission) = relay.admit(&id("fresh"), Role::Observer).await else {
            panic!("admit should succeed");
        };
        assert_eq!(admission.room.id(), &id("fresh"));
        assert_eq!(admission.connection.state(), ConnectionState::Joined);
        assert!(!admission.room.has_publisher().await);
    }

    #[tokio::test]
    async fn admit_without_auto_create_requires_room() {
        let config = RelayConfig {
            room_auto_create: false,
            ..RelayConfig::default()
        };
        let relay = relay_with(&config);
        assert!(matches!(
            relay.admit(&id("missing"), Role::Observer).await,
            Err(RelayError::RoomNotFound(_))
        ));

        assert!(relay
            .create_room(Some(id("missing")), RoomMetadata::default())
            .await
            .is_ok());
        assert!(relay.admit(&id("missing"), Role::Observer).await.is_ok());
    }

    #[tokio::test]
    async fn second_publisher_rejected() {
        let relay = relay();
        let Ok(first) = relay.admit(&id("abc"), Role::Publisher).await else {
            panic!("first publisher should join");
        };
        assert!(matches!(
            relay.admit(&id("abc"), Role::Publisher).await,
            Err(RelayError::PublisherConflict(_))
        ));
        assert!(first.connection.is_joined());
        assert_eq!(first.room.member_count().await, 1);
    }

    #[tokio::test]
    async fn join_after_reap_lands_in_fresh_room() {
        let relay = relay();
        let Ok(stale) = relay.registry().get_or_create(&id("abc")).await else {
            panic!("create");
        };
        assert!(relay.registry().remove(&id("abc")).await);

        let Ok(admission) = relay.admit(&id("abc"), Role::Observer).await else {
            panic!("admit should succeed");
        };
        assert!(!Arc::ptr_eq(&stale, &admission.room));
        assert_eq!(relay.registry().len().await, 1);
    }

    #[tokio::test]
    async fn reaper_removes_idle_rooms() {
        let config = RelayConfig {
            room_idle_grace: Duration::from_millis(10),
            room_sweep_interval: Duration::from_millis(10),
            ..RelayConfig::default()
        };
        let relay = relay_with(&config);
        let Ok(admission) = relay.admit(&id("busy"), Role::Observer).await else {
            panic!("admit");
        };
        assert!(relay.create_room(Some(id("idle")), RoomMetadata::default()).await.is_ok());

        let reaper = relay.spawn_reaper();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(relay.registry().get(&id("idle")).await.is_err());
        assert!(relay.registry().get(&id("busy")).await.is_ok());

        admission.room.leave(admission.connection.id()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(relay.registry().is_empty().await);

        relay.shutdown().await;
        let Ok(Ok(())) = tokio::time::timeout(Duration::from_secs(1), reaper).await else {
            panic!("reaper should stop after shutdown");
        };
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn admit_racing_sweeper_lands_in_registered_room() {
        let relay = relay();
        let room_id = id("hot");
        let stop = CancellationToken::new();

        let sweeper = {
            let relay = Arc::clone(&relay);
            let stop = stop.clone();
            tokio::spawn(async move {
                while !stop.is_cancelled() {
                    relay.registry().sweep_idle(Duration::ZERO).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut admitted = 0;
        for _ in 0..500 {
            let admission = match relay.admit(&room_id, Role::Observer).await {
                Ok(admission) => admission,
                // every attempt lost to the sweeper
                Err(RelayError::Internal(_)) => continue,
                Err(err) => panic!("unexpected admit failure: {err}"),
            };
            admitted += 1;
            let Ok(registered) = relay.registry().get(&room_id).await else {
                panic!("admitted room must be registered");
            };
            assert!(Arc::ptr_eq(&registered, &admission.room));
            assert_eq!(registered.member_count().await, 1);
            assert!(!registered.is_retired().await);
            admission.room.leave(admission.connection.id()).await;
        }
        stop.cancel();

        let Ok(()) = sweeper.await else {
            panic!("sweeper task failed");
        };
        assert!(admitted > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn admit_racing_shutdown_never_escapes_eviction() {
        let relay = relay();
        let joins: Vec<_> = (0..64)
            .map(|n| {
                let relay = Arc::clone(&relay);
                let room_id = id(&format!("room-{n}"));
                tokio::spawn(async move { relay.admit(&room_id, Role::Observer).await })
            })
            .collect();
        tokio::task::yield_now().await;
        relay.shutdown().await;

        for join in joins {
            let Ok(result) = join.await else {
                panic!("admit task failed");
            };
            match result {
                Ok(admission) => {
                    assert!(admission.connection.cancel_token().is_cancelled());
                    assert!(admission.room.is_retired().await);
                }
                Err(err) => assert!(matches!(err, RelayError::CapacityExceeded(_)), "{err}"),
            }
        }
        assert!(relay.registry().is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_evicts_members_and_refuses_new_work() {
        let relay = relay();
        let Ok(admission) = relay.admit(&id("abc"), Role::Observer).await else {
            panic!("admit");
        };
        assert_eq!(relay.shutdown().await, 1);
        assert!(relay.registry().is_empty().await);
        assert!(admission.connection.cancel_token().is_cancelled());

        let events: Vec<_> = admission
            .connection
            .queue()
            .drain()
            .await
            .iter()
            .filter_map(Frame::control_event)
            .collect();
        assert!(matches!(
            events.last(),
            Some(ControlEvent::RoomClosed { .. })
        ));

        assert!(matches!(
            relay.admit(&id("abc"), Role::Observer).await,
            Err(RelayError::CapacityExceeded(_))
        ));
        assert!(relay.create_room(None, RoomMetadata::default()).await.is_err());
    }
}
