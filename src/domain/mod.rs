//! Domain layer: room identity, wire frames, connections, rooms and the
//! room registry.
//!
//! This module contains the in-memory relay model. Nothing here touches a
//! socket: connections are represented by transport-free handles whose
//! outbound queues are drained by the WebSocket session in `crate::ws`.

pub mod connection;
pub mod frame;
pub mod room;
pub mod room_id;
pub mod room_registry;
pub mod send_queue;

pub use connection::{Connection, ConnectionId, ConnectionState, QueueSettings};
pub use frame::{ControlEvent, Frame, FrameKind, Role};
pub use room::{Room, RoomMetadata, RoomSummary};
pub use room_id::RoomId;
pub use room_registry::{RegistryLimits, RoomRegistry};
pub use send_queue::{OverflowPolicy, PushOutcome, SendQueue};
