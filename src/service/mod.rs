//! Service layer: the relay facade.
//!
//! [`Relay`] is what the HTTP and WebSocket handlers call. It resolves rooms
//! through the [`crate::domain::RoomRegistry`], admits connections, drives
//! their sessions and owns the idle reaper.

pub mod relay;

pub use relay::{Admission, Relay};
