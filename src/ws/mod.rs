//! WebSocket layer: upgrade handling, session loops and message framing.
//!
//! The endpoint at `/api/v1/ws/room/join` joins one socket to one room as
//! either the publisher or an observer.

pub mod connection;
pub mod handler;
pub mod messages;
