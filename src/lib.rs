//! # spy-relay
//!
//! Room-based WebSocket relay for remote debugging sessions.
//!
//! A publisher (the debugged page) streams events into a room and every
//! observer (a debugger UI) joined to the same room receives them in order.
//! Rooms are created on demand or through the REST API and are reaped once
//! they have been empty for a grace period.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler + session loops (ws/)
//!     │
//!     ├── Relay facade + idle reaper (service/)
//!     │
//!     ├── RoomRegistry → Room → Connection → SendQueue (domain/)
//!     │
//!     └── LocalLogStorage (storage/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod storage;
pub mod ws;
