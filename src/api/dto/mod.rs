//! Data Transfer Objects for REST request/response serialization.
//!
//! Successful responses are wrapped in [`ApiResponse`].

pub mod common_dto;
pub mod room_dto;

pub use common_dto::*;
pub use room_dto::*;
