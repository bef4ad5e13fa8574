//! Storage layer: uploaded debugging log archives on the local filesystem.
//!
//! Independent of the relay core. Each upload is written under a fresh
//! UUID v4 file id, with a JSON sidecar holding its metadata.

pub mod local;
pub mod models;

pub use local::LocalLogStorage;
pub use models::{LogFileMeta, StoredLogFile};
