//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::Relay;
use crate::storage::LocalLogStorage;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Relay facade for rooms and connections.
    pub relay: Arc<Relay>,
    /// Uploaded log file storage.
    pub storage: Arc<LocalLogStorage>,
}
