//! Shared harness: runs the full router on an ephemeral port.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use spy_relay::api;
use spy_relay::app_state::AppState;
use spy_relay::config::RelayConfig;
use spy_relay::domain::RoomRegistry;
use spy_relay::service::Relay;
use spy_relay::storage::LocalLogStorage;

/// Upper bound for any single await in integration tests.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A running relay server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub relay: Arc<Relay>,
    pub storage_root: std::path::PathBuf,
}

impl TestServer {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}/api/v1{path}", self.addr)
    }

    pub fn join_url(&self, room_id: &str, role: &str) -> String {
        format!(
            "ws://{}/api/v1/ws/room/join?room_id={room_id}&role={role}",
            self.addr
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.storage_root);
    }
}

pub async fn spawn_server(mut config: RelayConfig) -> TestServer {
    let storage_root =
        std::env::temp_dir().join(format!("spy-relay-it-{}", uuid::Uuid::new_v4()));
    config.log_storage_dir = storage_root.clone();

    let registry = Arc::new(RoomRegistry::with_limits(config.registry_limits()));
    let relay = Arc::new(Relay::new(registry, &config));
    let Ok(storage) = LocalLogStorage::open(&config.log_storage_dir).await else {
        panic!("storage should open");
    };
    let state = AppState {
        relay: Arc::clone(&relay),
        storage: Arc::new(storage),
    };
    let app = api::build_router(state, &config);

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        addr,
        relay,
        storage_root,
    }
}
