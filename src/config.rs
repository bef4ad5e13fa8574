//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Zero-valued limits mean "unlimited".

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{OverflowPolicy, QueueSettings, RegistryLimits};

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:6752`).
    pub listen_addr: SocketAddr,

    /// Tracing output format.
    pub log_format: LogFormat,

    /// Whether joining an unknown room id creates it.
    pub room_auto_create: bool,

    /// How long a room must stay empty before the reaper removes it.
    pub room_idle_grace: Duration,

    /// Interval between idle sweeps.
    pub room_sweep_interval: Duration,

    /// Maximum number of rooms (0 = unlimited).
    pub max_rooms: usize,

    /// Maximum members per room (0 = unlimited).
    pub max_room_members: usize,

    /// Per-connection outbound queue capacity.
    pub queue_capacity: usize,

    /// Policy applied when an outbound queue is full.
    pub overflow_policy: OverflowPolicy,

    /// A connection that sends nothing (not even a pong) for this long is
    /// closed.
    pub read_timeout: Duration,

    /// Deadline for writing one frame to a transport.
    pub write_timeout: Duration,

    /// Interval between keep-alive pings.
    pub ping_interval: Duration,

    /// Directory holding uploaded log archives.
    pub log_storage_dir: PathBuf,

    /// Maximum accepted upload size in bytes.
    pub log_upload_max_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 6752)),
            log_format: LogFormat::Text,
            room_auto_create: true,
            room_idle_grace: Duration::from_secs(60),
            room_sweep_interval: Duration::from_secs(15),
            max_rooms: 0,
            max_room_members: 0,
            queue_capacity: 256,
            overflow_policy: OverflowPolicy::DropOldest,
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(20),
            log_storage_dir: PathBuf::from("./data/logs"),
            log_upload_max_bytes: 50 * 1024 * 1024,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to the [`Default`] values when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as a
    /// [`SocketAddr`], or if `CONNECTION_OVERFLOW_POLICY` names an unknown
    /// policy.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr: SocketAddr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let overflow_policy = match std::env::var("CONNECTION_OVERFLOW_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.overflow_policy,
        };

        let log_storage_dir = std::env::var("LOG_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_storage_dir);

        Ok(Self {
            listen_addr,
            log_format,
            room_auto_create: parse_env_bool("ROOM_AUTO_CREATE", defaults.room_auto_create),
            room_idle_grace: parse_env_secs("ROOM_IDLE_GRACE_SECS", defaults.room_idle_grace),
            room_sweep_interval: parse_env_secs(
                "ROOM_SWEEP_INTERVAL_SECS",
                defaults.room_sweep_interval,
            ),
            max_rooms: parse_env("MAX_ROOMS", defaults.max_rooms),
            max_room_members: parse_env("MAX_ROOM_MEMBERS", defaults.max_room_members),
            queue_capacity: parse_env("CONNECTION_QUEUE_CAPACITY", defaults.queue_capacity),
            overflow_policy,
            read_timeout: parse_env_secs("CONNECTION_READ_TIMEOUT_SECS", defaults.read_timeout),
            write_timeout: parse_env_secs(
                "CONNECTION_WRITE_TIMEOUT_SECS",
                defaults.write_timeout,
            ),
            ping_interval: parse_env_secs(
                "CONNECTION_PING_INTERVAL_SECS",
                defaults.ping_interval,
            ),
            log_storage_dir,
            log_upload_max_bytes: parse_env(
                "LOG_UPLOAD_MAX_BYTES",
                defaults.log_upload_max_bytes,
            ),
        })
    }

    /// Registry limits derived from this configuration.
    #[must_use]
    pub const fn registry_limits(&self) -> RegistryLimits {
        RegistryLimits {
            max_rooms: self.max_rooms,
            max_room_members: self.max_room_members,
        }
    }

    /// Queue settings applied to every new connection.
    #[must_use]
    pub const fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            capacity: self.queue_capacity,
            policy: self.overflow_policy,
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable holding whole seconds. Zero is rejected
/// in favour of `default` so intervals never spin.
fn parse_env_secs(key: &str, default: Duration) -> Duration {
    match parse_env::<u64>(key, 0) {
        0 => default,
        secs => Duration::from_secs(secs),
    }
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}
