//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server starts with zero configuration
//! on a LAN host.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the WebSocket relay.
    /// Env: `WS_ADDR`
    /// Default: `0.0.0.0:8081`
    pub ws_addr: SocketAddr,

    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Path of the persisted chat history document.
    /// Env: `DATA_FILE`
    /// Default: `./chat_data.json`
    pub data_file: PathBuf,

    /// Directory for reassembled upload files.
    /// Env: `FILES_DIR`
    /// Default: `./uploaded_files`
    pub files_dir: PathBuf,

    /// Directory with the static client page, served at `/`.
    /// Env: `STATIC_DIR`
    /// Default: `./static`
    pub static_dir: PathBuf,

    /// How often the stale-transfer sweep runs.
    /// Env: `SWEEP_INTERVAL_SECS`
    /// Default: 300
    pub sweep_interval: Duration,

    /// Idle time after which an abandoned transfer is evicted.
    /// Env: `TRANSFER_MAX_IDLE_SECS` (0 disables the sweep)
    /// Default: 1800
    pub transfer_max_idle: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_addr: ([0, 0, 0, 0], 8081).into(),
            http_addr: ([0, 0, 0, 0], 8080).into(),
            data_file: PathBuf::from("./chat_data.json"),
            files_dir: PathBuf::from("./uploaded_files"),
            static_dir: PathBuf::from("./static"),
            sweep_interval: Duration::from_secs(300),
            transfer_max_idle: Duration::from_secs(1800),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = parse_env("WS_ADDR") {
            config.ws_addr = addr;
        }
        if let Some(addr) = parse_env("HTTP_ADDR") {
            config.http_addr = addr;
        }
        if let Ok(path) = std::env::var("DATA_FILE") {
            config.data_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("FILES_DIR") {
            config.files_dir = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("STATIC_DIR") {
            config.static_dir = PathBuf::from(path);
        }
        if let Some(secs) = parse_env::<u64>("SWEEP_INTERVAL_SECS") {
            config.sweep_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_env::<u64>("TRANSFER_MAX_IDLE_SECS") {
            config.transfer_max_idle = Duration::from_secs(secs);
        }

        config
    }

    /// True when the stale-transfer sweep should run.
    pub fn sweep_enabled(&self) -> bool {
        !self.transfer_max_idle.is_zero()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("ignoring unparsable {name}={value}");
            None
        }
    }
}
