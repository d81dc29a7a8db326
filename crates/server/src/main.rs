//! LanChat relay server binary.
//!
//! Wires the process-scoped state (history, file store, chunk store,
//! connection registry) into the WebSocket relay and the HTTP API, and
//! runs the stale-transfer sweep.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lanchat_server::config::ServerConfig;
use lanchat_server::http::{self, AppState};
use lanchat_server::{Registry, RelayHandler, RelayServer, ServerError};
use lanchat_store::{FileStore, HistoryStore};
use lanchat_transfer::ChunkStore;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lanchat_server=debug")),
        )
        .init();

    info!("starting LanChat relay server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "loaded configuration");

    // Process-scoped state, torn down with the process. In-progress
    // transfers do not survive a restart; history and stored files do.
    let history = Arc::new(HistoryStore::load(config.data_file.clone()).await);
    let files = Arc::new(FileStore::new(config.files_dir.clone()).await?);
    let chunks = Arc::new(ChunkStore::new());
    let registry = Arc::new(Registry::new());

    let handler = Arc::new(RelayHandler::new(
        Arc::clone(&registry),
        Arc::clone(&chunks),
        Arc::clone(&history),
        Arc::clone(&files),
    ));

    // Periodic eviction of abandoned transfers.
    if config.sweep_enabled() {
        let chunks = Arc::clone(&chunks);
        let max_idle = config.transfer_max_idle;
        let mut interval = tokio::time::interval(config.sweep_interval);
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                let evicted = chunks.evict_stale(max_idle);
                if !evicted.is_empty() {
                    info!(count = evicted.len(), "evicted stale transfers");
                }
            }
        });
    } else {
        warn!("stale-transfer sweep disabled; abandoned uploads are kept until restart");
    }

    // HTTP API: history, file downloads, static client page.
    let static_dir = config.static_dir.is_dir().then(|| config.static_dir.clone());
    if static_dir.is_none() {
        warn!(path = %config.static_dir.display(), "static dir not found, serving API only");
    }
    let router = http::build_router(
        AppState {
            history: Arc::clone(&history),
            files: Arc::clone(&files),
        },
        static_dir,
    );
    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    let http_addr = http_listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(
            http_listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        {
            tracing::error!("HTTP server error: {e}");
        }
    });

    log_reachable_urls(http_addr, config.ws_addr);

    let server = RelayServer::new(config.ws_addr, handler, registry);
    server.run().await
}

/// Logs the local and LAN URLs clients can reach the server on.
fn log_reachable_urls(http_addr: SocketAddr, ws_addr: SocketAddr) {
    info!("local access: http://localhost:{}", http_addr.port());
    info!("websocket:    ws://localhost:{}", ws_addr.port());

    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            for iface in interfaces {
                let ip = iface.ip();
                if iface.is_loopback() || !ip.is_ipv4() {
                    continue;
                }
                info!("LAN access:   http://{ip}:{}", http_addr.port());
            }
        }
        Err(e) => warn!("failed to enumerate interfaces: {e}"),
    }
}
