//! WebSocket relay server.
//!
//! Listens on a TCP port, upgrades each connection to WebSocket, and runs
//! one connection task per client. Lifecycle and routing live here; domain
//! logic stays behind the [`Handler`] trait.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::accept_async_with_config;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use lanchat_protocol::constants::WS_MAX_MESSAGE_SIZE;

use crate::connection::{self, Client};
use crate::handler::Handler;
use crate::registry::Registry;
use crate::ServerError;

/// The relay WebSocket server.
pub struct RelayServer<H: Handler> {
    addr: SocketAddr,
    handler: Arc<H>,
    registry: Arc<Registry>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl<H: Handler> RelayServer<H> {
    /// Creates a new server dispatching to `handler`.
    ///
    /// The registry is shared with the handler so broadcasts and presence
    /// counts observe the same connection set the server maintains.
    pub fn new(addr: SocketAddr, handler: Arc<H>, registry: Arc<Registry>) -> Arc<Self> {
        Arc::new(Self {
            addr,
            handler,
            registry,
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Gracefully shuts down the server and all connections.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until cancellation.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!("relay server listening on {local_addr}");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::error!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Upgrades one TCP connection and runs it until the client leaves.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        // WebSocket upgrade with size limits matching our protocol constants.
        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let ws_stream = accept_async_with_config(stream, Some(ws_config)).await?;
        tracing::debug!(%peer_addr, "WebSocket connection established");

        let (sender, rx) = connection::sender_pair();
        let client = Client {
            id: Uuid::new_v4(),
            ip: peer_addr.ip().to_string(),
            sender,
        };

        self.registry.insert(client.clone());
        self.handler.on_connect(client.clone()).await;

        connection::run_connection(
            ws_stream,
            client.clone(),
            rx,
            Arc::clone(&self.handler),
            self.cancel.clone(),
        )
        .await;

        self.registry.remove(client.id);
        self.handler.on_disconnect(client).await;

        Ok(())
    }
}
