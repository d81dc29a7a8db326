//! WebSocket chat relay server for LanChat.
//!
//! Clients hold one persistent WebSocket each; every frame is a JSON event
//! envelope. The server fans text/image messages out to all connected
//! clients, accumulates `file_chunk` events per transfer, and turns a
//! completed transfer into a stored file plus a broadcast `file` message.
//! A small axum app serves history and file downloads over HTTP.

pub mod config;
pub mod connection;
pub mod handler;
pub mod http;
pub mod registry;
pub mod relay;
pub mod server;

pub use connection::{Client, Sender};
pub use handler::{Handler, HandlerFuture};
pub use registry::Registry;
pub use relay::RelayHandler;
pub use server::RelayServer;

/// Send buffer capacity per client connection.
///
/// During file transfers the server queues one ack per chunk on top of any
/// concurrent broadcasts. A small buffer can saturate and cause `try_send()`
/// to silently drop messages. 2048 gives comfortable headroom.
pub const SEND_BUFFER_SIZE: usize = 2048;

/// Errors produced by the relay server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] lanchat_store::StoreError),
}
