//! Handler trait for processing client events.
//!
//! Implementors provide domain logic (chat fan-out, transfers, presence)
//! while the server framework handles sockets, routing, and lifecycle.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use lanchat_protocol::envelope::Event;

use crate::connection::Client;

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Trait for handling events from connected clients.
///
/// The server dispatches parsed envelopes to the matching method. Each
/// method receives the originating [`Client`] (identity plus a sender for
/// replies); broadcasts go through whatever registry the implementor holds.
pub trait Handler: Send + Sync + 'static {
    /// Called after a client's connection is registered.
    fn on_connect(&self, client: Client) -> HandlerFuture<'_> {
        let _ = client;
        Box::pin(async {})
    }

    /// Called after a client's connection is removed (cleanup hook).
    fn on_disconnect(&self, client: Client) -> HandlerFuture<'_> {
        let _ = client;
        Box::pin(async {})
    }

    /// Called for `send_message` (text, image, or inline small file).
    fn on_send_message(&self, client: Client, event: Event) -> HandlerFuture<'_> {
        let _ = event;
        Box::pin(async move {
            warn!(ip = %client.ip, "send_message not handled");
        })
    }

    /// Called for each `file_chunk` of an in-progress transfer.
    fn on_file_chunk(&self, client: Client, event: Event) -> HandlerFuture<'_> {
        let _ = event;
        Box::pin(async move {
            warn!(ip = %client.ip, "file_chunk not handled");
        })
    }

    /// Called for the explicit `file_upload_complete` signal.
    fn on_file_upload_complete(&self, client: Client, event: Event) -> HandlerFuture<'_> {
        let _ = event;
        Box::pin(async move {
            warn!(ip = %client.ip, "file_upload_complete not handled");
        })
    }
}
