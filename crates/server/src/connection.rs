//! Per-client connection plumbing: the outbound sender handle, the write
//! pump, and the read loop that dispatches parsed events to the handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use lanchat_protocol::constants::WS_MAX_MESSAGE_SIZE;
use lanchat_protocol::envelope::Event;
use lanchat_protocol::EventType;

use crate::handler::Handler;
use crate::SEND_BUFFER_SIZE;

/// Error returned when an event cannot be queued for sending.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,

    #[error("send buffer full")]
    BufferFull,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle for sending events to one client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Sender {
    tx: mpsc::Sender<tungstenite::Message>,
    connected: Arc<AtomicBool>,
}

impl Sender {
    /// Serializes and queues an event. Never blocks: a full buffer or a
    /// closed connection is an error the caller may log and skip.
    pub fn send_event(&self, event: &Event) -> Result<(), SendError> {
        let json = serde_json::to_string(event)?;
        self.tx
            .try_send(tungstenite::Message::Text(json.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SendError::BufferFull,
                mpsc::error::TrySendError::Closed(_) => SendError::Closed,
            })
    }

    /// True while the connection's pumps are alive.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed) && !self.tx.is_closed()
    }
}

/// One connected client, as seen by handlers. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: Uuid,
    /// Peer address, used as the client's chat identity.
    pub ip: String,
    pub sender: Sender,
}

/// Runs both pumps of an accepted WebSocket until the peer disconnects or
/// the server shuts down. Events from one client dispatch sequentially, so
/// chunk arrivals of a single sender are naturally serialized.
pub(crate) async fn run_connection<S, H>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    client: Client,
    rx: mpsc::Receiver<tungstenite::Message>,
    handler: Arc<H>,
    cancel: CancellationToken,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    H: Handler,
{
    let (write, mut read) = ws_stream.split();

    let write_cancel = cancel.child_token();
    let write_task = tokio::spawn(write_pump(write, rx, write_cancel.clone()));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        dispatch_text(&text, &client, &handler).await;
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        trace!("received ping, sending pong");
                        let _ = client
                            .sender
                            .tx
                            .try_send(tungstenite::Message::Pong(data));
                    }
                    Some(Ok(tungstenite::Message::Pong(_))) => {
                        trace!("received pong");
                    }
                    Some(Ok(tungstenite::Message::Close(_))) => {
                        debug!(ip = %client.ip, "received close frame");
                        break;
                    }
                    Some(Ok(_)) => {
                        warn!(ip = %client.ip, "ignoring binary frame");
                    }
                    Some(Err(e)) => {
                        warn!(ip = %client.ip, "WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!(ip = %client.ip, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    client.sender.connected.store(false, Ordering::Relaxed);
    write_cancel.cancel();
    let _ = write_task.await;
}

/// Parses a text frame and routes it to the handler by event type.
async fn dispatch_text<H: Handler>(text: &str, client: &Client, handler: &Arc<H>) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!(ip = %client.ip, "message too large ({} bytes), dropping", text.len());
        return;
    }

    let event: Event = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            warn!(ip = %client.ip, "failed to parse event: {e}");
            return;
        }
    };

    trace!(ip = %client.ip, event_type = ?event.event_type, "received event");

    match event.event_type {
        EventType::SendMessage => handler.on_send_message(client.clone(), event).await,
        EventType::FileChunk => handler.on_file_chunk(client.clone(), event).await,
        EventType::FileUploadComplete => {
            handler.on_file_upload_complete(client.clone(), event).await
        }
        ref other => {
            warn!(ip = %client.ip, event_type = ?other, "unexpected event from client");
        }
    }
}

/// Writes queued messages to the WebSocket.
async fn write_pump<S>(
    mut write: S,
    mut rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            debug!("WebSocket write error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
}

/// Creates a sender handle plus the receiving half for the write pump.
pub(crate) fn sender_pair() -> (Sender, mpsc::Receiver<tungstenite::Message>) {
    let (tx, rx) = mpsc::channel(SEND_BUFFER_SIZE);
    let sender = Sender {
        tx,
        connected: Arc::new(AtomicBool::new(true)),
    };
    (sender, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_reports_connected_until_closed() {
        let (sender, rx) = sender_pair();
        assert!(sender.is_connected());
        drop(rx);
        assert!(!sender.is_connected());
    }

    #[test]
    fn send_event_queues_text_frame() {
        let (sender, mut rx) = sender_pair();
        let event = Event::new::<()>(EventType::MessageSent, None).unwrap();
        sender.send_event(&event).unwrap();

        let queued = rx.try_recv().unwrap();
        match queued {
            tungstenite::Message::Text(text) => {
                assert!(text.as_str().contains("message_sent"));
            }
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn send_event_fails_when_closed() {
        let (sender, rx) = sender_pair();
        drop(rx);
        let event = Event::new::<()>(EventType::MessageSent, None).unwrap();
        assert!(matches!(
            sender.send_event(&event),
            Err(SendError::Closed)
        ));
    }
}
