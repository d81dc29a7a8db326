//! Domain logic of the chat relay: presence, message fan-out, and the
//! transfer session protocol built on the chunk store.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use lanchat_protocol::constants::{MESSAGE_TIME_FORMAT, PRESENCE_TIME_FORMAT};
use lanchat_protocol::envelope::Event;
use lanchat_protocol::messages::{
    FileChunkAck, FileChunkRequest, FileUploadCompleteRequest, HistoryPayload, MessageSent,
    OnlineCountUpdate, PresenceKind, SendMessageRequest, UserStatusEvent,
};
use lanchat_protocol::types::{ChatMessage, FileMeta, MessageKind};
use lanchat_protocol::{codec, EventType};
use lanchat_store::{FileStore, HistoryStore};
use lanchat_transfer::{reassemble, ChunkStore, TransferError};

use crate::connection::Client;
use crate::handler::{Handler, HandlerFuture};
use crate::registry::Registry;

/// The relay's [`Handler`] implementation, holding all process-scoped state.
pub struct RelayHandler {
    registry: Arc<Registry>,
    chunks: Arc<ChunkStore>,
    history: Arc<HistoryStore>,
    files: Arc<FileStore>,
}

impl RelayHandler {
    pub fn new(
        registry: Arc<Registry>,
        chunks: Arc<ChunkStore>,
        history: Arc<HistoryStore>,
        files: Arc<FileStore>,
    ) -> Self {
        Self {
            registry,
            chunks,
            history,
            files,
        }
    }

    /// Serializes and sends an event to one client; failures are logged and
    /// skipped (the client may be mid-disconnect).
    fn send_to<T: Serialize>(client: &Client, event_type: EventType, payload: &T) {
        match Event::new(event_type, Some(payload)) {
            Ok(event) => {
                if let Err(e) = client.sender.send_event(&event) {
                    debug!(ip = %client.ip, "failed to send event: {e}");
                }
            }
            Err(e) => warn!("failed to serialize event: {e}"),
        }
    }

    fn send_error_to(client: &Client, code: i32, message: String) {
        let event = Event::error(code, message);
        if let Err(e) = client.sender.send_event(&event) {
            debug!(ip = %client.ip, "failed to send error event: {e}");
        }
    }

    fn broadcast<T: Serialize>(&self, event_type: EventType, payload: &T) {
        match Event::new(event_type, Some(payload)) {
            Ok(event) => self.registry.broadcast(&event),
            Err(e) => warn!("failed to serialize broadcast: {e}"),
        }
    }

    fn broadcast_except<T: Serialize>(&self, client: &Client, event_type: EventType, payload: &T) {
        match Event::new(event_type, Some(payload)) {
            Ok(event) => self.registry.broadcast_except(client.id, &event),
            Err(e) => warn!("failed to serialize broadcast: {e}"),
        }
    }

    /// Resolves an inline (non-chunked) file attachment: decode, persist,
    /// return the metadata for the history entry.
    async fn save_inline_file(
        &self,
        file: &lanchat_protocol::messages::InlineFile,
    ) -> Result<FileMeta, String> {
        let bytes = codec::decode(codec::strip_data_url(&file.data))
            .map_err(|e| format!("failed to decode file data: {e}"))?;

        let stored = self
            .files
            .save(&file.name, &bytes)
            .await
            .map_err(|e| format!("failed to store file: {e}"))?;

        Ok(FileMeta {
            name: file.name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            download_url: format!("/files/{}", stored.stored_name),
            filename: stored.stored_name,
        })
    }

    async fn handle_send_message(&self, client: Client, request: SendMessageRequest) {
        let mut message = ChatMessage {
            ip: client.ip.clone(),
            message: request.message,
            timestamp: message_timestamp(),
            kind: request.kind,
            image_data: None,
            file_data: None,
        };

        if message.kind == MessageKind::Image {
            message.image_data = request.image_data;
        }

        if let Some(file) = &request.file_data {
            match self.save_inline_file(file).await {
                Ok(meta) => message.file_data = Some(meta),
                Err(e) => {
                    warn!(ip = %client.ip, name = %file.name, "inline file rejected: {e}");
                    Self::send_error_to(&client, 500, e);
                    return; // no history entry, no broadcast
                }
            }
        }

        self.history.append(message.clone()).await;

        Self::send_to(
            &client,
            EventType::MessageSent,
            &MessageSent {
                ip: client.ip.clone(),
            },
        );
        self.broadcast(EventType::NewMessage, &message);

        debug!(ip = %client.ip, kind = ?message.kind, "relayed message");
    }

    async fn handle_file_chunk(&self, client: Client, request: FileChunkRequest) {
        match self.chunks.put_chunk(&request) {
            Ok(progress) => {
                Self::send_to(
                    &client,
                    EventType::FileChunkAck,
                    &FileChunkAck::ok(request.chunk_index),
                );

                if progress.received % 10 == 0 || progress.is_complete() {
                    info!(
                        file = %request.file_name,
                        received = progress.received,
                        total = progress.total,
                        "transfer progress"
                    );
                }
            }
            Err(e) => {
                warn!(ip = %client.ip, transfer_id = %request.file_id, "chunk rejected: {e}");
                Self::send_to(
                    &client,
                    EventType::FileChunkAck,
                    &FileChunkAck::failed(e.to_string()),
                );
            }
        }
    }

    async fn handle_upload_complete(&self, client: Client, request: FileUploadCompleteRequest) {
        let transfer = match self.chunks.take_for_reassembly(&request.file_id) {
            Ok(transfer) => transfer,
            Err(TransferError::NotFound(id)) => {
                // Duplicate or late signal — nothing to do.
                info!(transfer_id = %id, "completion signal for unknown transfer, ignoring");
                return;
            }
            Err(TransferError::Incomplete { id, received, total }) => {
                info!(
                    transfer_id = %id,
                    received,
                    total,
                    "completion signal before all chunks arrived, ignoring"
                );
                return;
            }
            Err(e) => {
                warn!(transfer_id = %request.file_id, "completion signal rejected: {e}");
                return;
            }
        };

        info!(
            file = %transfer.meta.file_name,
            chunks = transfer.meta.total_chunks,
            declared_size = transfer.meta.file_size,
            "reassembling transfer"
        );

        let reassembled = match reassemble(&transfer) {
            Ok(r) => r,
            Err(e) => {
                warn!(transfer_id = %transfer.id, "reassembly failed: {e}");
                Self::send_error_to(&client, 500, format!("file reassembly failed: {e}"));
                return; // no history entry, no broadcast
            }
        };
        if reassembled.size_mismatch {
            warn!(
                file = %transfer.meta.file_name,
                declared = transfer.meta.file_size,
                actual = reassembled.bytes.len(),
                "stored file despite size mismatch"
            );
        }

        let stored = match self.files.save(&transfer.meta.file_name, &reassembled.bytes).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(file = %transfer.meta.file_name, "failed to store upload: {e}");
                Self::send_error_to(&client, 500, format!("failed to store file: {e}"));
                return;
            }
        };

        let message = ChatMessage {
            ip: client.ip.clone(),
            message: request.message,
            timestamp: message_timestamp(),
            kind: MessageKind::File,
            image_data: None,
            file_data: Some(FileMeta {
                name: transfer.meta.file_name.clone(),
                size: transfer.meta.file_size,
                mime_type: transfer.meta.mime_type.clone(),
                download_url: format!("/files/{}", stored.stored_name),
                filename: stored.stored_name.clone(),
            }),
        };

        self.history.append(message.clone()).await;

        Self::send_to(
            &client,
            EventType::MessageSent,
            &MessageSent {
                ip: client.ip.clone(),
            },
        );
        self.broadcast(EventType::NewMessage, &message);

        info!(
            file = %transfer.meta.file_name,
            stored = %stored.stored_name,
            "upload complete"
        );
    }
}

impl Handler for RelayHandler {
    fn on_connect(&self, client: Client) -> HandlerFuture<'_> {
        Box::pin(async move {
            let count = self.registry.online_count();
            info!(ip = %client.ip, online = count, "client connected");

            Self::send_to(
                &client,
                EventType::History,
                &HistoryPayload {
                    messages: self.history.global(),
                },
            );
            Self::send_to(
                &client,
                EventType::OnlineCountUpdate,
                &OnlineCountUpdate { count },
            );

            self.broadcast_except(
                &client,
                EventType::UserStatus,
                &UserStatusEvent {
                    kind: PresenceKind::Join,
                    ip: client.ip.clone(),
                    timestamp: presence_timestamp(),
                    online_count: count,
                },
            );
        })
    }

    fn on_disconnect(&self, client: Client) -> HandlerFuture<'_> {
        Box::pin(async move {
            let count = self.registry.online_count();
            info!(ip = %client.ip, online = count, "client disconnected");

            self.broadcast(
                EventType::UserStatus,
                &UserStatusEvent {
                    kind: PresenceKind::Leave,
                    ip: client.ip.clone(),
                    timestamp: presence_timestamp(),
                    online_count: count,
                },
            );
            self.broadcast(EventType::OnlineCountUpdate, &OnlineCountUpdate { count });
        })
    }

    fn on_send_message(&self, client: Client, event: Event) -> HandlerFuture<'_> {
        Box::pin(async move {
            match event.parse_payload::<SendMessageRequest>() {
                Ok(Some(request)) => self.handle_send_message(client, request).await,
                Ok(None) => warn!(ip = %client.ip, "send_message without payload"),
                Err(e) => warn!(ip = %client.ip, "malformed send_message payload: {e}"),
            }
        })
    }

    fn on_file_chunk(&self, client: Client, event: Event) -> HandlerFuture<'_> {
        Box::pin(async move {
            match event.parse_payload::<FileChunkRequest>() {
                Ok(Some(request)) => self.handle_file_chunk(client, request).await,
                Ok(None) | Err(_) => {
                    Self::send_to(
                        &client,
                        EventType::FileChunkAck,
                        &FileChunkAck::failed("malformed file_chunk payload"),
                    );
                }
            }
        })
    }

    fn on_file_upload_complete(&self, client: Client, event: Event) -> HandlerFuture<'_> {
        Box::pin(async move {
            match event.parse_payload::<FileUploadCompleteRequest>() {
                Ok(Some(request)) => self.handle_upload_complete(client, request).await,
                Ok(None) => warn!(ip = %client.ip, "file_upload_complete without payload"),
                Err(e) => {
                    warn!(ip = %client.ip, "malformed file_upload_complete payload: {e}")
                }
            }
        })
    }
}

fn message_timestamp() -> String {
    chrono::Local::now().format(MESSAGE_TIME_FORMAT).to_string()
}

fn presence_timestamp() -> String {
    chrono::Local::now().format(PRESENCE_TIME_FORMAT).to_string()
}
