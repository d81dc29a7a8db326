use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, MessageKind};

// ---------------------------------------------------------------------------
// Client -> server payloads
// ---------------------------------------------------------------------------

/// One chunk of an in-progress file transfer.
///
/// `data` stays text-encoded on the wire and in the chunk store: chunks are
/// decoded independently at reassembly time, never concatenated as text.
/// The first chunk may carry a `data:<mime>;base64,` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChunkRequest {
    pub file_id: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub data: String,
}

/// Explicit completion signal: no more chunks will be sent for `file_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadCompleteRequest {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// A small inline file sent through `send_message` (non-chunked path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFile {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub data: String,
}

/// A text, image, or small-file message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<InlineFile>,
}

// ---------------------------------------------------------------------------
// Server -> client payloads
// ---------------------------------------------------------------------------

/// Per-chunk acknowledgment, sent to the uploading client only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChunkAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileChunkAck {
    /// Acknowledges successful receipt of a chunk.
    pub fn ok(chunk_index: u32) -> Self {
        Self {
            success: true,
            chunk_index: Some(chunk_index),
            error: None,
        }
    }

    /// Rejects a chunk with an error description.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            chunk_index: None,
            error: Some(error.into()),
        }
    }
}

/// Global history, sent once to each newly connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPayload {
    pub messages: Vec<ChatMessage>,
}

/// Confirms to the sender that their message was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSent {
    pub ip: String,
}

/// Whether a presence event is a join or a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceKind {
    Join,
    Leave,
}

/// Broadcast to other clients when someone connects or disconnects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatusEvent {
    #[serde(rename = "type")]
    pub kind: PresenceKind,
    pub ip: String,
    pub timestamp: String,
    pub online_count: usize,
}

/// Current number of connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineCountUpdate {
    pub count: usize,
}
