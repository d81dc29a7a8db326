//! Protocol constants shared by client and server.

use serde::{Deserialize, Serialize};

/// Maximum size of a single WebSocket message (16 MiB).
///
/// Large files never arrive in one frame: the client splits them into
/// chunks well below this limit, so anything bigger is a protocol error.
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Timestamp format for chat messages.
pub const MESSAGE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format for presence (join/leave) events.
pub const PRESENCE_TIME_FORMAT: &str = "%H:%M:%S";

/// Event types carried in the envelope `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Client -> server
    SendMessage,
    FileChunk,
    FileUploadComplete,

    // Server -> client
    History,
    MessageSent,
    NewMessage,
    FileChunkAck,
    UserStatus,
    OnlineCountUpdate,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventType::FileChunk).unwrap(),
            "\"file_chunk\""
        );
        assert_eq!(
            serde_json::to_string(&EventType::OnlineCountUpdate).unwrap(),
            "\"online_count_update\""
        );
        let parsed: EventType = serde_json::from_str("\"file_upload_complete\"").unwrap();
        assert_eq!(parsed, EventType::FileUploadComplete);
    }
}
