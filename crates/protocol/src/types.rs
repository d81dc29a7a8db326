use serde::{Deserialize, Serialize};

/// What kind of content a chat message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "file")]
    File,
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Text
    }
}

/// Metadata for a file attached to a chat message.
///
/// Only metadata is kept in history; the bytes live on disk under
/// `filename` and are fetched through `download_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Original filename as supplied by the sender.
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
    /// MIME type as supplied by the sender.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Server-side stored name (uuid + original extension).
    pub filename: String,
    /// Download path for the stored file.
    pub download_url: String,
}

/// A unit of conversation history. Append-only and immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender address.
    pub ip: String,
    /// Text body (may be empty for image/file messages).
    #[serde(default)]
    pub message: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileMeta>,
}

impl ChatMessage {
    /// Creates a plain text message.
    pub fn text(ip: impl Into<String>, body: impl Into<String>, timestamp: String) -> Self {
        Self {
            ip: ip.into(),
            message: body.into(),
            timestamp,
            kind: MessageKind::Text,
            image_data: None,
            file_data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_wire_names() {
        assert_eq!(serde_json::to_string(&MessageKind::File).unwrap(), "\"file\"");
        let parsed: MessageKind = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(parsed, MessageKind::Image);
    }

    #[test]
    fn chat_message_omits_empty_attachments() {
        let msg = ChatMessage::text("192.168.1.10", "hello", "2025-06-01 12:00:00".into());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("image_data"));
        assert!(!json.contains("file_data"));
        assert!(json.contains("\"type\":\"text\""));
    }

    #[test]
    fn chat_message_file_roundtrip() {
        let msg = ChatMessage {
            ip: "10.0.0.2".into(),
            message: String::new(),
            timestamp: "2025-06-01 12:00:00".into(),
            kind: MessageKind::File,
            image_data: None,
            file_data: Some(FileMeta {
                name: "report.pdf".into(),
                size: 1024,
                mime_type: "application/pdf".into(),
                filename: "c0ffee.pdf".into(),
                download_url: "/files/c0ffee.pdf".into(),
            }),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"download_url\":\"/files/c0ffee.pdf\""));
        let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, parsed);
    }

    #[test]
    fn chat_message_missing_body_defaults_empty() {
        let json = r#"{"ip":"10.0.0.2","timestamp":"2025-06-01 12:00:00","type":"image","image_data":"data:image/png;base64,AAAA"}"#;
        let parsed: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.message, "");
        assert_eq!(parsed.kind, MessageKind::Image);
        assert!(parsed.image_data.is_some());
    }
}
