use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use lanchat_protocol::types::{ChatMessage, FileMeta};

use crate::StoreError;

/// Persisted document layout: per-sender logs plus the global ordered log.
/// Rewritten in full on every mutation.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryData {
    #[serde(default)]
    chat_history: HashMap<String, Vec<ChatMessage>>,
    #[serde(default)]
    global_messages: Vec<ChatMessage>,
}

/// Append-only chat history backed by a single JSON file.
///
/// Appends serialize behind one lock; persistence failures degrade to
/// "not persisted but still broadcast" (logged, not propagated).
pub struct HistoryStore {
    data: RwLock<HistoryData>,
    path: PathBuf,
}

impl HistoryStore {
    /// Loads history from `path`. A missing file starts empty; an unreadable
    /// or corrupt file is logged and also starts empty.
    pub async fn load(path: PathBuf) -> Self {
        let data = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HistoryData>(&bytes) {
                Ok(data) => {
                    info!(
                        senders = data.chat_history.len(),
                        messages = data.global_messages.len(),
                        "loaded chat history"
                    );
                    data
                }
                Err(e) => {
                    warn!(path = %path.display(), "corrupt history file, starting empty: {e}");
                    HistoryData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no history file yet, starting empty");
                HistoryData::default()
            }
            Err(e) => {
                warn!(path = %path.display(), "failed to read history, starting empty: {e}");
                HistoryData::default()
            }
        };

        Self {
            data: RwLock::new(data),
            path,
        }
    }

    /// Snapshot of the global message log.
    pub fn global(&self) -> Vec<ChatMessage> {
        self.data.read().unwrap().global_messages.clone()
    }

    /// Number of messages in the global log.
    pub fn len(&self) -> usize {
        self.data.read().unwrap().global_messages.len()
    }

    /// True if no messages have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a message to the global log and the sender's log, then
    /// rewrites the backing file. A write failure is logged and swallowed:
    /// the message is still part of the in-memory history and gets
    /// broadcast, trading durability for availability.
    pub async fn append(&self, message: ChatMessage) {
        {
            let mut data = self.data.write().unwrap();
            data.chat_history
                .entry(message.ip.clone())
                .or_default()
                .push(message.clone());
            data.global_messages.push(message);
        }

        if let Err(e) = self.persist().await {
            warn!(path = %self.path.display(), "failed to persist history: {e}");
        }
    }

    /// Looks up the file metadata recorded for a stored name.
    ///
    /// The original filename is kept in the history entry that references
    /// the stored file, so downloads never have to re-derive it.
    pub fn find_file_meta(&self, stored_name: &str) -> Option<FileMeta> {
        let data = self.data.read().unwrap();
        data.global_messages
            .iter()
            .rev()
            .filter_map(|m| m.file_data.as_ref())
            .find(|f| f.filename == stored_name)
            .cloned()
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let bytes = {
            let data = self.data.read().unwrap();
            serde_json::to_vec_pretty(&*data)?
        };
        fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
