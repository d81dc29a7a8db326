//! Durable state for the chat relay: the append-only message history
//! (persisted as a single JSON document) and the directory of reassembled
//! upload files.

mod files;
mod history;

pub use files::{FileStore, StoredFile};
pub use history::HistoryStore;

/// Errors produced by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid stored name: {0}")]
    InvalidName(String),
}
