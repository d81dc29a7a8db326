//! Chunked large-file transfer: accumulation, completion tracking, and
//! byte-exact reassembly.
//!
//! A transfer begins implicitly with its first `file_chunk` and lives in the
//! [`ChunkStore`] until an explicit completion signal triggers reassembly
//! (or a stale sweep evicts it). Chunks stay text-encoded in the store and
//! are decoded independently during reassembly.

mod reassembly;
mod store;
mod types;

pub use reassembly::{Reassembled, ReassemblyError, reassemble};
pub use store::ChunkStore;
pub use types::{ChunkProgress, Transfer, TransferMeta, TransferPhase};

/// Errors produced by the chunk store.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Malformed chunk payload — rejects that single operation only.
    #[error("invalid chunk: {0}")]
    Validation(String),

    /// No transfer with this id (benign on duplicate/late signals).
    #[error("transfer not found: {0}")]
    NotFound(String),

    /// Transfer exists but not all chunks have arrived.
    #[error("transfer incomplete: {id} ({received}/{total} chunks)")]
    Incomplete {
        id: String,
        received: usize,
        total: u32,
    },
}
