use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use lanchat_protocol::codec;
use lanchat_protocol::messages::FileChunkRequest;

use crate::types::{ChunkProgress, Transfer, TransferMeta, TransferPhase};
use crate::TransferError;

struct Stored {
    transfer: Transfer,
    last_update: Instant,
}

/// In-memory table of in-progress transfers, keyed by transfer id.
///
/// The outer map lock is held only to look up or insert an entry; each
/// transfer's state sits behind its own mutex, so chunk arrivals for the
/// same id serialize while different ids do not contend.
pub struct ChunkStore {
    transfers: RwLock<HashMap<String, Arc<Mutex<Stored>>>>,
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            transfers: RwLock::new(HashMap::new()),
        }
    }

    /// Stores one chunk, lazily creating the transfer on first contact.
    ///
    /// Metadata is captured from the first chunk and ignored on subsequent
    /// ones. Duplicate indices overwrite; the returned count is the number
    /// of distinct indices present.
    pub fn put_chunk(&self, req: &FileChunkRequest) -> Result<ChunkProgress, TransferError> {
        validate_chunk(req)?;

        let entry = self.entry_or_create(req);
        let mut stored = entry.lock().unwrap();

        if req.chunk_index >= stored.transfer.meta.total_chunks {
            return Err(TransferError::Validation(format!(
                "chunk index {} out of range for {} declared chunks",
                req.chunk_index, stored.transfer.meta.total_chunks
            )));
        }

        // The first chunk may carry a data URL header; keep it intact so
        // reassembly strips it exactly once. Later chunks are stored with
        // any header already removed.
        let payload = if req.chunk_index == 0 {
            req.data.clone()
        } else {
            codec::strip_data_url(&req.data).to_string()
        };

        stored.transfer.chunks.insert(req.chunk_index, payload);
        stored.last_update = Instant::now();

        Ok(ChunkProgress {
            received: stored.transfer.received(),
            total: stored.transfer.meta.total_chunks,
        })
    }

    /// True iff every declared chunk of `id` has arrived.
    pub fn is_complete(&self, id: &str) -> bool {
        self.phase(id) == TransferPhase::Complete
    }

    /// Current lifecycle phase of `id`.
    pub fn phase(&self, id: &str) -> TransferPhase {
        let map = self.transfers.read().unwrap();
        match map.get(id) {
            None => TransferPhase::NoSuchTransfer,
            Some(entry) => {
                let stored = entry.lock().unwrap();
                if stored.transfer.is_complete() {
                    TransferPhase::Complete
                } else {
                    TransferPhase::Accumulating
                }
            }
        }
    }

    /// Atomically removes and returns a complete transfer.
    ///
    /// Fails with [`TransferError::NotFound`] if the id is absent (including
    /// after a previous successful take — a duplicate completion signal
    /// cannot trigger double reassembly) and [`TransferError::Incomplete`]
    /// if chunks are still missing.
    pub fn take_for_reassembly(&self, id: &str) -> Result<Transfer, TransferError> {
        let mut map = self.transfers.write().unwrap();
        let entry = map
            .get(id)
            .ok_or_else(|| TransferError::NotFound(id.to_string()))?;

        {
            let stored = entry.lock().unwrap();
            if !stored.transfer.is_complete() {
                return Err(TransferError::Incomplete {
                    id: id.to_string(),
                    received: stored.transfer.received(),
                    total: stored.transfer.meta.total_chunks,
                });
            }
        }

        let entry = map.remove(id).unwrap();
        drop(map);

        // A concurrent put_chunk may still hold a clone of the entry; the
        // transfer is complete, so a snapshot is equivalent.
        match Arc::try_unwrap(entry) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap().transfer),
            Err(entry) => Ok(entry.lock().unwrap().transfer.clone()),
        }
    }

    /// Removes a transfer if present. Idempotent.
    pub fn evict(&self, id: &str) {
        self.transfers.write().unwrap().remove(id);
    }

    /// Drops transfers untouched for longer than `max_idle` and returns
    /// their ids. Run periodically to reclaim abandoned uploads.
    pub fn evict_stale(&self, max_idle: Duration) -> Vec<String> {
        let mut map = self.transfers.write().unwrap();
        let stale: Vec<String> = map
            .iter()
            .filter(|(_, entry)| entry.lock().unwrap().last_update.elapsed() > max_idle)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            map.remove(id);
        }
        stale
    }

    /// Number of in-progress transfers.
    pub fn len(&self) -> usize {
        self.transfers.read().unwrap().len()
    }

    /// True if no transfers are in progress.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_or_create(&self, req: &FileChunkRequest) -> Arc<Mutex<Stored>> {
        if let Some(entry) = self.transfers.read().unwrap().get(&req.file_id) {
            return Arc::clone(entry);
        }

        let mut map = self.transfers.write().unwrap();
        let entry = map.entry(req.file_id.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(Stored {
                transfer: Transfer {
                    id: req.file_id.clone(),
                    meta: TransferMeta {
                        file_name: req.file_name.clone(),
                        file_size: req.file_size,
                        mime_type: req.file_type.clone(),
                        total_chunks: req.total_chunks,
                    },
                    chunks: HashMap::new(),
                },
                last_update: Instant::now(),
            }))
        });
        Arc::clone(entry)
    }
}

fn validate_chunk(req: &FileChunkRequest) -> Result<(), TransferError> {
    if req.file_id.is_empty() {
        return Err(TransferError::Validation("missing fileId".into()));
    }
    if req.file_name.is_empty() {
        return Err(TransferError::Validation("missing fileName".into()));
    }
    if req.total_chunks == 0 {
        return Err(TransferError::Validation("totalChunks must be positive".into()));
    }
    if req.chunk_index >= req.total_chunks {
        return Err(TransferError::Validation(format!(
            "chunk index {} out of range for {} declared chunks",
            req.chunk_index, req.total_chunks
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(file_id: &str, index: u32, total: u32, data: &str) -> FileChunkRequest {
        FileChunkRequest {
            file_id: file_id.into(),
            chunk_index: index,
            total_chunks: total,
            file_name: "test.bin".into(),
            file_size: 9,
            file_type: "application/octet-stream".into(),
            data: data.into(),
        }
    }

    #[test]
    fn first_chunk_creates_transfer() {
        let store = ChunkStore::new();
        assert_eq!(store.phase("t1"), TransferPhase::NoSuchTransfer);

        let progress = store.put_chunk(&chunk("t1", 0, 3, "QUJD")).unwrap();
        assert_eq!(progress.received, 1);
        assert_eq!(progress.total, 3);
        assert_eq!(store.phase("t1"), TransferPhase::Accumulating);
    }

    #[test]
    fn out_of_order_arrival_completes() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("t1", 2, 3, "Z2hp")).unwrap();
        store.put_chunk(&chunk("t1", 0, 3, "YWJj")).unwrap();
        assert!(!store.is_complete("t1"));

        let progress = store.put_chunk(&chunk("t1", 1, 3, "ZGVm")).unwrap();
        assert_eq!(progress.received, 3);
        assert!(store.is_complete("t1"));
        assert_eq!(store.phase("t1"), TransferPhase::Complete);
    }

    #[test]
    fn duplicate_chunk_does_not_double_count() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("t1", 0, 3, "YWJj")).unwrap();
        store.put_chunk(&chunk("t1", 1, 3, "ZGVm")).unwrap();

        // Network resend of chunk 1 before chunk 2 arrives.
        let progress = store.put_chunk(&chunk("t1", 1, 3, "ZGVm")).unwrap();
        assert_eq!(progress.received, 2);
        assert!(!store.is_complete("t1"));

        let progress = store.put_chunk(&chunk("t1", 2, 3, "Z2hp")).unwrap();
        assert_eq!(progress.received, 3);
        assert!(store.is_complete("t1"));
    }

    #[test]
    fn duplicate_chunk_overwrites_payload() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("t1", 0, 1, "QUJD")).unwrap();
        store.put_chunk(&chunk("t1", 0, 1, "WFla")).unwrap();

        let transfer = store.take_for_reassembly("t1").unwrap();
        assert_eq!(transfer.chunks.get(&0).unwrap(), "WFla");
    }

    #[test]
    fn metadata_captured_once() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("t1", 0, 2, "YWJj")).unwrap();

        let mut second = chunk("t1", 1, 2, "ZGVm");
        second.file_name = "renamed.bin".into();
        second.file_size = 999;
        store.put_chunk(&second).unwrap();

        let transfer = store.take_for_reassembly("t1").unwrap();
        assert_eq!(transfer.meta.file_name, "test.bin");
        assert_eq!(transfer.meta.file_size, 9);
    }

    #[test]
    fn later_chunks_have_data_url_stripped_at_ingest() {
        let store = ChunkStore::new();
        store
            .put_chunk(&chunk("t1", 0, 2, "data:application/octet-stream;base64,YWJj"))
            .unwrap();
        store
            .put_chunk(&chunk("t1", 1, 2, "data:application/octet-stream;base64,ZGVm"))
            .unwrap();

        let transfer = store.take_for_reassembly("t1").unwrap();
        // Chunk 0 keeps its header (reassembly strips it), chunk 1 does not.
        assert!(transfer.chunks.get(&0).unwrap().starts_with("data:"));
        assert_eq!(transfer.chunks.get(&1).unwrap(), "ZGVm");
    }

    #[test]
    fn take_requires_completeness() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("t1", 0, 2, "YWJj")).unwrap();

        let err = store.take_for_reassembly("t1").unwrap_err();
        assert!(matches!(
            err,
            TransferError::Incomplete { received: 1, total: 2, .. }
        ));
        // Still accumulating — a later chunk plus a second signal succeeds.
        store.put_chunk(&chunk("t1", 1, 2, "ZGVm")).unwrap();
        assert!(store.take_for_reassembly("t1").is_ok());
    }

    #[test]
    fn take_succeeds_at_most_once() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("t1", 0, 1, "QUJD")).unwrap();

        assert!(store.take_for_reassembly("t1").is_ok());
        let err = store.take_for_reassembly("t1").unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)));
        assert_eq!(store.phase("t1"), TransferPhase::NoSuchTransfer);
    }

    #[test]
    fn take_unknown_id_is_not_found() {
        let store = ChunkStore::new();
        assert!(matches!(
            store.take_for_reassembly("missing"),
            Err(TransferError::NotFound(_))
        ));
    }

    #[test]
    fn evict_is_idempotent() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("t1", 0, 2, "YWJj")).unwrap();

        store.evict("t1");
        assert_eq!(store.phase("t1"), TransferPhase::NoSuchTransfer);
        store.evict("t1");
        store.evict("never-existed");
    }

    #[test]
    fn evict_stale_drops_only_idle_transfers() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("old", 0, 2, "YWJj")).unwrap();

        // Let "old" go idle past the cutoff, then touch a fresh transfer.
        std::thread::sleep(Duration::from_millis(50));
        store.put_chunk(&chunk("fresh", 0, 2, "YWJj")).unwrap();

        let evicted = store.evict_stale(Duration::from_millis(25));
        assert_eq!(evicted, vec!["old".to_string()]);
        assert_eq!(store.phase("old"), TransferPhase::NoSuchTransfer);
        assert_eq!(store.phase("fresh"), TransferPhase::Accumulating);
    }

    #[test]
    fn rejects_malformed_chunks() {
        let store = ChunkStore::new();

        let mut no_id = chunk("", 0, 2, "YWJj");
        no_id.file_id = String::new();
        assert!(matches!(
            store.put_chunk(&no_id),
            Err(TransferError::Validation(_))
        ));

        let mut no_name = chunk("t1", 0, 2, "YWJj");
        no_name.file_name = String::new();
        assert!(matches!(
            store.put_chunk(&no_name),
            Err(TransferError::Validation(_))
        ));

        assert!(matches!(
            store.put_chunk(&chunk("t1", 0, 0, "YWJj")),
            Err(TransferError::Validation(_))
        ));
        assert!(matches!(
            store.put_chunk(&chunk("t1", 2, 2, "YWJj")),
            Err(TransferError::Validation(_))
        ));

        // Nothing was created by the rejected operations.
        assert!(store.is_empty());
    }

    #[test]
    fn out_of_range_index_against_stored_total() {
        let store = ChunkStore::new();
        store.put_chunk(&chunk("t1", 0, 2, "YWJj")).unwrap();

        // Declared count comes from the first chunk; a later chunk claiming
        // a bigger total cannot widen the transfer.
        let wide = chunk("t1", 4, 8, "ZGVm");
        assert!(matches!(
            store.put_chunk(&wide),
            Err(TransferError::Validation(_))
        ));
        assert_eq!(store.phase("t1"), TransferPhase::Accumulating);
    }

    #[test]
    fn concurrent_puts_same_transfer() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(ChunkStore::new());
        let total = 64u32;

        let mut handles = vec![];
        for worker in 0..4 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for i in 0..total {
                    // All workers race on every index; presence semantics
                    // make the end state identical regardless of order.
                    let _ = store.put_chunk(&chunk("shared", i, total, "QUJD"));
                    let _ = worker;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let transfer = store.take_for_reassembly("shared").unwrap();
        assert_eq!(transfer.received(), total as usize);
    }

    #[test]
    fn concurrent_transfers_do_not_interfere() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(ChunkStore::new());
        let mut handles = vec![];
        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let id = format!("t{t}");
                for i in 0..10 {
                    store.put_chunk(&chunk(&id, i, 10, "QUJD")).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        for t in 0..8 {
            assert!(store.is_complete(&format!("t{t}")));
        }
    }
}
