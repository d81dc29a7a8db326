use lanchat_protocol::codec::{self, DecodeError};

use crate::types::Transfer;

/// Result of reassembling a complete transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    /// The original byte sequence, chunk segments concatenated in index order.
    pub bytes: Vec<u8>,
    /// True if the reassembled length differs from the declared size.
    /// Non-fatal: the caller records it, the bytes are still usable.
    pub size_mismatch: bool,
}

/// Errors produced during reassembly.
#[derive(Debug, thiserror::Error)]
pub enum ReassemblyError {
    /// An index is absent. Unreachable for transfers taken from the store
    /// (completeness is checked first); fatal to this transfer if it happens.
    #[error("missing chunk {0}")]
    MissingChunk(u32),

    /// A chunk failed to decode — the transfer cannot produce valid bytes.
    #[error("chunk {index} failed to decode: {source}")]
    Decode {
        index: u32,
        #[source]
        source: DecodeError,
    },
}

/// Decodes and concatenates all chunks of a transfer.
///
/// Every chunk is decoded independently and the byte segments joined in
/// index order; the data URL header, if any, is stripped from chunk 0 only.
/// A length/declared-size mismatch is logged and flagged, not fatal.
pub fn reassemble(transfer: &Transfer) -> Result<Reassembled, ReassemblyError> {
    let mut bytes = Vec::with_capacity(transfer.meta.file_size as usize);

    for index in 0..transfer.meta.total_chunks {
        let chunk = transfer
            .chunks
            .get(&index)
            .ok_or(ReassemblyError::MissingChunk(index))?;

        let text = if index == 0 {
            codec::strip_data_url(chunk)
        } else {
            chunk.as_str()
        };

        let segment = codec::decode(text)
            .map_err(|source| ReassemblyError::Decode { index, source })?;
        bytes.extend_from_slice(&segment);
    }

    let size_mismatch = bytes.len() as u64 != transfer.meta.file_size;
    if size_mismatch {
        tracing::warn!(
            transfer_id = %transfer.id,
            declared = transfer.meta.file_size,
            actual = bytes.len(),
            "reassembled size differs from declared size"
        );
    }

    Ok(Reassembled {
        bytes,
        size_mismatch,
    })
}
