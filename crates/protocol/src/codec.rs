//! Text-safe binary codec for file transfers.
//!
//! Chunks travel as standard base64. Clients slice files at arbitrary byte
//! boundaries before encoding, and some strip padding, so [`decode`] repairs
//! missing padding before handing the text to the engine.
//!
//! Each chunk must be decoded independently and the resulting byte segments
//! concatenated in index order. Concatenating the *encoded text* of several
//! chunks and decoding once corrupts the data whenever a chunk boundary does
//! not fall on the encoding's 3-byte grouping.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Error returned when text is not valid base64 even after padding repair.
#[derive(Debug, thiserror::Error)]
#[error("base64 decode failed: {0}")]
pub struct DecodeError(#[from] base64::DecodeError);

/// Encodes bytes as padded standard base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes base64 text, tolerating surrounding whitespace and missing padding.
///
/// The input is trimmed, then `(4 - len % 4) % 4` padding characters are
/// appended before decoding.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = text.trim();
    let padding = (4 - trimmed.len() % 4) % 4;
    if padding == 0 {
        return Ok(STANDARD.decode(trimmed)?);
    }
    let mut padded = String::with_capacity(trimmed.len() + padding);
    padded.push_str(trimmed);
    for _ in 0..padding {
        padded.push('=');
    }
    Ok(STANDARD.decode(&padded)?)
}

/// Strips a `data:<mime>;base64,` prefix, if present.
///
/// Only the first chunk of a transfer may carry one. The header is discarded;
/// the transfer's declared MIME type is authoritative.
pub fn strip_data_url(text: &str) -> &str {
    if text.starts_with("data:") {
        if let Some((_, payload)) = text.split_once(',') {
            return payload;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let data = b"The quick brown fox jumps over the lazy dog";
        assert_eq!(decode(&encode(data)).unwrap(), data);
    }

    #[test]
    fn decode_tolerates_missing_padding() {
        // "ab" encodes to "YWI=" — strip the padding.
        assert_eq!(decode("YWI").unwrap(), b"ab");
        // "a" encodes to "YQ==".
        assert_eq!(decode("YQ").unwrap(), b"a");
    }

    #[test]
    fn decode_tolerates_surrounding_whitespace() {
        assert_eq!(decode("  QUJD\n").unwrap(), b"ABC");
        assert_eq!(decode(" YWI \t").unwrap(), b"ab");
    }

    #[test]
    fn decode_rejects_invalid_text() {
        assert!(decode("not base64 at all!!").is_err());
        // A length of 4k+1 cannot be repaired with padding.
        assert!(decode("QUJDA").is_err());
    }

    #[test]
    fn decode_empty_is_empty() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode("   ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn strip_data_url_removes_header() {
        assert_eq!(
            strip_data_url("data:application/pdf;base64,QUJD"),
            "QUJD"
        );
    }

    #[test]
    fn strip_data_url_passes_plain_text_through() {
        assert_eq!(strip_data_url("QUJD"), "QUJD");
        // No comma after the scheme: not a well-formed data URL, pass through.
        assert_eq!(strip_data_url("data:QUJD"), "data:QUJD");
    }

    /// The round-trip law: for any split of B into chunks — including splits
    /// that do not align to the 3-byte encoding grouping — encoding each
    /// chunk independently, decoding each independently, and concatenating
    /// in index order reproduces B exactly.
    #[test]
    fn chunked_roundtrip_at_arbitrary_boundaries() {
        let original: Vec<u8> = (0u16..=1031).map(|v| (v % 251) as u8).collect();

        for chunk_size in [1usize, 2, 3, 4, 5, 7, 64, 100, 1000, 2000] {
            let decoded: Vec<u8> = original
                .chunks(chunk_size)
                .map(|c| encode(c))
                .map(|text| decode(&text).unwrap())
                .flatten()
                .collect();
            assert_eq!(decoded, original, "chunk_size={chunk_size}");
        }
    }

    /// Concatenating encoded text before decoding is the bug this codec
    /// exists to avoid: with non-aligned boundaries the naive approach
    /// produces different bytes (or fails outright).
    #[test]
    fn text_concatenation_differs_from_segment_concatenation() {
        let original = b"abcdefghi";
        // Split "abcd" / "efghi": neither part is a multiple of 3 bytes, so
        // each encoded part ends in padding.
        let part1 = encode(&original[..4]); // "YWJjZA=="
        let part2 = encode(&original[4..]); // "ZWZnaGk="

        let naive = decode(&format!("{part1}{part2}"));
        let correct: Vec<u8> = [decode(&part1).unwrap(), decode(&part2).unwrap()].concat();

        assert_eq!(correct, original);
        match naive {
            Ok(bytes) => assert_ne!(bytes, original),
            Err(_) => {} // mid-stream padding is also a legal failure mode
        }
    }
}
