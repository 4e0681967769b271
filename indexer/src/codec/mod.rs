//! Compression framing for metadata values.
//!
//! Values written to `TEXT`/`BYTEA` metadata columns are framed as
//! `[prefix:1][payload]`: `0x00` marks the payload as stored raw, `0x01`
//! marks it as zstd-compressed (level 3). Empty input round-trips to
//! empty. Legacy rows written before this framing existed carry no
//! prefix byte at all and are treated as raw on read.

use std::io::Read;

use thiserror::Error;

/// Marks a payload as stored without compression.
const PREFIX_RAW: u8 = 0x00;
/// Marks a payload as zstd-compressed.
const PREFIX_ZSTD: u8 = 0x01;

/// zstd compression level used for all writes.
const COMPRESSION_LEVEL: i32 = 3;

/// Reject compressed input larger than this before attempting to decompress.
const MAX_COMPRESSED_BYTES: usize = 10 * 1024;
/// Reject decompressed output larger than this.
const MAX_DECOMPRESSED_BYTES: usize = 1024 * 1024;

/// Errors from decoding a framed metadata value.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The compressed payload exceeded [`MAX_COMPRESSED_BYTES`].
    #[error("compressed payload of {0} bytes exceeds the {MAX_COMPRESSED_BYTES} byte limit")]
    CompressedTooLarge(usize),
    /// The decompressed payload exceeded [`MAX_DECOMPRESSED_BYTES`].
    #[error("decompressed payload exceeds the {MAX_DECOMPRESSED_BYTES} byte limit")]
    DecompressedTooLarge,
    /// zstd itself rejected the payload.
    #[error("zstd decompression failed: {0}")]
    Zstd(#[source] std::io::Error),
    /// An unrecognized prefix byte.
    #[error("unrecognized compression prefix byte {0:#04x}")]
    UnknownPrefix(u8),
}

/// Frame `payload` for storage, compressing it if that actually shrinks it.
///
/// Returns `payload` unchanged (empty in, empty out) for empty input.
/// Falls back to the raw (`0x00`) framing if zstd compression fails or
/// does not reduce the size.
#[must_use]
pub fn encode(payload: &[u8]) -> Vec<u8> {
    if payload.is_empty() {
        return Vec::new();
    }

    match zstd::encode_all(payload, COMPRESSION_LEVEL) {
        Ok(compressed) if compressed.len() < payload.len() => {
            let mut framed = Vec::with_capacity(compressed.len() + 1);
            framed.push(PREFIX_ZSTD);
            framed.extend_from_slice(&compressed);
            framed
        }
        _ => {
            let mut framed = Vec::with_capacity(payload.len() + 1);
            framed.push(PREFIX_RAW);
            framed.extend_from_slice(payload);
            framed
        }
    }
}

/// Frame `payload` as raw (`0x00` prefix) without attempting compression.
///
/// Returns `payload` unchanged for empty input.
#[must_use]
pub fn frame_raw(payload: &[u8]) -> Vec<u8> {
    if payload.is_empty() {
        return Vec::new();
    }
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.push(PREFIX_RAW);
    framed.extend_from_slice(payload);
    framed
}

/// Decode a value previously framed by [`encode`], or a legacy unprefixed
/// raw value.
///
/// # Errors
/// Returns [`CodecError`] if the compressed payload or its decompressed
/// output exceeds the bomb-protection limits, or if decompression fails.
pub fn decode(framed: &[u8]) -> Result<Vec<u8>, CodecError> {
    let Some((&prefix, rest)) = framed.split_first() else {
        return Ok(Vec::new());
    };

    match prefix {
        PREFIX_RAW => Ok(rest.to_vec()),
        PREFIX_ZSTD => decode_zstd(rest),
        // Legacy rows carry no prefix byte; treat the whole thing as raw.
        _ => Ok(framed.to_vec()),
    }
}

fn decode_zstd(compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
    if compressed.len() > MAX_COMPRESSED_BYTES {
        return Err(CodecError::CompressedTooLarge(compressed.len()));
    }

    let decoder = zstd::Decoder::new(compressed).map_err(CodecError::Zstd)?;
    let mut limited = decoder.take(MAX_DECOMPRESSED_BYTES as u64 + 1);
    let mut out = Vec::new();
    limited.read_to_end(&mut out).map_err(CodecError::Zstd)?;

    if out.len() > MAX_DECOMPRESSED_BYTES {
        return Err(CodecError::DecompressedTooLarge);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_round_trips_to_empty() {
        let encoded = encode(&[]);
        assert!(encoded.is_empty());
        assert_eq!(decode(&encoded).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn small_payload_stays_raw() {
        let payload = b"hello";
        let encoded = encode(payload);
        assert_eq!(encoded[0], PREFIX_RAW);
        assert_eq!(decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn compressible_payload_round_trips_through_zstd() {
        let payload = vec![b'a'; 4096];
        let encoded = encode(&payload);
        assert_eq!(encoded[0], PREFIX_ZSTD);
        assert!(encoded.len() < payload.len());
        assert_eq!(decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn incompressible_payload_falls_back_to_raw() {
        // Small random-looking payload that zstd can't shrink below +1 byte overhead.
        let payload: Vec<u8> = (0..16u32).map(|i| (i * 37 % 251) as u8).collect();
        let encoded = encode(&payload);
        assert_eq!(encoded[0], PREFIX_RAW);
        assert_eq!(decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn legacy_unprefixed_data_decodes_as_raw() {
        let legacy = vec![0xFFu8, 0xAB, 0xCD];
        assert_eq!(decode(&legacy).unwrap(), legacy);
    }

    #[test]
    fn oversized_compressed_input_is_rejected() {
        let huge = vec![PREFIX_ZSTD]
            .into_iter()
            .chain(vec![0u8; MAX_COMPRESSED_BYTES + 1])
            .collect::<Vec<_>>();
        let err = decode(&huge).unwrap_err();
        assert!(matches!(err, CodecError::CompressedTooLarge(_)));
    }
}
