//! Deflate-family compression, skipped below a size threshold or at level 0.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::CacheError;

/// Inputs shorter than this may skip compression; the decoder tolerates
/// both compressed and raw input regardless of this threshold.
pub const SKIP_THRESHOLD_BYTES: usize = 1024;

/// Compresses `data` at `level` (0-9). Level 0 and inputs below
/// `SKIP_THRESHOLD_BYTES` are passed through unchanged.
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>, CacheError> {
    if level == 0 || data.len() < SKIP_THRESHOLD_BYTES {
        return Ok(data.to_vec());
    }
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| CacheError::StorageError(format!("compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| CacheError::StorageError(format!("compression failed: {e}")))
}

/// Decompresses `data` produced by `compress`. Tolerates raw (uncompressed)
/// input by falling back to it when deflate decoding fails.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) => Ok(data.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_large_input() {
        let data = "a".repeat(4096).into_bytes();
        let compressed = compress(&data, 6).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn level_zero_is_noop() {
        let data = "a".repeat(4096).into_bytes();
        let compressed = compress(&data, 0).unwrap();
        assert_eq!(compressed, data);
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn small_input_skips_compression_but_still_decodes() {
        let data = b"tiny".to_vec();
        let compressed = compress(&data, 6).unwrap();
        assert_eq!(compressed, data);
        assert_eq!(decompress(&compressed).unwrap(), data);
    }
}
