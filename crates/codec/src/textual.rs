//! The plain JSON + gzip form written by file and object drivers

use crate::compression::{CompressionStats, GzipCodec};
use datavault_core::{Dataset, Error, Result};

/// A dataset ready to be written, with the sizes seen on the way
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub bytes: Vec<u8>,
    pub stats: CompressionStats,
}

/// Serialize to JSON and gzip it
pub fn encode_textual(dataset: &Dataset, codec: &GzipCodec) -> Result<EncodedDataset> {
    let json = serde_json::to_vec(dataset).map_err(|e| Error::encoding("marshal", e))?;
    let bytes = codec.compress(&json)?;
    Ok(EncodedDataset {
        stats: CompressionStats {
            original_size: json.len(),
            compressed_size: bytes.len(),
        },
        bytes,
    })
}

/// Decode bytes produced by `encode_textual`; `compressed = false` reads plain JSON
pub fn decode_textual(bytes: &[u8], compressed: bool, codec: &GzipCodec) -> Result<Dataset> {
    if compressed {
        let json = codec.decompress(bytes)?;
        serde_json::from_slice(&json).map_err(|e| Error::decoding("unmarshal", e))
    } else {
        serde_json::from_slice(bytes).map_err(|e| Error::decoding("unmarshal", e))
    }
}
