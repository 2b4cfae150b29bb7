//! Compact binary form of a dataset
//!
//! `encode_binary` converts to the wire structs and serializes them with
//! bincode; `decode_binary` reverses both steps. Input longer than the byte
//! limit passed to `decode_binary` is rejected outright, and bincode stops
//! reading once it has consumed that many bytes.

mod convert;
mod schema;

pub use schema::{BinaryDataset, BinaryRecord, BinaryRoleScore};

use base64::{engine::general_purpose::STANDARD, Engine};
use bincode::Options;
use datavault_core::{Dataset, Error, Result};

/// Bumped whenever the wire structs change shape
pub const BINARY_SCHEMA_VERSION: u32 = 1;

fn options(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(limit)
        .with_little_endian()
        .with_varint_encoding()
}

/// Convert and serialize a dataset
pub fn encode_binary(dataset: &Dataset) -> Result<Vec<u8>> {
    let wire = BinaryDataset::from(dataset);
    options(u64::MAX)
        .serialize(&wire)
        .map_err(|e| Error::encoding("marshal", e))
}

/// Deserialize and convert back. Fails when `bytes` is longer than `limit`.
pub fn decode_binary(bytes: &[u8], limit: u64) -> Result<Dataset> {
    if bytes.len() as u64 > limit {
        return Err(Error::decoding_message(
            "unmarshal",
            format!("{} bytes exceeds the {limit} byte limit", bytes.len()),
        ));
    }
    let wire: BinaryDataset = options(limit)
        .deserialize(bytes)
        .map_err(|e| Error::decoding("unmarshal", e))?;
    Dataset::try_from(wire)
}

/// Base64 for embedding bytes in a text field
#[must_use]
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn from_base64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| Error::decoding("decode", e))
}
