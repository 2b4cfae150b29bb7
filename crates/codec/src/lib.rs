//! Codecs used by the storage drivers.
//!
//! - **`compression`**: gzip with a hard cap on decompressed size.
//! - **`textual`**: the plain JSON + gzip form every file and object driver
//!   writes.
//! - **`binary`**: the compact schema-specific form used by the binary codec
//!   wrapper, plus the base64 transport helpers for embedding it in a record.

pub mod binary;
pub mod compression;
pub mod textual;

pub use binary::{decode_binary, encode_binary, BinaryDataset, BINARY_SCHEMA_VERSION};
pub use compression::{CompressionStats, Compressor, GzipCodec};
pub use textual::{decode_textual, encode_textual, EncodedDataset};
