//! Binary encoding layered over any driver, with a plain fallback
//!
//! A stored dataset is converted to the binary schema, serialized, gzipped,
//! base64-encoded and carried by a single sentinel record inside an
//! otherwise ordinary dataset, so the wrapped driver never needs to know.
//! Any failure on the way falls back to storing the caller's dataset as is,
//! which is also why plain datasets read back through the wrapper unchanged.

use crate::traits::Storage;
use async_trait::async_trait;
use datavault_codec::binary::{from_base64, to_base64};
use datavault_codec::{decode_binary, encode_binary, Compressor, GzipCodec};
use datavault_core::{sanitize_for_logging, Dataset, Error, Record, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Metadata value that marks a dataset as a binary carrier
pub const BINARY_MARKER: &str = "__BINARY_MARKER__";
/// Name of the sentinel record
pub const BINARY_RECORD_NAME: &str = "__BINARY_DATA__";
pub const BINARY_RECORD_UID: i64 = -1;
pub const BINARY_RECORD_CLUB: &str = "BINARY_STORAGE";
/// Wire format version carried in the sentinel's `division`
pub const BINARY_FORMAT_VERSION: &str = "v1";

/// Why the binary path was abandoned for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    ConversionFailed,
    MarshalFailed,
    CompressionFailed,
    StorageFailed,
    RetrievalFailed,
    DecodeFailed,
    DecompressionFailed,
    UnmarshalFailed,
    VersionMismatch,
}

impl FallbackReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConversionFailed => "conversion_failed",
            Self::MarshalFailed => "marshal_failed",
            Self::CompressionFailed => "compression_failed",
            Self::StorageFailed => "storage_failed",
            Self::RetrievalFailed => "retrieval_failed",
            Self::DecodeFailed => "decode_failed",
            Self::DecompressionFailed => "decompression_failed",
            Self::UnmarshalFailed => "unmarshal_failed",
            Self::VersionMismatch => "version_mismatch",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decorates a driver with the binary form
pub struct BinaryCodecStorage<S> {
    inner: S,
    compressor: Arc<dyn Compressor>,
}

impl<S: Storage> BinaryCodecStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            compressor: Arc::new(GzipCodec::default()),
        }
    }

    /// Use a specific gzip level and decompression cap
    #[must_use]
    pub fn with_codec(self, codec: GzipCodec) -> Self {
        self.with_compressor(Arc::new(codec))
    }

    #[must_use]
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn encode(&self, dataset: &Dataset) -> std::result::Result<(Dataset, usize, usize), (FallbackReason, Error)> {
        let serialized = encode_binary(dataset).map_err(|e| (FallbackReason::MarshalFailed, e))?;
        let compressed = self
            .compressor
            .compress(&serialized)
            .map_err(|e| (FallbackReason::CompressionFailed, e))?;

        let carrier = Dataset::new(vec![sentinel_record(&compressed)], BINARY_MARKER);
        Ok((carrier, serialized.len(), compressed.len()))
    }

    fn decode(&self, carrier: &Dataset) -> std::result::Result<Dataset, (FallbackReason, Error)> {
        let [sentinel] = carrier.records.as_slice() else {
            return Err((
                FallbackReason::DecodeFailed,
                Error::decoding_message(
                    "decode",
                    format!(
                        "binary carrier holds {} records, expected 1",
                        carrier.records.len()
                    ),
                ),
            ));
        };
        if sentinel.name != BINARY_RECORD_NAME || sentinel.uid != BINARY_RECORD_UID {
            return Err((
                FallbackReason::DecodeFailed,
                Error::decoding_message("decode", "binary carrier record is malformed"),
            ));
        }
        if sentinel.division != BINARY_FORMAT_VERSION {
            return Err((
                FallbackReason::VersionMismatch,
                Error::decoding_message(
                    "decode",
                    format!("unsupported binary format version '{}'", sentinel.division),
                ),
            ));
        }

        let compressed =
            from_base64(&sentinel.position).map_err(|e| (FallbackReason::DecodeFailed, e))?;
        let serialized = self
            .compressor
            .decompress(&compressed)
            .map_err(|e| (FallbackReason::DecompressionFailed, e))?;
        decode_binary(&serialized, self.compressor.max_decompressed()).map_err(|e| {
            let reason = match &e {
                Error::DecodingFailure { stage: "convert", .. } => FallbackReason::ConversionFailed,
                _ => FallbackReason::UnmarshalFailed,
            };
            (reason, e)
        })
    }

    async fn store_plain(&self, id: &str, dataset: Dataset, reason: FallbackReason, error: &Error) -> Result<()> {
        tracing::warn!(
            dataset_id = %sanitize_for_logging(id),
            backend = self.inner.backend_name(),
            reason = %reason,
            error = %error,
            "Binary storage failed, storing plain dataset"
        );
        self.inner.store(id, dataset).await
    }

    /// Re-read after a failed decode; a carrier is never handed to the caller
    async fn retrieve_plain(&self, id: &str, reason: FallbackReason, error: Error) -> Result<Dataset> {
        tracing::warn!(
            dataset_id = %sanitize_for_logging(id),
            backend = self.inner.backend_name(),
            reason = %reason,
            error = %error,
            "Binary retrieval failed, falling back to plain retrieval"
        );
        let dataset = self.inner.retrieve(id).await?;
        if is_binary_carrier(&dataset) {
            return Err(error);
        }
        Ok(dataset)
    }
}

fn sentinel_record(payload: &[u8]) -> Record {
    Record {
        uid: BINARY_RECORD_UID,
        name: BINARY_RECORD_NAME.to_string(),
        position: to_base64(payload),
        age: payload.len().to_string(),
        club: BINARY_RECORD_CLUB.to_string(),
        division: BINARY_FORMAT_VERSION.to_string(),
        ..Default::default()
    }
}

/// Whether a dataset is a binary carrier rather than real data
pub fn is_binary_carrier(dataset: &Dataset) -> bool {
    dataset.currency_symbol == BINARY_MARKER
}

#[async_trait]
impl<S: Storage> Storage for BinaryCodecStorage<S> {
    async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
        let (carrier, serialized_size, compressed_size) = match self.encode(&dataset) {
            Ok(encoded) => encoded,
            Err((reason, error)) => return self.store_plain(id, dataset, reason, &error).await,
        };

        match self.inner.store(id, carrier).await {
            Ok(()) => {
                let ratio = if compressed_size == 0 {
                    0.0
                } else {
                    serialized_size as f64 / compressed_size as f64
                };
                tracing::debug!(
                    dataset_id = %sanitize_for_logging(id),
                    backend = self.inner.backend_name(),
                    records = dataset.len(),
                    serialized_size,
                    compressed_size,
                    ratio,
                    "Stored dataset in binary form"
                );
                Ok(())
            }
            // Nothing past validation will accept the plain form either
            Err(e @ Error::InvalidId { .. }) => Err(e),
            Err(e) => self.store_plain(id, dataset, FallbackReason::StorageFailed, &e).await,
        }
    }

    async fn retrieve(&self, id: &str) -> Result<Dataset> {
        let stored = match self.inner.retrieve(id).await {
            Ok(dataset) => dataset,
            // A second read cannot do better than these
            Err(e)
                if e.is_not_found()
                    || e.is_fatal()
                    || matches!(e, Error::InvalidId { .. } | Error::Timeout { .. }) =>
            {
                return Err(e)
            }
            Err(e) => return self.retrieve_plain(id, FallbackReason::RetrievalFailed, e).await,
        };

        if !is_binary_carrier(&stored) {
            tracing::debug!(
                dataset_id = %sanitize_for_logging(id),
                records = stored.len(),
                "Retrieved plain dataset"
            );
            return Ok(stored);
        }

        match self.decode(&stored) {
            Ok(dataset) => {
                tracing::debug!(
                    dataset_id = %sanitize_for_logging(id),
                    backend = self.inner.backend_name(),
                    records = dataset.len(),
                    "Retrieved dataset from binary form"
                );
                Ok(dataset)
            }
            Err((_, error)) if error.is_fatal() => {
                tracing::error!(
                    dataset_id = %sanitize_for_logging(id),
                    error = %error,
                    "Refusing to decode oversized binary payload"
                );
                Err(error)
            }
            Err((reason, error)) => self.retrieve_plain(id, reason, error).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.inner.list().await
    }

    async fn cleanup_old_datasets(&self, max_age: Duration, exclude: &[String]) -> Result<()> {
        self.inner.cleanup_old_datasets(max_age, exclude).await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use datavault_core::RoleOverallScore;
    use std::collections::HashMap;

    fn sample() -> Dataset {
        let mut attributes = HashMap::new();
        attributes.insert("Pac".to_string(), "15".to_string());
        let mut numeric = HashMap::new();
        numeric.insert("Pac".to_string(), 15);
        Dataset::new(
            vec![
                Record {
                    uid: 7,
                    name: "Alice".to_string(),
                    club: "United".to_string(),
                    overall: 81,
                    attributes,
                    numeric_attributes: numeric,
                    role_specific_overalls: vec![RoleOverallScore {
                        role_name: "Winger".to_string(),
                        score: 79,
                    }],
                    ..Default::default()
                },
                Record {
                    name: "Bob".to_string(),
                    ..Default::default()
                },
            ],
            "$",
        )
    }

    struct FailingCompressor;

    impl Compressor for FailingCompressor {
        fn compress(&self, _data: &[u8]) -> Result<Vec<u8>> {
            Err(Error::encoding_message("compress", "forced failure"))
        }
        fn decompress(&self, _data: &[u8]) -> Result<Vec<u8>> {
            Err(Error::decoding_message("decompress", "forced failure"))
        }
        fn max_decompressed(&self) -> u64 {
            1024
        }
    }

    /// Refuses binary carriers, accepts everything else
    struct PlainOnly(MemoryStorage);

    #[async_trait]
    impl Storage for PlainOnly {
        async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
            if is_binary_carrier(&dataset) {
                return Err(Error::backend_unavailable("plain-only", "rejects carriers"));
            }
            self.0.store(id, dataset).await
        }
        async fn retrieve(&self, id: &str) -> Result<Dataset> {
            self.0.retrieve(id).await
        }
        async fn delete(&self, id: &str) -> Result<()> {
            self.0.delete(id).await
        }
        async fn list(&self) -> Result<Vec<String>> {
            self.0.list().await
        }
        async fn cleanup_old_datasets(&self, a: Duration, e: &[String]) -> Result<()> {
            self.0.cleanup_old_datasets(a, e).await
        }
        fn backend_name(&self) -> &'static str {
            "plain-only"
        }
    }

    #[tokio::test]
    async fn test_store_writes_single_sentinel() {
        let memory = Arc::new(MemoryStorage::new());
        let storage = BinaryCodecStorage::new(memory.clone());

        storage.store("abc", sample()).await.unwrap();

        let raw = memory.retrieve("abc").await.unwrap();
        assert_eq!(raw.currency_symbol, BINARY_MARKER);
        assert_eq!(raw.records.len(), 1);
        let sentinel = &raw.records[0];
        assert_eq!(sentinel.uid, BINARY_RECORD_UID);
        assert_eq!(sentinel.name, BINARY_RECORD_NAME);
        assert_eq!(sentinel.club, BINARY_RECORD_CLUB);
        assert_eq!(sentinel.division, BINARY_FORMAT_VERSION);
        let payload = from_base64(&sentinel.position).unwrap();
        assert_eq!(sentinel.age, payload.len().to_string());

        assert_eq!(storage.retrieve("abc").await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_compression_failure_stores_plain() {
        let memory = Arc::new(MemoryStorage::new());
        let storage =
            BinaryCodecStorage::new(memory.clone()).with_compressor(Arc::new(FailingCompressor));

        storage.store("abc", sample()).await.unwrap();

        assert_eq!(memory.retrieve("abc").await.unwrap(), sample());
        assert_eq!(storage.retrieve("abc").await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_storage_failure_stores_plain() {
        let storage = BinaryCodecStorage::new(PlainOnly(MemoryStorage::new()));
        storage.store("abc", sample()).await.unwrap();

        assert_eq!(storage.inner().0.retrieve("abc").await.unwrap(), sample());
        assert_eq!(storage.retrieve("abc").await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_plain_data_reads_through() {
        let memory = Arc::new(MemoryStorage::new());
        memory.store("legacy", sample()).await.unwrap();

        let storage = BinaryCodecStorage::new(memory);
        assert_eq!(storage.retrieve("legacy").await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_corrupt_carrier_is_never_returned_as_data() {
        let memory = Arc::new(MemoryStorage::new());
        let mut sentinel = sentinel_record(b"not really gzip");
        sentinel.position = "!!!not base64!!!".to_string();
        memory
            .store("bad", Dataset::new(vec![sentinel], BINARY_MARKER))
            .await
            .unwrap();

        let storage = BinaryCodecStorage::new(memory);
        let err = storage.retrieve("bad").await.unwrap_err();
        assert!(matches!(err, Error::DecodingFailure { .. }));
    }

    #[tokio::test]
    async fn test_unknown_version_is_decoding_failure() {
        let memory = Arc::new(MemoryStorage::new());
        let storage = BinaryCodecStorage::new(memory.clone());
        storage.store("abc", sample()).await.unwrap();

        let mut raw = memory.retrieve("abc").await.unwrap();
        raw.records[0].division = "v2".to_string();
        memory.store("abc", raw).await.unwrap();

        let err = storage.retrieve("abc").await.unwrap_err();
        assert!(matches!(err, Error::DecodingFailure { .. }));
    }

    #[tokio::test]
    async fn test_decompression_bomb_is_fatal() {
        let memory = Arc::new(MemoryStorage::new());
        let big = Dataset::new(
            vec![Record {
                name: "x".repeat(64 * 1024),
                ..Default::default()
            }],
            "$",
        );
        BinaryCodecStorage::new(memory.clone())
            .store("big", big)
            .await
            .unwrap();

        let small_cap = BinaryCodecStorage::new(memory).with_codec(GzipCodec::new(1, 1024).unwrap());
        let err = small_cap.retrieve("big").await.unwrap_err();
        assert!(matches!(err, Error::DecompressionBomb { limit: 1024 }));
    }

    #[tokio::test]
    async fn test_missing_dataset_is_not_found() {
        let storage = BinaryCodecStorage::new(MemoryStorage::new());
        assert!(storage.retrieve("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_passthrough_operations() {
        let memory = Arc::new(MemoryStorage::new());
        let storage = BinaryCodecStorage::new(memory.clone());
        storage.store("a", sample()).await.unwrap();
        storage.store("b", sample()).await.unwrap();

        assert_eq!(storage.list().await.unwrap(), vec!["a", "b"]);
        storage.delete("a").await.unwrap();
        assert_eq!(memory.list().await.unwrap(), vec!["b"]);
        assert_eq!(storage.backend_name(), "memory");
    }

    /// Every read times out; counts how often it was asked
    #[derive(Default)]
    struct SlowReads {
        reads: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Storage for SlowReads {
        async fn store(&self, _id: &str, _dataset: Dataset) -> Result<()> {
            Ok(())
        }
        async fn retrieve(&self, _id: &str) -> Result<Dataset> {
            self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(Error::timeout("retrieve", Duration::from_secs(30)))
        }
        async fn delete(&self, _id: &str) -> Result<()> {
            Ok(())
        }
        async fn list(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn cleanup_old_datasets(&self, _a: Duration, _e: &[String]) -> Result<()> {
            Ok(())
        }
        fn backend_name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_timeout_is_not_retried() {
        let slow = Arc::new(SlowReads::default());
        let storage = BinaryCodecStorage::new(slow.clone());

        let err = storage.retrieve("abc").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(slow.reads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsupported_schema_is_conversion_failure() {
        let codec = GzipCodec::default();
        let mut serialized = encode_binary(&sample()).unwrap();
        // schema_version leads the payload as a one-byte varint
        assert_eq!(serialized[0], 1);
        serialized[0] = 99;
        let carrier = Dataset::new(
            vec![sentinel_record(&codec.compress(&serialized).unwrap())],
            BINARY_MARKER,
        );

        let storage = BinaryCodecStorage::new(MemoryStorage::new());
        let (reason, err) = storage.decode(&carrier).unwrap_err();
        assert_eq!(reason, FallbackReason::ConversionFailed);
        assert!(err.to_string().contains("schema version 99"));
    }

    #[test]
    fn test_reason_names() {
        assert_eq!(FallbackReason::VersionMismatch.to_string(), "version_mismatch");
        assert_eq!(FallbackReason::CompressionFailed.as_str(), "compression_failed");
        assert_eq!(FallbackReason::ConversionFailed.as_str(), "conversion_failed");
    }
}
