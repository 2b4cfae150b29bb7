//! Derived results persisted through a storage driver
//!
//! Results that are expensive to recompute survive restarts by riding in the
//! `cache_data` field of an ordinary dataset stored under
//! `cache_<kind>_<hash>`. Every load re-checks the envelope against the
//! current request and dataset; anything that does not line up is a miss.

use crate::keys::{CacheKey, DatasetFingerprint};
use chrono::{DateTime, Utc};
use datavault_core::{sanitize_for_logging, Dataset, Error, Record, Result, CACHE_VERSION};
use datavault_storage::Storage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What is written into `cache_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope<P> {
    pub version: String,
    pub dataset_id: String,
    pub generated_at: DateTime<Utc>,
    pub params: BTreeMap<String, String>,
    pub record_count: usize,
    pub fingerprint: DatasetFingerprint,
    pub payload: P,
}

/// Saves and loads derived results through any [`Storage`].
///
/// Failures are logged and reported as a miss or a skipped save; they never
/// reach the caller as errors.
#[derive(Clone)]
pub struct PersistentResultStore {
    storage: Arc<dyn Storage>,
}

impl PersistentResultStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Storage ID used for a key computed over `records`
    pub fn storage_id(key: &CacheKey, records: &[Record]) -> String {
        format!("cache_{}", key.finish(&DatasetFingerprint::of(records)))
    }

    /// Persist `payload` for the given request over `records`.
    ///
    /// Returns whether the result was written.
    pub async fn save<P: Serialize>(
        &self,
        dataset_id: &str,
        key: &CacheKey,
        records: &[Record],
        payload: &P,
    ) -> bool {
        let id = Self::storage_id(key, records);
        let envelope = CacheEnvelope {
            version: CACHE_VERSION.to_string(),
            dataset_id: dataset_id.to_string(),
            generated_at: Utc::now(),
            params: key.params().into_iter().collect(),
            record_count: records.len(),
            fingerprint: DatasetFingerprint::of(records),
            payload,
        };

        let result = match serde_json::to_string(&envelope) {
            Ok(json) => self.storage.store(&id, Dataset::with_cache_data(json)).await,
            Err(e) => Err(Error::encoding("marshal", e)),
        };

        match result {
            Ok(()) => {
                tracing::debug!(
                    cache_id = %sanitize_for_logging(&id),
                    dataset_id = %sanitize_for_logging(dataset_id),
                    record_count = records.len(),
                    "Saved derived result"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    cache_id = %sanitize_for_logging(&id),
                    error = %e,
                    "Failed to save derived result"
                );
                false
            }
        }
    }

    /// Load a previously saved result for the same request over the same
    /// records, or `None`
    pub async fn load<P: DeserializeOwned>(
        &self,
        dataset_id: &str,
        key: &CacheKey,
        records: &[Record],
    ) -> Option<P> {
        let id = Self::storage_id(key, records);
        let dataset = match self.storage.retrieve(&id).await {
            Ok(dataset) => dataset,
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                tracing::warn!(
                    cache_id = %sanitize_for_logging(&id),
                    error = %e,
                    "Failed to read derived result"
                );
                return None;
            }
        };

        let Some(json) = dataset.cache_data else {
            tracing::debug!(cache_id = %sanitize_for_logging(&id), "Cache entry has no payload");
            return None;
        };
        let envelope: CacheEnvelope<P> = match serde_json::from_str(&json) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    cache_id = %sanitize_for_logging(&id),
                    error = %e,
                    "Unreadable cache entry"
                );
                return None;
            }
        };

        let params: BTreeMap<String, String> = key.params().into_iter().collect();
        let mismatch = if envelope.version != CACHE_VERSION {
            Some("version")
        } else if envelope.dataset_id != dataset_id {
            Some("dataset_id")
        } else if envelope.params != params {
            Some("params")
        } else if envelope.record_count != records.len() {
            Some("record_count")
        } else if envelope.fingerprint != DatasetFingerprint::of(records) {
            Some("fingerprint")
        } else {
            None
        };
        if let Some(field) = mismatch {
            tracing::debug!(
                cache_id = %sanitize_for_logging(&id),
                field,
                "Cache entry does not match request"
            );
            return None;
        }

        tracing::debug!(
            cache_id = %sanitize_for_logging(&id),
            generated_at = %envelope.generated_at,
            "Loaded derived result"
        );
        Some(envelope.payload)
    }

    /// Remove the saved result for a request over `records`
    pub async fn invalidate(&self, key: &CacheKey, records: &[Record]) -> Result<()> {
        self.storage.delete(&Self::storage_id(key, records)).await
    }
}
