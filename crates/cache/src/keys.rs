//! Cache key derivation
//!
//! A key combines the kind of derived result, the request parameters that
//! produced it and a fingerprint of the dataset it was computed from. Any
//! change to the dataset content that the fingerprint samples yields a
//! different key, so stale results are never served under a new dataset.

use datavault_core::{Record, CACHE_VERSION};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// Number of records sampled from each end of a dataset
const FINGERPRINT_SAMPLE: usize = 5;

/// Cheap content fingerprint of a record list.
///
/// Samples the first and, for datasets with more than ten records, the last
/// five records together with the record count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetFingerprint(String);

impl DatasetFingerprint {
    pub fn of(records: &[Record]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut sample = String::new();
        let head = records.iter().take(FINGERPRINT_SAMPLE);
        let tail = if records.len() > FINGERPRINT_SAMPLE * 2 {
            &records[records.len() - FINGERPRINT_SAMPLE..]
        } else {
            &[]
        };
        for record in head.chain(tail) {
            // Writing to a String cannot fail
            let _ = write!(sample, "{}:{}:{};", record.name, record.overall, record.club);
        }
        let _ = write!(sample, "#{}", records.len());

        Self(format!("{:016x}", xxh3_64(sample.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DatasetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builder for a cache key
#[derive(Debug, Clone)]
pub struct CacheKey {
    kind: String,
    params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Vec::new(),
        }
    }

    /// Add a request parameter; the order parameters are added in is irrelevant
    pub fn param(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Parameters sorted by name
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = self.params.clone();
        params.sort();
        params
    }

    /// `<kind>_<16 hex digits>`
    pub fn finish(&self, fingerprint: &DatasetFingerprint) -> String {
        let mut hasher = Xxh3::new();
        for (name, value) in self.params() {
            // Length prefixes keep ("ab", "c") apart from ("a", "bc")
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(&(value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        hasher.update(fingerprint.as_str().as_bytes());
        hasher.update(CACHE_VERSION.as_bytes());

        format!("{}_{:016x}", self.kind, hasher.digest())
    }
}
