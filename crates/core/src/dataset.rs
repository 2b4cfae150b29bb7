//! The unit of storage

use crate::record::{null_as_default, Record};
use serde::{Deserialize, Serialize};

/// A named collection of records plus scalar metadata.
///
/// The ID lives outside the value; a backend maps each ID to exactly one
/// dataset and a second store under the same ID replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "players", default, deserialize_with = "null_as_default")]
    pub records: Vec<Record>,
    #[serde(default)]
    pub currency_symbol: String,
    /// Serialized derived results, set only on cache datasets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_data: Option<String>,
}

impl Dataset {
    #[must_use]
    pub fn new(records: Vec<Record>, currency_symbol: impl Into<String>) -> Self {
        Self {
            records,
            currency_symbol: currency_symbol.into(),
            cache_data: None,
        }
    }

    /// A dataset with no records that carries a serialized cache payload
    #[must_use]
    pub fn with_cache_data(cache_data: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            currency_symbol: String::new(),
            cache_data: Some(cache_data.into()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rough in-memory footprint in bytes
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.currency_symbol.len()
            + self.cache_data.as_ref().map_or(0, String::len)
            + self.records.iter().map(Record::estimated_size).sum::<usize>()
    }
}
