//! Volatile in-process storage

use crate::traits::Storage;
use async_trait::async_trait;
use datavault_core::{sanitize_for_logging, Dataset, Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// Datasets held in a lock-guarded map; everything is lost on restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Dataset>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of datasets currently held
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
        let records = dataset.len();
        self.data.write().insert(id.to_string(), dataset);
        tracing::trace!(
            dataset_id = %sanitize_for_logging(id),
            records,
            "Stored dataset in memory"
        );
        Ok(())
    }

    async fn retrieve(&self, id: &str) -> Result<Dataset> {
        self.data
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.data.write().remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.data.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Memory holds no write times, so there is nothing to age out
    async fn cleanup_old_datasets(&self, _max_age: Duration, _exclude: &[String]) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
