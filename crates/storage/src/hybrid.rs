//! Memory in front of local files: write-through, promote on read miss

use crate::local::LocalFileStorage;
use crate::memory::MemoryStorage;
use crate::traits::Storage;
use async_trait::async_trait;
use datavault_core::{sanitize_for_logging, Dataset, Error, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Combines a fast volatile tier with a durable one.
///
/// The durable tier is the source of truth: its failures are returned to the
/// caller, while failures of the fast tier are only logged.
pub struct HybridStorage {
    memory: Arc<dyn Storage>,
    local: Arc<dyn Storage>,
}

impl HybridStorage {
    /// Memory storage in front of a local directory
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let local = LocalFileStorage::new(dir).await?;
        tracing::info!("Initialized hybrid storage (in-memory + local file fallback)");
        Ok(Self::from_parts(
            Arc::new(MemoryStorage::new()),
            Arc::new(local),
        ))
    }

    /// Assemble from arbitrary fast and durable tiers
    pub fn from_parts(memory: Arc<dyn Storage>, local: Arc<dyn Storage>) -> Self {
        Self { memory, local }
    }

    /// Merged listing that still reports what the fast tier knows when the
    /// durable tier cannot be listed
    pub async fn list_best_effort(&self) -> (Vec<String>, Option<Error>) {
        let memory_ids = match self.memory.list().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::debug!(error = %e, "Memory listing failed, continuing with local");
                Vec::new()
            }
        };

        match self.local.list().await {
            Ok(local_ids) => {
                let merged: BTreeSet<String> = memory_ids.into_iter().chain(local_ids).collect();
                (merged.into_iter().collect(), None)
            }
            Err(e) => (memory_ids, Some(e)),
        }
    }
}

#[async_trait]
impl Storage for HybridStorage {
    async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
        // The durable write decides the outcome, so validate there first and
        // keep the fast tier from holding IDs the durable tier would refuse.
        self.local.store(id, dataset.clone()).await?;

        if let Err(e) = self.memory.store(id, dataset).await {
            tracing::warn!(
                dataset_id = %sanitize_for_logging(id),
                error = %e,
                "Failed to store dataset in memory"
            );
        }
        Ok(())
    }

    async fn retrieve(&self, id: &str) -> Result<Dataset> {
        if let Ok(dataset) = self.memory.retrieve(id).await {
            tracing::debug!(dataset_id = %sanitize_for_logging(id), "Retrieved dataset from memory");
            return Ok(dataset);
        }

        tracing::debug!(
            dataset_id = %sanitize_for_logging(id),
            "Dataset not found in memory, checking persistent storage"
        );
        let dataset = self.local.retrieve(id).await?;

        let memory = Arc::clone(&self.memory);
        let promoted = dataset.clone();
        let id_owned = id.to_string();
        tokio::spawn(async move {
            match memory.store(&id_owned, promoted).await {
                Ok(()) => tracing::debug!(
                    dataset_id = %sanitize_for_logging(&id_owned),
                    "Promoted dataset into memory"
                ),
                Err(e) => tracing::warn!(
                    dataset_id = %sanitize_for_logging(&id_owned),
                    error = %e,
                    "Failed to promote dataset into memory"
                ),
            }
        });

        Ok(dataset)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if let Err(e) = self.memory.delete(id).await {
            tracing::debug!(
                dataset_id = %sanitize_for_logging(id),
                error = %e,
                "Memory delete failed"
            );
        }
        self.local.delete(id).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        match self.list_best_effort().await {
            (ids, None) => Ok(ids),
            (ids, Some(e)) => {
                tracing::warn!(
                    memory_ids = ids.len(),
                    error = %e,
                    "Local listing failed, only memory contents are known"
                );
                Err(e)
            }
        }
    }

    async fn cleanup_old_datasets(&self, max_age: Duration, exclude: &[String]) -> Result<()> {
        if let Err(e) = self.memory.cleanup_old_datasets(max_age, exclude).await {
            tracing::warn!(error = %e, "Memory cleanup failed");
        }
        self.local.cleanup_old_datasets(max_age, exclude).await
    }

    fn backend_name(&self) -> &'static str {
        "hybrid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datavault_core::Record;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn sample(name: &str) -> Dataset {
        Dataset::new(
            vec![Record {
                name: name.to_string(),
                ..Default::default()
            }],
            "€",
        )
    }

    /// A tier that refuses every call
    struct Broken;

    #[async_trait]
    impl Storage for Broken {
        async fn store(&self, _id: &str, _dataset: Dataset) -> Result<()> {
            Err(Error::backend_unavailable("broken", "down"))
        }
        async fn retrieve(&self, _id: &str) -> Result<Dataset> {
            Err(Error::backend_unavailable("broken", "down"))
        }
        async fn delete(&self, _id: &str) -> Result<()> {
            Err(Error::backend_unavailable("broken", "down"))
        }
        async fn list(&self) -> Result<Vec<String>> {
            Err(Error::backend_unavailable("broken", "down"))
        }
        async fn cleanup_old_datasets(&self, _: Duration, _: &[String]) -> Result<()> {
            Err(Error::backend_unavailable("broken", "down"))
        }
        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    /// Counts retrievals before delegating to memory
    #[derive(Default)]
    struct CountingMemory {
        inner: MemoryStorage,
        retrievals: AtomicUsize,
    }

    #[async_trait]
    impl Storage for CountingMemory {
        async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
            self.inner.store(id, dataset).await
        }
        async fn retrieve(&self, id: &str) -> Result<Dataset> {
            self.retrievals.fetch_add(1, Ordering::SeqCst);
            self.inner.retrieve(id).await
        }
        async fn delete(&self, id: &str) -> Result<()> {
            self.inner.delete(id).await
        }
        async fn list(&self) -> Result<Vec<String>> {
            self.inner.list().await
        }
        async fn cleanup_old_datasets(&self, a: Duration, e: &[String]) -> Result<()> {
            self.inner.cleanup_old_datasets(a, e).await
        }
        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_write_through() {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(MemoryStorage::new());
        let local = Arc::new(LocalFileStorage::new(dir.path()).await.unwrap());
        let hybrid = HybridStorage::from_parts(memory.clone(), local.clone());

        hybrid.store("abc", sample("Alice")).await.unwrap();

        assert_eq!(memory.retrieve("abc").await.unwrap(), sample("Alice"));
        assert_eq!(local.retrieve("abc").await.unwrap(), sample("Alice"));
    }

    #[tokio::test]
    async fn test_memory_failure_does_not_fail_store() {
        let dir = TempDir::new().unwrap();
        let local = Arc::new(LocalFileStorage::new(dir.path()).await.unwrap());
        let hybrid = HybridStorage::from_parts(Arc::new(Broken), local);

        hybrid.store("abc", sample("Alice")).await.unwrap();
        assert_eq!(hybrid.retrieve("abc").await.unwrap(), sample("Alice"));
    }

    #[tokio::test]
    async fn test_local_failure_fails_store() {
        let hybrid = HybridStorage::from_parts(Arc::new(MemoryStorage::new()), Arc::new(Broken));
        let err = hybrid.store("abc", sample("Alice")).await.unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_invalid_id_never_reaches_memory() {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(MemoryStorage::new());
        let local = Arc::new(LocalFileStorage::new(dir.path()).await.unwrap());
        let hybrid = HybridStorage::from_parts(memory.clone(), local);

        assert!(hybrid.store("../x", sample("A")).await.is_err());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_miss_promotes_into_memory() {
        let dir = TempDir::new().unwrap();
        let local = Arc::new(LocalFileStorage::new(dir.path()).await.unwrap());
        local.store("abc", sample("Alice")).await.unwrap();

        let memory = Arc::new(CountingMemory::default());
        let hybrid = HybridStorage::from_parts(memory.clone(), local);

        assert_eq!(hybrid.retrieve("abc").await.unwrap(), sample("Alice"));

        // Promotion runs on a detached task
        for _ in 0..50 {
            if !memory.inner.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(memory.inner.len(), 1);

        hybrid.retrieve("abc").await.unwrap();
        assert_eq!(memory.retrievals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_from_both() {
        let dir = TempDir::new().unwrap();
        let hybrid = HybridStorage::new(dir.path()).await.unwrap();
        hybrid.store("abc", sample("Alice")).await.unwrap();
        hybrid.delete("abc").await.unwrap();
        assert!(hybrid.retrieve("abc").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_merges_and_dedups() {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(MemoryStorage::new());
        let local = Arc::new(LocalFileStorage::new(dir.path()).await.unwrap());
        let hybrid = HybridStorage::from_parts(memory.clone(), local.clone());

        hybrid.store("both", sample("A")).await.unwrap();
        memory.store("mem-only", sample("B")).await.unwrap();
        local.store("disk-only", sample("C")).await.unwrap();

        assert_eq!(
            hybrid.list().await.unwrap(),
            vec!["both", "disk-only", "mem-only"]
        );
    }

    #[tokio::test]
    async fn test_list_reports_memory_ids_when_local_fails() {
        let memory = Arc::new(MemoryStorage::new());
        memory.store("cached", sample("A")).await.unwrap();
        let hybrid = HybridStorage::from_parts(memory, Arc::new(Broken));

        let (ids, error) = hybrid.list_best_effort().await;
        assert_eq!(ids, vec!["cached"]);
        assert!(error.is_some());
        assert!(hybrid.list().await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_memory_failure() {
        let dir = TempDir::new().unwrap();
        let local = Arc::new(LocalFileStorage::new(dir.path()).await.unwrap());
        let hybrid = HybridStorage::from_parts(Arc::new(Broken), local);
        hybrid
            .cleanup_old_datasets(Duration::from_secs(60), &[])
            .await
            .unwrap();
    }
}
