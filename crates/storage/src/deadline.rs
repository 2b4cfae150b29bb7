//! Deadlines for storage calls
//!
//! An elapsed deadline drops the in-flight future, which aborts whatever I/O
//! it was waiting on, and yields `Timeout`.

use crate::traits::Storage;
use async_trait::async_trait;
use datavault_core::{Dataset, Error, Result};
use datavault_utils::tracing::storage_span;
use std::future::Future;
use std::time::Duration;
use tracing::Instrument;

async fn with_deadline<T>(
    operation: &'static str,
    deadline: Duration,
    future: impl Future<Output = Result<T>> + Send,
) -> Result<T> {
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, deadline_ms = deadline.as_millis() as u64, "Storage operation timed out");
            Err(Error::timeout(operation, deadline))
        }
    }
}

/// Deadline-bounded variants of every [`Storage`] operation
#[async_trait]
pub trait StorageExt: Storage {
    async fn store_with_deadline(&self, id: &str, dataset: Dataset, deadline: Duration) -> Result<()> {
        let span = storage_span("store", self.backend_name(), id);
        with_deadline("store", deadline, self.store(id, dataset).instrument(span)).await
    }

    async fn retrieve_with_deadline(&self, id: &str, deadline: Duration) -> Result<Dataset> {
        let span = storage_span("retrieve", self.backend_name(), id);
        with_deadline("retrieve", deadline, self.retrieve(id).instrument(span)).await
    }

    async fn delete_with_deadline(&self, id: &str, deadline: Duration) -> Result<()> {
        let span = storage_span("delete", self.backend_name(), id);
        with_deadline("delete", deadline, self.delete(id).instrument(span)).await
    }

    async fn list_with_deadline(&self, deadline: Duration) -> Result<Vec<String>> {
        with_deadline("list", deadline, self.list()).await
    }

    async fn cleanup_with_deadline(
        &self,
        max_age: Duration,
        exclude: &[String],
        deadline: Duration,
    ) -> Result<()> {
        with_deadline(
            "cleanup",
            deadline,
            self.cleanup_old_datasets(max_age, exclude),
        )
        .await
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// Applies one deadline to every call of the wrapped driver
pub struct DeadlineStorage<S> {
    inner: S,
    deadline: Duration,
}

impl<S: Storage> DeadlineStorage<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[async_trait]
impl<S: Storage> Storage for DeadlineStorage<S> {
    async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
        self.inner.store_with_deadline(id, dataset, self.deadline).await
    }

    async fn retrieve(&self, id: &str) -> Result<Dataset> {
        self.inner.retrieve_with_deadline(id, self.deadline).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete_with_deadline(id, self.deadline).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.inner.list_with_deadline(self.deadline).await
    }

    async fn cleanup_old_datasets(&self, max_age: Duration, exclude: &[String]) -> Result<()> {
        self.inner
            .cleanup_with_deadline(max_age, exclude, self.deadline)
            .await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    /// Never answers within any reasonable deadline
    struct Stalled;

    #[async_trait]
    impl Storage for Stalled {
        async fn store(&self, _id: &str, _dataset: Dataset) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        async fn retrieve(&self, id: &str) -> Result<Dataset> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(Error::not_found(id))
        }
        async fn delete(&self, _id: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        async fn list(&self) -> Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
        async fn cleanup_old_datasets(&self, _: Duration, _: &[String]) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        fn backend_name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_is_timeout() {
        let err = Stalled
            .retrieve_with_deadline("abc", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { ref operation, .. } if operation == "retrieve"));
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_decorator_applies_deadline_everywhere() {
        let storage = DeadlineStorage::new(Stalled, Duration::from_millis(10));
        assert!(matches!(
            storage.store("a", Dataset::default()).await,
            Err(Error::Timeout { .. })
        ));
        assert!(matches!(storage.list().await, Err(Error::Timeout { .. })));
        assert!(matches!(
            storage.cleanup_old_datasets(Duration::ZERO, &[]).await,
            Err(Error::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_fast_calls_pass_through() {
        let storage = DeadlineStorage::new(MemoryStorage::new(), Duration::from_secs(5));
        storage.store("a", Dataset::default()).await.unwrap();
        assert_eq!(storage.retrieve("a").await.unwrap(), Dataset::default());
        assert_eq!(storage.list().await.unwrap(), vec!["a"]);
        storage.delete("a").await.unwrap();
        assert_eq!(storage.backend_name(), "memory");
    }
}
