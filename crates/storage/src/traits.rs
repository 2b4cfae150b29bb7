//! The contract every storage medium implements

use async_trait::async_trait;
use datavault_core::{Dataset, Result};
use std::sync::Arc;
use std::time::Duration;

/// CRUD contract over named datasets.
///
/// Implementations must be safe to share between tasks. A `store` replaces
/// any existing dataset under the same ID in full; readers observe either the
/// old or the new dataset, never a mix.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a dataset, replacing any previous one under `id`
    async fn store(&self, id: &str, dataset: Dataset) -> Result<()>;

    /// Retrieve a dataset, or `NotFound`
    async fn retrieve(&self, id: &str) -> Result<Dataset>;

    /// Delete a dataset; deleting a missing ID is not an error
    async fn delete(&self, id: &str) -> Result<()>;

    /// List the IDs of every stored dataset
    async fn list(&self) -> Result<Vec<String>>;

    /// Delete datasets last written more than `max_age` ago, never touching
    /// the IDs in `exclude`
    async fn cleanup_old_datasets(&self, max_age: Duration, exclude: &[String]) -> Result<()>;

    /// Short name of the medium, used in logs
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
        (**self).store(id, dataset).await
    }

    async fn retrieve(&self, id: &str) -> Result<Dataset> {
        (**self).retrieve(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        (**self).list().await
    }

    async fn cleanup_old_datasets(&self, max_age: Duration, exclude: &[String]) -> Result<()> {
        (**self).cleanup_old_datasets(max_age, exclude).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}
