//! S3-compatible object storage with a fallback driver
//!
//! Objects live at `datasets/<id>.json.gz` in a single bucket and are
//! addressed path-style. When the bucket cannot be reached at construction
//! the store runs in fallback-only mode; when an individual request fails it
//! substitutes the fallback driver for that call and logs the failure.

mod client;
mod keys;
mod worker;

use self::client::{BucketClient, ObjectMetadata};
use self::keys::{compressed_key, id_from_key, plain_key};
use self::worker::{Operation, WorkerPool};
use crate::memory::MemoryStorage;
use crate::traits::Storage;
use async_trait::async_trait;
use chrono::Utc;
use datavault_codec::{decode_textual, encode_textual, GzipCodec};
use datavault_core::{
    sanitize_for_logging, validate_id, Dataset, Error, RemoteConfig, Result,
    DATASET_OBJECT_PREFIX, DEFAULT_MAX_ID_LENGTH, REMOTE_QUEUE_CAPACITY, REMOTE_WORKER_COUNT,
};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Remote object store driver.
///
/// Besides the [`Storage`] contract it offers queued variants
/// ([`store_async`](Self::store_async) and friends) that are served by a fixed
/// pool of workers. When the queue is full the operation runs on its own task
/// instead of waiting for a slot.
pub struct RemoteObjectStorage {
    inner: Arc<RemoteInner>,
    pool: Option<WorkerPool>,
}

/// Configures and connects a [`RemoteObjectStorage`]
pub struct RemoteStorageBuilder {
    config: RemoteConfig,
    fallback: Option<Arc<dyn Storage>>,
    codec: GzipCodec,
    max_id_length: usize,
    workers: usize,
    queue_capacity: usize,
}

impl RemoteStorageBuilder {
    #[must_use]
    pub fn fallback(mut self, fallback: Arc<dyn Storage>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn codec(mut self, codec: GzipCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn max_id_length(mut self, max_id_length: usize) -> Self {
        self.max_id_length = max_id_length;
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Probe the bucket, creating it if missing.
    ///
    /// Never fails: if the endpoint cannot be used the store is returned in
    /// fallback-only mode.
    pub async fn connect(self) -> RemoteObjectStorage {
        let fallback = self
            .fallback
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()) as Arc<dyn Storage>);

        let client = match connect_client(&self.config).await {
            Ok(client) => {
                tracing::info!(
                    endpoint = %self.config.endpoint,
                    bucket = %client.bucket(),
                    "Connected to remote object storage"
                );
                Some(client)
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.config.endpoint,
                    error = %e,
                    fallback = fallback.backend_name(),
                    "Remote object storage unavailable, using fallback storage"
                );
                None
            }
        };

        let connected = client.is_some();
        let inner = Arc::new(RemoteInner {
            client,
            fallback,
            codec: self.codec,
            max_id_length: self.max_id_length,
        });
        let pool = connected
            .then(|| WorkerPool::start(Arc::clone(&inner), self.workers, self.queue_capacity));

        RemoteObjectStorage { inner, pool }
    }
}

async fn connect_client(config: &RemoteConfig) -> Result<BucketClient> {
    if !config.has_credentials() {
        return Err(Error::configuration(
            "remote endpoint and credentials are not configured",
        ));
    }

    let client = BucketClient::new(config).await;
    if client.bucket_exists().await? {
        tracing::debug!(bucket = %client.bucket(), "Bucket already exists");
    } else {
        client.create_bucket().await?;
        tracing::info!(bucket = %client.bucket(), "Created bucket");
    }
    Ok(client)
}

impl RemoteObjectStorage {
    pub fn builder(config: RemoteConfig) -> RemoteStorageBuilder {
        RemoteStorageBuilder {
            config,
            fallback: None,
            codec: GzipCodec::default(),
            max_id_length: DEFAULT_MAX_ID_LENGTH,
            workers: REMOTE_WORKER_COUNT,
            queue_capacity: REMOTE_QUEUE_CAPACITY,
        }
    }

    /// Connect with defaults and the given fallback driver
    pub async fn new(config: RemoteConfig, fallback: Arc<dyn Storage>) -> Self {
        Self::builder(config).fallback(fallback).connect().await
    }

    /// Whether the bucket is in use, as opposed to fallback-only mode
    pub fn is_connected(&self) -> bool {
        self.inner.client.is_some()
    }

    /// Queue a store; the receiver resolves once it has completed
    pub fn store_async(&self, id: impl Into<String>, dataset: Dataset) -> oneshot::Receiver<Result<()>> {
        let (done, wait) = oneshot::channel();
        self.dispatch(Operation::Store {
            id: id.into(),
            dataset,
            done,
        });
        wait
    }

    pub fn retrieve_async(&self, id: impl Into<String>) -> oneshot::Receiver<Result<Dataset>> {
        let (done, wait) = oneshot::channel();
        self.dispatch(Operation::Retrieve { id: id.into(), done });
        wait
    }

    pub fn delete_async(&self, id: impl Into<String>) -> oneshot::Receiver<Result<()>> {
        let (done, wait) = oneshot::channel();
        self.dispatch(Operation::Delete { id: id.into(), done });
        wait
    }

    /// Stop the workers after they drain the queue. Later queued calls run
    /// on their own tasks.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown().await;
        }
    }

    fn dispatch(&self, operation: Operation) {
        let operation = match &self.pool {
            Some(pool) => match pool.try_submit(operation) {
                Ok(()) => return,
                Err(operation) => operation,
            },
            None => operation,
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { operation.execute(&inner).await });
    }
}

/// State shared between the driver and its workers
pub(crate) struct RemoteInner {
    client: Option<BucketClient>,
    fallback: Arc<dyn Storage>,
    codec: GzipCodec,
    max_id_length: usize,
}

impl RemoteInner {
    #[cfg(test)]
    pub(crate) fn fallback_only(fallback: Arc<dyn Storage>) -> Self {
        Self {
            client: None,
            fallback,
            codec: GzipCodec::default(),
            max_id_length: DEFAULT_MAX_ID_LENGTH,
        }
    }

    pub(crate) async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
        validate_id(id, self.max_id_length)?;
        let Some(client) = &self.client else {
            return self.fallback.store(id, dataset).await;
        };

        let encoded = encode_textual(&dataset, &self.codec)?;
        let metadata = ObjectMetadata {
            content_type: "application/gzip",
            compression: "gzip",
            original_size: encoded.stats.original_size,
        };

        match client
            .put_object(&compressed_key(id), encoded.bytes, &metadata)
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    dataset_id = %sanitize_for_logging(id),
                    records = dataset.len(),
                    original_size = encoded.stats.original_size,
                    compressed_size = encoded.stats.compressed_size,
                    ratio = encoded.stats.ratio(),
                    "Stored dataset to remote storage"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    dataset_id = %sanitize_for_logging(id),
                    error = %e,
                    "Failed to store to remote storage, using fallback storage"
                );
                self.fallback.store(id, dataset).await?;

                // Retrieve reads the bucket first, so an older remote copy
                // would shadow the one just written to the fallback.
                remove_keys(client, id).await.map_err(|e| {
                    tracing::error!(
                        dataset_id = %sanitize_for_logging(id),
                        error = %e,
                        "Stored dataset to fallback storage but could not remove the older remote copy"
                    );
                    e
                })
            }
        }
    }

    pub(crate) async fn retrieve(&self, id: &str) -> Result<Dataset> {
        validate_id(id, self.max_id_length)?;
        let Some(client) = &self.client else {
            return self.fallback.retrieve(id).await;
        };

        match self.retrieve_from_bucket(client, id).await {
            Ok(Some(dataset)) => Ok(dataset),
            Ok(None) => {
                tracing::debug!(
                    dataset_id = %sanitize_for_logging(id),
                    "Dataset not in bucket, trying fallback storage"
                );
                self.fallback.retrieve(id).await
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(
                    dataset_id = %sanitize_for_logging(id),
                    error = %e,
                    "Failed to retrieve from remote storage, trying fallback storage"
                );
                self.fallback.retrieve(id).await
            }
        }
    }

    async fn retrieve_from_bucket(&self, client: &BucketClient, id: &str) -> Result<Option<Dataset>> {
        for (key, compressed) in [(compressed_key(id), true), (plain_key(id), false)] {
            if let Some(bytes) = client.get_object(&key, self.codec.max_decompressed()).await? {
                let dataset = decode_textual(&bytes, compressed, &self.codec)?;
                tracing::debug!(
                    dataset_id = %sanitize_for_logging(id),
                    records = dataset.len(),
                    size = bytes.len(),
                    compressed,
                    "Retrieved dataset from remote storage"
                );
                return Ok(Some(dataset));
            }
        }
        Ok(None)
    }

    pub(crate) async fn delete(&self, id: &str) -> Result<()> {
        validate_id(id, self.max_id_length)?;
        let Some(client) = &self.client else {
            return self.fallback.delete(id).await;
        };

        if let Err(e) = remove_keys(client, id).await {
            tracing::warn!(
                dataset_id = %sanitize_for_logging(id),
                error = %e,
                "Failed to delete from remote storage, using fallback storage"
            );
            return self.fallback.delete(id).await;
        }

        if let Err(e) = self.fallback.delete(id).await {
            tracing::warn!(
                dataset_id = %sanitize_for_logging(id),
                error = %e,
                "Failed to delete from fallback storage"
            );
        }
        tracing::debug!(dataset_id = %sanitize_for_logging(id), "Deleted dataset from remote storage");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let Some(client) = &self.client else {
            return self.fallback.list().await;
        };

        match client.list_objects(DATASET_OBJECT_PREFIX).await {
            Ok(objects) => {
                let ids: BTreeSet<String> = objects
                    .iter()
                    .filter_map(|object| id_from_key(&object.key))
                    .map(str::to_string)
                    .collect();
                tracing::debug!(count = ids.len(), "Listed datasets from remote storage");
                Ok(ids.into_iter().collect())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list remote storage, using fallback storage");
                self.fallback.list().await
            }
        }
    }

    async fn cleanup_old_datasets(&self, max_age: Duration, exclude: &[String]) -> Result<()> {
        let Some(client) = &self.client else {
            return self.fallback.cleanup_old_datasets(max_age, exclude).await;
        };

        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(());
        };
        let excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();

        let objects = client.list_objects(DATASET_OBJECT_PREFIX).await?;
        let mut deleted = 0usize;
        for object in &objects {
            let Some(id) = id_from_key(&object.key) else {
                continue;
            };
            if excluded.contains(id) {
                tracing::debug!(dataset_id = %sanitize_for_logging(id), "Skipping cleanup for excluded dataset");
                continue;
            }
            let Some(last_modified) = object.last_modified else {
                tracing::warn!(key = %sanitize_for_logging(&object.key), "Object has no readable modification time");
                continue;
            };
            if last_modified >= cutoff {
                continue;
            }

            match client.delete_object(&object.key).await {
                Ok(()) => {
                    tracing::info!(
                        dataset_id = %sanitize_for_logging(id),
                        last_modified = %last_modified.to_rfc3339(),
                        "Deleted old dataset"
                    );
                    deleted += 1;
                }
                Err(e) => tracing::warn!(
                    dataset_id = %sanitize_for_logging(id),
                    error = %e,
                    "Failed to delete old dataset from remote storage"
                ),
            }
        }

        if let Err(e) = self.fallback.cleanup_old_datasets(max_age, exclude).await {
            tracing::warn!(error = %e, "Fallback cleanup failed");
        }

        tracing::info!(deleted, "Remote storage cleanup completed");
        Ok(())
    }
}

/// Delete both the compressed and the legacy plain object for `id`
async fn remove_keys(client: &BucketClient, id: &str) -> Result<()> {
    client.delete_object(&compressed_key(id)).await?;
    client.delete_object(&plain_key(id)).await
}

#[async_trait]
impl Storage for RemoteObjectStorage {
    async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
        self.inner.store(id, dataset).await
    }

    async fn retrieve(&self, id: &str) -> Result<Dataset> {
        self.inner.retrieve(id).await
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
        "remote"
    }
}
