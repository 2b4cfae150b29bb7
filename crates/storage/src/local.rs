//! Local filesystem storage: one gzip-compressed JSON file per dataset

use crate::traits::Storage;
use async_trait::async_trait;
use datavault_codec::{decode_textual, encode_textual, GzipCodec};
use datavault_core::{
    sanitize_for_logging, validate_and_join_path, validate_id, Dataset, Error, Result,
    COMPRESSED_EXTENSION, DEFAULT_MAX_ID_LENGTH, PLAIN_EXTENSION,
};
use datavault_utils::{is_temp_file, write_atomic};
use std::collections::{BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::sync::RwLock;

/// Stores each dataset as `<dir>/<id>.json.gz`.
///
/// IDs are validated before any path is built. Writes land in a temporary
/// file that is renamed into place, so a crash mid-write leaves the previous
/// version intact. Legacy uncompressed `<id>.json` files are still read,
/// listed and deleted.
#[derive(Debug)]
pub struct LocalFileStorage {
    dir: PathBuf,
    codec: GzipCodec,
    max_id_length: usize,
    // Serializes mutations against directory scans
    lock: RwLock<()>,
}

impl LocalFileStorage {
    /// Open the store, creating `dir` if needed
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(&dir, "create datasets directory", e))?;

        tracing::info!(dir = %dir.display(), "Initialized local file storage");
        Ok(Self {
            dir,
            codec: GzipCodec::default(),
            max_id_length: DEFAULT_MAX_ID_LENGTH,
            lock: RwLock::new(()),
        })
    }

    #[must_use]
    pub fn with_codec(mut self, codec: GzipCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn with_max_id_length(mut self, max_id_length: usize) -> Self {
        self.max_id_length = max_id_length;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paths_for(&self, id: &str) -> Result<(PathBuf, PathBuf)> {
        validate_id(id, self.max_id_length)?;
        let compressed = validate_and_join_path(&self.dir, &format!("{id}{COMPRESSED_EXTENSION}"))?;
        let plain = validate_and_join_path(&self.dir, &format!("{id}{PLAIN_EXTENSION}"))?;
        Ok((compressed, plain))
    }

    async fn read_existing(&self, compressed: &Path, plain: &Path) -> Result<Option<(Vec<u8>, bool)>> {
        match fs::read(compressed).await {
            Ok(bytes) => return Ok(Some((bytes, true))),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(compressed, "read dataset file", e)),
        }
        match fs::read(plain).await {
            Ok(bytes) => Ok(Some((bytes, false))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(plain, "read dataset file", e)),
        }
    }
}

/// Dataset ID for a file name, if it is one of ours
fn dataset_id_from_file_name(name: &str) -> Option<&str> {
    if is_temp_file(name) {
        return None;
    }
    name.strip_suffix(COMPRESSED_EXTENSION)
        .or_else(|| name.strip_suffix(PLAIN_EXTENSION))
        .filter(|id| !id.is_empty())
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, "remove dataset file", e)),
    }
}

#[async_trait]
impl Storage for LocalFileStorage {
    async fn store(&self, id: &str, dataset: Dataset) -> Result<()> {
        let (path, _) = self.paths_for(id)?;
        let encoded = encode_textual(&dataset, &self.codec)?;

        let _guard = self.lock.write().await;
        write_atomic(&path, &encoded.bytes).await?;

        tracing::debug!(
            dataset_id = %sanitize_for_logging(id),
            records = dataset.len(),
            original_size = encoded.stats.original_size,
            compressed_size = encoded.stats.compressed_size,
            "Stored dataset to local file"
        );
        Ok(())
    }

    async fn retrieve(&self, id: &str) -> Result<Dataset> {
        let (compressed, plain) = self.paths_for(id)?;

        let found = {
            let _guard = self.lock.read().await;
            self.read_existing(&compressed, &plain).await?
        };

        let Some((bytes, is_compressed)) = found else {
            return Err(Error::not_found(id));
        };

        let dataset = decode_textual(&bytes, is_compressed, &self.codec)?;
        tracing::debug!(
            dataset_id = %sanitize_for_logging(id),
            records = dataset.len(),
            size = bytes.len(),
            compressed = is_compressed,
            "Retrieved dataset from local file"
        );
        Ok(dataset)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let (compressed, plain) = self.paths_for(id)?;

        let _guard = self.lock.write().await;
        let compressed_result = remove_if_present(&compressed).await;
        let plain_result = remove_if_present(&plain).await;

        let removed = compressed_result? | plain_result?;
        tracing::debug!(
            dataset_id = %sanitize_for_logging(id),
            removed,
            "Deleted dataset from local storage"
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.read().await;

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, "read datasets directory", e))?;

        let mut ids = BTreeSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&self.dir, "read datasets directory", e))?
        {
            let is_file = match entry.file_type().await {
                Ok(file_type) => file_type.is_file(),
                Err(_) => false,
            };
            if !is_file {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(dataset_id_from_file_name) {
                ids.insert(id.to_string());
            }
        }

        tracing::debug!(count = ids.len(), "Listed datasets from local storage");
        Ok(ids.into_iter().collect())
    }

    async fn cleanup_old_datasets(&self, max_age: Duration, exclude: &[String]) -> Result<()> {
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return Ok(());
        };
        let exclude: HashSet<&str> = exclude.iter().map(String::as_str).collect();

        let _guard = self.lock.write().await;

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, "read datasets directory", e))?;

        let mut deleted = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&self.dir, "read datasets directory", e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(id) = dataset_id_from_file_name(name) else {
                continue;
            };

            if exclude.contains(id) {
                tracing::debug!(
                    dataset_id = %sanitize_for_logging(id),
                    "Skipping cleanup for excluded dataset"
                );
                continue;
            }

            let path = match validate_and_join_path(&self.dir, name) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(file = %sanitize_for_logging(name), error = %e, "Invalid dataset file path");
                    continue;
                }
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to stat dataset file");
                    continue;
                }
            };
            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "File system does not report modification times");
                    continue;
                }
            };

            if modified < cutoff {
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        deleted += 1;
                        tracing::debug!(file = %path.display(), "Deleted old dataset file");
                    }
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "Failed to delete old dataset file");
                    }
                }
            }
        }

        tracing::info!(deleted, "Cleanup completed for local storage");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
