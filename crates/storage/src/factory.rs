//! Picks and assembles a driver from configuration

use crate::binary_codec::BinaryCodecStorage;
use crate::hybrid::HybridStorage;
use crate::local::LocalFileStorage;
use crate::memory::MemoryStorage;
use crate::remote::RemoteObjectStorage;
use crate::traits::Storage;
use datavault_codec::GzipCodec;
use datavault_core::{BackendConfig, Result, ResultExt, StorageConfig};
use std::sync::Arc;

/// Build the configured driver.
///
/// Only an invalid configuration or an unusable local directory fails; a
/// hybrid store whose directory cannot be created degrades to memory alone,
/// and an unreachable remote store runs on its memory fallback.
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    config.validate().context("storage configuration")?;
    let codec = GzipCodec::new(config.codec.compression_level, config.codec.max_decompressed_size)?;

    let backend: Arc<dyn Storage> = match &config.backend {
        BackendConfig::Memory => Arc::new(MemoryStorage::new()),
        BackendConfig::Local { dir } => Arc::new(
            LocalFileStorage::new(dir)
                .await?
                .with_codec(codec)
                .with_max_id_length(config.max_id_length),
        ),
        BackendConfig::Hybrid { dir } => match LocalFileStorage::new(dir).await {
            Ok(local) => {
                let local = local
                    .with_codec(codec)
                    .with_max_id_length(config.max_id_length);
                Arc::new(HybridStorage::from_parts(
                    Arc::new(MemoryStorage::new()),
                    Arc::new(local),
                ))
            }
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Failed to initialize hybrid storage, using in-memory storage only"
                );
                Arc::new(MemoryStorage::new())
            }
        },
        BackendConfig::Remote(remote) => Arc::new(
            RemoteObjectStorage::builder(remote.clone())
                .fallback(Arc::new(MemoryStorage::new()))
                .codec(codec)
                .max_id_length(config.max_id_length)
                .connect()
                .await,
        ),
    };

    if config.codec.enabled {
        tracing::info!(backend = backend.backend_name(), "Binary codec enabled");
        return Ok(Arc::new(BinaryCodecStorage::new(backend).with_codec(codec)));
    }

    tracing::info!(backend = backend.backend_name(), "Storage initialized");
    Ok(backend)
}
