//! Storage and cache configuration with builders and validation
//!
//! The values are owned by whoever embeds this layer; nothing here reads the
//! environment or files. Every struct deserializes with serde so the embedding
//! application can load it however it likes.

use crate::constants::*;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Which medium backs the storage layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Volatile process memory only
    Memory,
    /// One compressed file per dataset under `dir`
    Local { dir: PathBuf },
    /// Memory in front of a local directory
    Hybrid { dir: PathBuf },
    /// S3-compatible object store with a memory fallback
    Remote(RemoteConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Hybrid {
            dir: PathBuf::from(DEFAULT_DATASETS_DIR),
        }
    }
}

/// Connection settings for the remote object store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Host and optional port, without scheme
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub use_ssl: bool,
    pub region: String,
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: DEFAULT_BUCKET_NAME.to_string(),
            use_ssl: false,
            region: DEFAULT_REGION.to_string(),
            request_timeout: REMOTE_REQUEST_TIMEOUT,
        }
    }
}

impl RemoteConfig {
    /// Base URL of the endpoint, scheme included
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint.trim_end_matches('/'))
    }

    /// Whether enough is configured to attempt a connection
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.endpoint.is_empty() && !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("use_ssl", &self.use_ssl)
            .field("region", &self.region)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Binary codec settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Wrap the backend in the binary codec
    pub enabled: bool,
    /// Gzip level, 0 through 9
    pub compression_level: u32,
    /// Hard cap on decompressed bytes
    pub max_decompressed_size: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_decompressed_size: MAX_DECOMPRESSED_SIZE,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(Error::configuration(format!(
                "compression level must be between 0 and 9, got {}",
                self.compression_level
            )));
        }
        if self.max_decompressed_size == 0 {
            return Err(Error::configuration(
                "max decompressed size must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Complete storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendConfig,
    pub codec: CodecConfig,
    pub max_id_length: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            codec: CodecConfig::default(),
            max_id_length: DEFAULT_MAX_ID_LENGTH,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        self.codec.validate()?;
        if self.max_id_length == 0 || self.max_id_length > MAX_FILE_NAME_LENGTH - 8 {
            return Err(Error::configuration(format!(
                "max ID length must be between 1 and {}, got {}",
                MAX_FILE_NAME_LENGTH - 8,
                self.max_id_length
            )));
        }
        match &self.backend {
            BackendConfig::Local { dir } | BackendConfig::Hybrid { dir }
                if dir.as_os_str().is_empty() =>
            {
                Err(Error::configuration("dataset directory cannot be empty"))
            }
            BackendConfig::Remote(remote) if remote.bucket.is_empty() => {
                Err(Error::configuration("bucket name cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Builder for storage configurations
pub struct StorageConfigBuilder {
    config: StorageConfig,
}

impl StorageConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: StorageConfig::default(),
        }
    }

    pub fn memory(mut self) -> Self {
        self.config.backend = BackendConfig::Memory;
        self
    }

    pub fn local(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.backend = BackendConfig::Local { dir: dir.into() };
        self
    }

    pub fn hybrid(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.backend = BackendConfig::Hybrid { dir: dir.into() };
        self
    }

    pub fn remote(mut self, remote: RemoteConfig) -> Self {
        self.config.backend = BackendConfig::Remote(remote);
        self
    }

    /// Enable or disable the binary codec wrapper
    pub fn with_binary_codec(mut self, enabled: bool) -> Self {
        self.config.codec.enabled = enabled;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.config.codec.compression_level = level;
        self
    }

    pub fn with_max_decompressed_size(mut self, bytes: u64) -> Self {
        self.config.codec.max_decompressed_size = bytes;
        self
    }

    pub fn with_max_id_length(mut self, length: usize) -> Self {
        self.config.max_id_length = length;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<StorageConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for StorageConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory levels that trigger emergency cache eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryThresholds {
    /// Evict half the cache above this many bytes
    pub warning_bytes: u64,
    /// Evict most of the cache above this many bytes
    pub critical_bytes: u64,
    pub sample_interval: Duration,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            warning_bytes: DEFAULT_WARNING_THRESHOLD_MB * 1024 * 1024,
            critical_bytes: DEFAULT_CRITICAL_THRESHOLD_MB * 1024 * 1024,
            sample_interval: DEFAULT_MEMORY_SAMPLE_INTERVAL,
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultCacheConfig {
    pub default_ttl: Duration,
    pub max_items: usize,
    pub max_size: u64,
    /// Zero disables the background sweep
    pub cleanup_interval: Duration,
    pub memory: MemoryThresholds,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_CACHE_TTL,
            max_items: DEFAULT_CACHE_MAX_ITEMS,
            max_size: DEFAULT_CACHE_MAX_SIZE,
            cleanup_interval: DEFAULT_CACHE_CLEANUP_INTERVAL,
            memory: MemoryThresholds::default(),
        }
    }
}

impl ResultCacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(Error::configuration("max items must be greater than zero"));
        }
        if self.max_size == 0 {
            return Err(Error::configuration("max size must be greater than zero"));
        }
        if self.memory.warning_bytes >= self.memory.critical_bytes {
            return Err(Error::configuration(format!(
                "warning threshold ({} bytes) must be below critical threshold ({} bytes)",
                self.memory.warning_bytes, self.memory.critical_bytes
            )));
        }
        Ok(())
    }
}

/// Builder for result cache configurations
pub struct ResultCacheConfigBuilder {
    config: ResultCacheConfig,
}

impl ResultCacheConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResultCacheConfig::default(),
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.config.max_items = max_items;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn with_memory_thresholds(mut self, thresholds: MemoryThresholds) -> Self {
        self.config.memory = thresholds;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<ResultCacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ResultCacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_defaults() {
        let config = StorageConfigBuilder::new().build().unwrap();
        assert_eq!(config.max_id_length, DEFAULT_MAX_ID_LENGTH);
        assert!(!config.codec.enabled);
        assert_eq!(
            config.backend,
            BackendConfig::Hybrid {
                dir: PathBuf::from("./datasets")
            }
        );
    }

    #[test]
    fn test_compression_level_is_validated() {
        let err = StorageConfigBuilder::new()
            .with_binary_codec(true)
            .with_compression_level(12)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_empty_directory_rejected() {
        assert!(StorageConfigBuilder::new().local("").build().is_err());
    }

    #[test]
    fn test_remote_base_url() {
        let remote = RemoteConfig {
            endpoint: "minio.local:9000/".to_string(),
            use_ssl: true,
            ..RemoteConfig::default()
        };
        assert_eq!(remote.base_url(), "https://minio.local:9000");
        assert!(!remote.has_credentials());
        assert_eq!(remote.bucket, "datasets");
        assert_eq!(remote.region, "us-east-1");
    }

    #[test]
    fn test_remote_debug_redacts_secret() {
        let remote = RemoteConfig {
            secret_key: "hunter2".to_string(),
            ..RemoteConfig::default()
        };
        let debug = format!("{remote:?}");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_backend_config_deserializes() {
        let config: StorageConfig = serde_json::from_str(
            r#"{"backend": {"kind": "local", "dir": "/tmp/ds"}, "max_id_length": 64}"#,
        )
        .unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Local {
                dir: PathBuf::from("/tmp/ds")
            }
        );
        assert_eq!(config.max_id_length, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_thresholds_must_be_ordered() {
        let err = ResultCacheConfigBuilder::new()
            .with_memory_thresholds(MemoryThresholds {
                warning_bytes: 10,
                critical_bytes: 5,
                sample_interval: Duration::from_secs(1),
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("warning threshold"));
    }

    #[test]
    fn test_cache_defaults() {
        let config = ResultCacheConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(90));
        assert_eq!(config.max_items, 750);
        assert_eq!(config.max_size, 32 * 1024 * 1024);
        assert_eq!(config.cleanup_interval, Duration::from_secs(180));
    }
}
