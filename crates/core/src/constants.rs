/// Constants shared across the datavault crates
use std::time::Duration;

// Dataset identifiers
pub const DEFAULT_MAX_ID_LENGTH: usize = 100;
pub const MAX_FILE_NAME_LENGTH: usize = 255;

// Log sanitizing
pub const MAX_LOG_FIELD_LENGTH: usize = 200;

// On-disk and object naming
pub const COMPRESSED_EXTENSION: &str = ".json.gz";
pub const PLAIN_EXTENSION: &str = ".json";
pub const DEFAULT_DATASETS_DIR: &str = "./datasets";

// Remote object store
pub const DEFAULT_BUCKET_NAME: &str = "datasets";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DATASET_OBJECT_PREFIX: &str = "datasets/";
pub const REMOTE_WORKER_COUNT: usize = 10;
pub const REMOTE_QUEUE_CAPACITY: usize = 200;
pub const REMOTE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Compression
pub const MAX_DECOMPRESSED_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 1;

// Result cache
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(90);
pub const DEFAULT_CACHE_MAX_ITEMS: usize = 750;
pub const DEFAULT_CACHE_MAX_SIZE: u64 = 32 * 1024 * 1024;
pub const DEFAULT_CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(180);
pub const CACHE_VERSION: &str = "1.1";

// Memory pressure
pub const DEFAULT_MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_WARNING_THRESHOLD_MB: u64 = 1024;
pub const DEFAULT_CRITICAL_THRESHOLD_MB: u64 = 4096;
