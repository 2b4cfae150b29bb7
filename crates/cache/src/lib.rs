//! Short-lived cache for results derived from datasets.
//!
//! - [`ResultCache`]: in-process LRU with per-entry expiry and size limits.
//! - [`CacheKey`] / [`DatasetFingerprint`]: keys that change whenever the
//!   dataset a result was computed from changes.
//! - [`PersistentResultStore`]: results kept across restarts through any
//!   storage driver.
//! - [`MemoryMonitor`]: sheds cache entries when process memory climbs.
//!
//! Nothing here is allowed to fail a caller: a problem is a miss, and the
//! caller recomputes.

pub mod keys;
pub mod memory;
pub mod persistent;
pub mod result_cache;
pub mod weight;

pub use keys::{CacheKey, DatasetFingerprint};
pub use memory::{
    Compactor, MemoryLevel, MemoryMode, MemoryMonitor, MemoryPressureObserver, MemorySample,
    MonitorHandle, SystemMemoryObserver,
};
pub use persistent::{CacheEnvelope, PersistentResultStore};
pub use result_cache::{CacheStats, ResultCache};
pub use weight::CacheWeight;
