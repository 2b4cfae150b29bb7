//! In-process LRU cache for derived results
//!
//! Entries expire passively on read and are swept on an interval. Limits on
//! item count and estimated size are enforced by evicting least recently used
//! entries. A miss never fails anything: callers recompute.

use crate::weight::CacheWeight;
use datavault_core::{sanitize_for_logging, Result, ResultCacheConfig, ResultExt};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct Entry<T> {
    value: Arc<T>,
    size: u64,
    expires_at: Option<Instant>,
}

impl<T> Entry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

struct State<T> {
    entries: LruCache<String, Entry<T>>,
    current_size: u64,
}

impl<T> State<T> {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.current_size = self.current_size.saturating_sub(entry.size);
                true
            }
            None => false,
        }
    }

    fn pop_oldest(&mut self) -> Option<u64> {
        let (_, entry) = self.entries.pop_lru()?;
        self.current_size = self.current_size.saturating_sub(entry.size);
        Some(entry.size)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }
}

struct Shared<T> {
    state: Mutex<State<T>>,
    config: ResultCacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> Shared<T> {
    /// Evict until both limits hold; `keep` names an entry that must survive
    fn enforce_limits(&self, size_limit: u64, keep: Option<&str>) -> (usize, u64) {
        let mut state = self.state.lock();
        let mut removed = 0usize;
        let mut removed_size = 0u64;

        while state.entries.len() > self.config.max_items || state.current_size > size_limit {
            let oldest_is_kept = match (keep, state.entries.peek_lru()) {
                (Some(keep), Some((key, _))) => key == keep,
                _ => false,
            };
            if oldest_is_kept && state.entries.len() == 1 {
                break;
            }
            if oldest_is_kept {
                // Refresh the protected entry so the next oldest goes instead
                if let Some(key) = keep {
                    state.entries.promote(key);
                }
            }
            match state.pop_oldest() {
                Some(size) => {
                    removed += 1;
                    removed_size += size;
                }
                None => break,
            }
        }

        if removed > 0 {
            tracing::debug!(
                removed,
                removed_mb = removed_size as f64 / (1024.0 * 1024.0),
                "LRU evicted items to enforce cache limits"
            );
        }
        (removed, removed_size)
    }
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub item_count: usize,
    pub max_items: usize,
    pub current_size: u64,
    pub max_size: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or zero before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of shared values with per-entry expiry.
///
/// Values are handed out as `Arc<T>`, so a hit never clones the value.
pub struct ResultCache<T> {
    shared: Arc<Shared<T>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<T: CacheWeight + Send + Sync + 'static> ResultCache<T> {
    pub fn new(config: ResultCacheConfig) -> Result<Self> {
        config.validate().context("result cache configuration")?;
        tracing::debug!(
            max_items = config.max_items,
            max_size_mb = config.max_size / (1024 * 1024),
            "Initialized result cache"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    entries: LruCache::unbounded(),
                    current_size: 0,
                }),
                config,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
            sweeper: Mutex::new(None),
        })
    }

    /// New cache with its background sweep already running
    pub fn with_cleanup(config: ResultCacheConfig) -> Result<Self> {
        let cache = Self::new(config)?;
        cache.start_cleanup();
        Ok(cache)
    }

    pub fn config(&self) -> &ResultCacheConfig {
        &self.shared.config
    }

    /// Look up a value, dropping it if it has expired
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let now = Instant::now();
        let hit = {
            let mut state = self.shared.state.lock();
            let lookup = state
                .entries
                .get(key)
                .map(|entry| (!entry.is_expired(now)).then(|| Arc::clone(&entry.value)));
            match lookup {
                Some(Some(value)) => Some(value),
                Some(None) => {
                    state.remove(key);
                    None
                }
                None => None,
            }
        };

        let counter = if hit.is_some() {
            &self.shared.hits
        } else {
            &self.shared.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Cache a value.
    ///
    /// `ttl = None` uses the default TTL and `Some(Duration::ZERO)` never
    /// expires. Values estimated above a quarter of the size limit are not
    /// cached; the return value says whether the value was stored.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) -> bool {
        self.insert(key.into(), Arc::new(value), ttl, false)
    }

    /// Cache a whole dataset-sized value: no per-item size check, and the
    /// cache may grow to twice its size limit to hold it
    pub fn set_dataset(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) -> bool {
        self.insert(key.into(), Arc::new(value), ttl, true)
    }

    fn insert(&self, key: String, value: Arc<T>, ttl: Option<Duration>, bypass_size_check: bool) -> bool {
        let config = &self.shared.config;
        let size = value.estimated_size();

        if !bypass_size_check && size > config.max_size / 4 {
            tracing::warn!(
                key = %sanitize_for_logging(&key),
                size_mb = size as f64 / (1024.0 * 1024.0),
                "Item too large for cache, skipping"
            );
            return false;
        }
        if bypass_size_check && size > config.max_size / 2 {
            tracing::info!(
                key = %sanitize_for_logging(&key),
                size_mb = size as f64 / (1024.0 * 1024.0),
                "Caching large dataset"
            );
        }

        let ttl = ttl.unwrap_or(config.default_ttl);
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);

        {
            let mut state = self.shared.state.lock();
            state.remove(&key);
            state.entries.put(
                key.clone(),
                Entry {
                    value,
                    size,
                    expires_at,
                },
            );
            state.current_size += size;
        }

        let size_limit = if bypass_size_check {
            config.max_size.saturating_mul(2)
        } else {
            config.max_size
        };
        self.shared.enforce_limits(size_limit, Some(&key));
        true
    }

    pub fn delete(&self, key: &str) -> bool {
        self.shared.state.lock().remove(key)
    }

    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.entries.clear();
        state.current_size = 0;
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        CacheStats {
            item_count: state.entries.len(),
            max_items: self.shared.config.max_items,
            current_size: state.current_size,
            max_size: self.shared.config.max_size,
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
        }
    }

    /// Evict the given fraction of entries, least recently used first.
    /// Returns how many were removed.
    pub fn evict_fraction(&self, fraction: f64) -> usize {
        let mut state = self.shared.state.lock();
        let len = state.entries.len();
        let target = ((len as f64) * fraction.clamp(0.0, 1.0)).ceil() as usize;

        let mut removed = 0;
        while removed < target.min(len) && state.pop_oldest().is_some() {
            removed += 1;
        }
        removed
    }

    /// Drop every expired entry now
    pub fn purge_expired(&self) -> usize {
        self.shared.state.lock().purge_expired(Instant::now())
    }

    /// Rebuild the index so memory released by evictions is returned,
    /// keeping recency order
    pub fn compact(&self) {
        let mut state = self.shared.state.lock();
        let mut rebuilt = LruCache::unbounded();
        while let Some((key, entry)) = state.entries.pop_lru() {
            rebuilt.put(key, entry);
        }
        state.entries = rebuilt;
    }

    /// Start the periodic sweep if it is configured and not already running
    pub fn start_cleanup(&self) {
        let interval = self.shared.config.cleanup_interval;
        if interval.is_zero() {
            return;
        }
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let expired = shared.state.lock().purge_expired(Instant::now());
                if expired > 0 {
                    tracing::debug!(expired, "Expired cache items");
                }
                shared.enforce_limits(shared.config.max_size, None);
            }
        }));
    }

    /// Stop the periodic sweep and wait for it to finish
    pub async fn shutdown(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            // Cancellation is the expected outcome
            let _ = handle.await;
        }
    }
}

impl<T> Drop for ResultCache<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}
