//! Background sampling loop that sheds cache entries under pressure

use super::{Compactor, MemoryLevel, MemoryMode, MemoryPressureObserver};
use crate::result_cache::ResultCache;
use crate::weight::CacheWeight;
use datavault_core::MemoryThresholds;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const WARNING_EVICT_FRACTION: f64 = 0.5;
const CRITICAL_EVICT_FRACTION: f64 = 0.9;
const WARNING_COMPACTION_PASSES: usize = 1;
const CRITICAL_COMPACTION_PASSES: usize = 3;

/// Watches process memory and evicts from a [`ResultCache`] when it climbs.
///
/// Above the warning threshold half of the cache goes, oldest first, followed
/// by one compaction pass. Above the critical threshold most of it goes,
/// followed by several passes, and compaction switches to its aggressive
/// mode until memory drops back below the warning threshold.
pub struct MemoryMonitor<T> {
    cache: Arc<ResultCache<T>>,
    observer: Arc<dyn MemoryPressureObserver>,
    compactor: Arc<dyn Compactor>,
    thresholds: MemoryThresholds,
    mode: Mutex<MemoryMode>,
}

impl<T: CacheWeight + Send + Sync + 'static> MemoryMonitor<T> {
    /// Monitor whose compaction passes compact the cache itself
    pub fn new(
        cache: Arc<ResultCache<T>>,
        observer: Arc<dyn MemoryPressureObserver>,
        thresholds: MemoryThresholds,
    ) -> Self {
        let compactor: Arc<dyn Compactor> = cache.clone();
        Self {
            cache,
            observer,
            compactor,
            thresholds,
            mode: Mutex::new(MemoryMode::Normal),
        }
    }

    pub fn with_compactor(mut self, compactor: Arc<dyn Compactor>) -> Self {
        self.compactor = compactor;
        self
    }

    pub fn mode(&self) -> MemoryMode {
        *self.mode.lock()
    }

    pub fn level_of(&self, used_bytes: u64) -> MemoryLevel {
        if used_bytes > self.thresholds.critical_bytes {
            MemoryLevel::Critical
        } else if used_bytes > self.thresholds.warning_bytes {
            MemoryLevel::Warning
        } else {
            MemoryLevel::Normal
        }
    }

    /// Take one sample and react to it
    pub fn check_once(&self) -> MemoryLevel {
        let sample = self.observer.sample();
        let level = self.level_of(sample.used_bytes);

        match level {
            MemoryLevel::Critical => {
                let removed = self.cache.evict_fraction(CRITICAL_EVICT_FRACTION);
                tracing::warn!(
                    used_mb = sample.used_mb(),
                    threshold_mb = self.thresholds.critical_bytes / (1024 * 1024),
                    removed,
                    "Critical memory usage, evicting most of the result cache"
                );
                *self.mode.lock() = MemoryMode::Aggressive;
                self.run_passes(CRITICAL_COMPACTION_PASSES);
            }
            MemoryLevel::Warning => {
                let removed = self.cache.evict_fraction(WARNING_EVICT_FRACTION);
                tracing::warn!(
                    used_mb = sample.used_mb(),
                    threshold_mb = self.thresholds.warning_bytes / (1024 * 1024),
                    removed,
                    "High memory usage, evicting half of the result cache"
                );
                self.run_passes(WARNING_COMPACTION_PASSES);
            }
            MemoryLevel::Normal => {
                let mut mode = self.mode.lock();
                if *mode == MemoryMode::Aggressive {
                    tracing::info!(used_mb = sample.used_mb(), "Memory usage back to normal");
                    *mode = MemoryMode::Normal;
                }
            }
        }

        level
    }

    fn run_passes(&self, passes: usize) {
        let mode = self.mode();
        for _ in 0..passes {
            self.compactor.run_pass(mode);
        }
    }

    /// Sample on the configured interval until the handle is shut down
    pub fn start(self: Arc<Self>) -> MonitorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let interval = self.thresholds.sample_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.check_once();
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Memory monitor stopped");
        });

        tracing::debug!(
            interval_secs = interval.as_secs(),
            "Started memory monitor"
        );
        MonitorHandle {
            stop: stop_tx,
            task: Some(task),
        }
    }
}

/// Running monitor; dropping it aborts the loop
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Signal the loop to stop and wait for it
    pub async fn shutdown(mut self) {
        // The loop may already be gone
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Memory monitor task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
