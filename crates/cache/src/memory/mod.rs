//! Memory pressure handling for the result cache
//!
//! An observer samples how much memory the process uses; the
//! [`MemoryMonitor`] compares samples against [`MemoryThresholds`] and sheds
//! cache entries when they are crossed.
//!
//! [`MemoryThresholds`]: datavault_core::MemoryThresholds

pub mod monitor;

pub use monitor::{MemoryMonitor, MonitorHandle};

use crate::result_cache::ResultCache;
use crate::weight::CacheWeight;
use parking_lot::Mutex;
use sysinfo::{Pid, System};

/// One reading of process memory use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub used_bytes: u64,
}

impl MemorySample {
    pub fn used_mb(&self) -> u64 {
        self.used_bytes / (1024 * 1024)
    }
}

/// Source of memory samples
pub trait MemoryPressureObserver: Send + Sync {
    fn sample(&self) -> MemorySample;
}

/// Pressure level of a sample relative to the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryLevel {
    Normal,
    Warning,
    Critical,
}

/// Whether compaction is running in its relaxed or aggressive form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Normal,
    Aggressive,
}

/// A pass that returns memory held by the process after eviction
pub trait Compactor: Send + Sync {
    fn run_pass(&self, mode: MemoryMode);
}

impl<T: CacheWeight + Send + Sync + 'static> Compactor for ResultCache<T> {
    fn run_pass(&self, mode: MemoryMode) {
        let expired = self.purge_expired();
        self.compact();
        tracing::debug!(expired, ?mode, "Compacted result cache");
    }
}

/// Resident memory of the current process, read through `sysinfo`.
///
/// Falls back to system-wide used memory when the process cannot be found.
pub struct SystemMemoryObserver {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SystemMemoryObserver {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = e, "Cannot determine current process, sampling system memory");
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for SystemMemoryObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPressureObserver for SystemMemoryObserver {
    fn sample(&self) -> MemorySample {
        let mut system = self.system.lock();

        if let Some(pid) = self.pid {
            if system.refresh_process(pid) {
                if let Some(process) = system.process(pid) {
                    return MemorySample {
                        used_bytes: process.memory(),
                    };
                }
            }
        }

        system.refresh_memory();
        MemorySample {
            used_bytes: system.used_memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_observer_reports_usage() {
        let sample = SystemMemoryObserver::new().sample();
        assert!(sample.used_bytes > 0);
    }

    #[test]
    fn test_levels_order() {
        assert!(MemoryLevel::Critical > MemoryLevel::Warning);
        assert!(MemoryLevel::Warning > MemoryLevel::Normal);
    }
}
