//! Memory snapshots for the run summary.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

const MB: u64 = 1024 * 1024;

/// System memory at one instant, in MB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub total_mb: u64,
    pub used_mb: u64,
    pub avail_mb: u64,
}

impl MemorySnapshot {
    /// Sample memory now. A run takes two samples, so no sampler is kept around.
    pub fn take() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        Self::from_bytes(sys.total_memory(), sys.available_memory())
    }

    fn from_bytes(total: u64, available: u64) -> Self {
        let total_mb = total / MB;
        let avail_mb = available.min(total) / MB;
        Self {
            total_mb,
            used_mb: total_mb.saturating_sub(avail_mb),
            avail_mb,
        }
    }

    /// Used-memory growth since `earlier`; negative when memory was released.
    pub fn growth_mb(&self, earlier: &MemorySnapshot) -> i64 {
        self.used_mb as i64 - earlier.used_mb as i64
    }
}
