//! Admin API response types.

use serde::{Deserialize, Serialize};

/// Snapshot of the lock manager's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockStatsResponse {
    pub active_locks: usize,
    pub total_locks_acquired: u64,
    pub total_timeouts: u64,
    pub average_wait_time_ms: f64,
}

/// Result of `POST /admin/locks/clear`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearLocksResponse {
    pub cleared: usize,
}
