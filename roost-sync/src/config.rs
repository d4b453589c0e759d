//! Tunables for the sync core.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a sync coordinator and the components it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Database schema the change stream is filtered to.
    pub schema: String,
    /// Maximum fingerprints the duplicate suppressor holds.
    pub dedup_capacity: usize,
    /// Events sharing kind and record id within this window are duplicates (ms).
    pub dedup_window_ms: u64,
    /// Fingerprints older than the newest one by more than this are evicted (ms).
    pub dedup_retention_ms: u64,
    /// How long a local write suppresses its own remote echo (ms).
    pub optimistic_ttl_ms: u64,
    /// Delay before reconnecting after a transient channel error (ms).
    pub retry_backoff_ms: u64,
    /// Delay before a fresh start after a protocol mismatch (ms).
    pub hard_reset_cooldown_ms: u64,
    /// Capacity of the notification and command channels.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            dedup_capacity: 100,
            dedup_window_ms: 10_000,
            dedup_retention_ms: 300_000,
            optimistic_ttl_ms: 5_000,
            retry_backoff_ms: 5_000,
            hard_reset_cooldown_ms: 2_000,
            event_buffer: 64,
        }
    }
}

impl SyncConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn dedup_retention(&self) -> Duration {
        Duration::from_millis(self.dedup_retention_ms)
    }

    pub fn optimistic_ttl(&self) -> Duration {
        Duration::from_millis(self.optimistic_ttl_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn hard_reset_cooldown(&self) -> Duration {
        Duration::from_millis(self.hard_reset_cooldown_ms)
    }
}
