//! Optimistic-write tracking.
//!
//! When the CRUD layer starts a create or update it registers the record id
//! here. For a short TTL the remote echo of that write is treated as
//! confirmation rather than as a new record. Each entry owns a deadline;
//! the coordinator's loop polls [`OptimisticWriteTracker::next_expired`] to
//! retire entries, and `clear`/`track` remove or replace the deadline, so a
//! confirmed entry can never be expired afterwards.

use crate::config::SyncConfig;
use roost_types::RecordId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Set of record ids with a pending local write.
#[derive(Debug, Clone)]
pub struct OptimisticWriteTracker {
    ttl: Duration,
    deadlines: HashMap<RecordId, Instant>,
}

impl OptimisticWriteTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            deadlines: HashMap::new(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.optimistic_ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Starts, or restarts, the TTL for `record_id`. Returns the new deadline.
    pub fn track(&mut self, record_id: RecordId) -> Instant {
        let expires_at = Instant::now() + self.ttl;
        if self.deadlines.insert(record_id.clone(), expires_at).is_some() {
            debug!("Optimistic write re-tracked, deadline reset: {}", record_id);
        } else {
            debug!("Optimistic write tracked: {}", record_id);
        }
        expires_at
    }

    /// Returns true while a write for `record_id` is pending and unexpired.
    pub fn is_pending(&self, record_id: &RecordId) -> bool {
        self.deadlines
            .get(record_id)
            .is_some_and(|expires_at| Instant::now() < *expires_at)
    }

    /// Removes the entry for `record_id`. Returns whether one existed.
    pub fn clear(&mut self, record_id: &RecordId) -> bool {
        self.deadlines.remove(record_id).is_some()
    }

    /// Removes every entry.
    pub fn clear_all(&mut self) {
        self.deadlines.clear();
    }

    /// Deadline of the entry for `record_id`, if tracked.
    pub fn expires_at(&self, record_id: &RecordId) -> Option<Instant> {
        self.deadlines.get(record_id).copied()
    }

    pub fn pending_ids(&self) -> Vec<RecordId> {
        self.deadlines.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Waits for the earliest deadline, removes that entry and returns its id.
    ///
    /// Never resolves while nothing is tracked. Cancel safe: dropping the
    /// future before it resolves leaves the tracker untouched.
    pub async fn next_expired(&mut self) -> RecordId {
        let earliest = self
            .deadlines
            .iter()
            .min_by_key(|(_, expires_at)| **expires_at)
            .map(|(id, expires_at)| (id.clone(), *expires_at));

        let Some((record_id, expires_at)) = earliest else {
            return std::future::pending().await;
        };

        tokio::time::sleep_until(expires_at).await;
        self.deadlines.remove(&record_id);
        debug!("Optimistic write expired: {}", record_id);
        record_id
    }
}

impl Default for OptimisticWriteTracker {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
