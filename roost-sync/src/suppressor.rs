//! Duplicate-event suppression.
//!
//! Remembers the fingerprints of recently applied change events so that
//! redeliveries (after a reconnect, or from a second path) are recognized.
//! Memory is bounded: at most `capacity` fingerprints are held, evicted
//! oldest first, and fingerprints that fall too far behind the newest
//! commit time are dropped as well.

use crate::config::SyncConfig;
use roost_types::{Fingerprint, ServerTimestamp};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::debug;

/// Bounded set of recently seen event fingerprints.
#[derive(Debug, Clone)]
pub struct DuplicateSuppressor {
    capacity: usize,
    window: Duration,
    retention: Duration,
    /// Insertion order, oldest at the front.
    order: VecDeque<Fingerprint>,
    exact: HashSet<Fingerprint>,
    newest: Option<ServerTimestamp>,
}

impl DuplicateSuppressor {
    /// Creates a suppressor holding up to `capacity` fingerprints, treating
    /// same-kind same-record events within `window` as duplicates.
    pub fn new(capacity: usize, window: Duration, retention: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window,
            retention,
            order: VecDeque::with_capacity(capacity),
            exact: HashSet::with_capacity(capacity),
            newest: None,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.dedup_capacity,
            config.dedup_window(),
            config.dedup_retention(),
        )
    }

    /// Returns true if `fingerprint` matches one already held, either exactly
    /// or by kind and record id within the time window.
    pub fn is_duplicate(&self, fingerprint: &Fingerprint) -> bool {
        if self.exact.contains(fingerprint) {
            return true;
        }
        self.order.iter().any(|seen| {
            seen.kind == fingerprint.kind
                && seen.record_id == fingerprint.record_id
                && seen
                    .server_timestamp
                    .is_within(&fingerprint.server_timestamp, self.window)
        })
    }

    /// Records `fingerprint` if it is new. Returns whether it was new.
    pub fn observe(&mut self, fingerprint: &Fingerprint) -> bool {
        if self.is_duplicate(fingerprint) {
            debug!("Duplicate event ignored: {}", fingerprint);
            return false;
        }
        self.mark_seen(fingerprint.clone());
        true
    }

    /// Records `fingerprint` unconditionally. Idempotent.
    pub fn mark_seen(&mut self, fingerprint: Fingerprint) {
        if self.exact.contains(&fingerprint) {
            return;
        }
        let ts = fingerprint.server_timestamp;
        self.newest = Some(self.newest.map_or(ts, |newest| newest.max(ts)));
        self.exact.insert(fingerprint.clone());
        self.order.push_back(fingerprint);
        self.evict();
    }

    /// Returns true if exactly this fingerprint is held.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.exact.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.order.clear();
        self.exact.clear();
        self.newest = None;
    }

    fn evict(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.exact.remove(&oldest);
            }
        }

        let Some(newest) = self.newest else {
            return;
        };
        let cutoff = newest.saturating_sub(self.retention);
        let exact = &mut self.exact;
        self.order.retain(|fp| {
            let keep = fp.server_timestamp >= cutoff;
            if !keep {
                exact.remove(fp);
            }
            keep
        });
    }
}

impl Default for DuplicateSuppressor {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
