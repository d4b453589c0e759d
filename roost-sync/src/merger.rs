//! Record merger - applies change events to the collection.
//!
//! One function per event kind. Each consults the duplicate suppressor and
//! the optimistic-write tracker and then mutates the collection. Everything
//! here is synchronous and free of I/O and timers beyond reading the clock
//! through the tracker.

use crate::collection::Collection;
use crate::optimistic::OptimisticWriteTracker;
use crate::suppressor::DuplicateSuppressor;
use roost_types::{ChangeEvent, ChangeKind, Record, RecordId};
use tracing::{debug, warn};

/// What applying one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The fingerprint was already seen; nothing changed.
    Duplicate,
    /// A new record was added at the front.
    Inserted,
    /// An existing record was replaced in place.
    Updated,
    /// A record was removed.
    Removed,
    /// The event confirmed a pending local write.
    Confirmed {
        /// The collection changed because the confirmed payload differed
        /// from (or replaced a missing) optimistic copy.
        changed: bool,
    },
    /// An insert for an id already present.
    AlreadyPresent,
    /// An insert matching an existing record by natural key.
    NaturalKeyConflict { existing: RecordId },
    /// A delete for an id not present.
    NotPresent,
    /// An insert or update without a row.
    MissingPayload,
}

impl MergeOutcome {
    /// Returns true if the collection was modified.
    pub fn changed(&self) -> bool {
        match self {
            Self::Inserted | Self::Updated | Self::Removed => true,
            Self::Confirmed { changed } => *changed,
            _ => false,
        }
    }
}

/// Applies change events to a collection.
pub struct RecordMerger<'a, R> {
    collection: &'a mut Collection<R>,
    tracker: &'a mut OptimisticWriteTracker,
    suppressor: &'a mut DuplicateSuppressor,
}

impl<'a, R: Record> RecordMerger<'a, R> {
    pub fn new(
        collection: &'a mut Collection<R>,
        tracker: &'a mut OptimisticWriteTracker,
        suppressor: &'a mut DuplicateSuppressor,
    ) -> Self {
        Self {
            collection,
            tracker,
            suppressor,
        }
    }

    /// Applies a single event.
    pub fn apply(&mut self, event: ChangeEvent<R>) -> MergeOutcome {
        let outcome = match event.kind {
            ChangeKind::Insert => self.apply_insert(event),
            ChangeKind::Update => self.apply_update(event),
            ChangeKind::Delete => self.apply_delete(event),
        };
        debug!("Merge outcome: {:?}", outcome);
        outcome
    }

    pub fn apply_insert(&mut self, event: ChangeEvent<R>) -> MergeOutcome {
        if !self.suppressor.observe(&event.fingerprint()) {
            return MergeOutcome::Duplicate;
        }
        let Some(record) = event.payload else {
            warn!("Insert for {} arrived without a row", event.record_id);
            return MergeOutcome::MissingPayload;
        };

        if self.tracker.is_pending(record.id()) {
            self.tracker.clear(record.id());
            let unchanged = self
                .collection
                .get(record.id())
                .map(|existing| *existing == record);
            let changed = match unchanged {
                Some(true) => false,
                Some(false) => self.collection.replace(record),
                None => self.collection.push_front(record),
            };
            debug!("Insert confirmed a pending local write (changed={})", changed);
            return MergeOutcome::Confirmed { changed };
        }

        if self.collection.contains(record.id()) {
            debug!("Record {} already present, skipping insert", record.id());
            return MergeOutcome::AlreadyPresent;
        }

        if let Some(key) = record.natural_key() {
            if let Some(existing) = self.collection.find_by_natural_key(&key) {
                debug!(
                    "Record {} matches {} by natural key, skipping insert",
                    record.id(),
                    existing.id()
                );
                return MergeOutcome::NaturalKeyConflict {
                    existing: existing.id().clone(),
                };
            }
        }

        self.collection.push_front(record);
        MergeOutcome::Inserted
    }

    pub fn apply_update(&mut self, event: ChangeEvent<R>) -> MergeOutcome {
        if !self.suppressor.observe(&event.fingerprint()) {
            return MergeOutcome::Duplicate;
        }
        let Some(record) = event.payload else {
            warn!("Update for {} arrived without a row", event.record_id);
            return MergeOutcome::MissingPayload;
        };

        let confirmed = self.tracker.is_pending(record.id());
        self.tracker.clear(record.id());

        // Local state may have missed the original insert.
        if !self.collection.contains(record.id()) {
            debug!("Updated record {} not held locally, inserting", record.id());
            self.collection.push_front(record);
            return if confirmed {
                MergeOutcome::Confirmed { changed: true }
            } else {
                MergeOutcome::Inserted
            };
        }

        if confirmed {
            let changed = self.collection.get(record.id()) != Some(&record);
            self.collection.replace(record);
            return MergeOutcome::Confirmed { changed };
        }

        self.collection.replace(record);
        MergeOutcome::Updated
    }

    pub fn apply_delete(&mut self, event: ChangeEvent<R>) -> MergeOutcome {
        if !self.suppressor.observe(&event.fingerprint()) {
            return MergeOutcome::Duplicate;
        }
        self.tracker.clear(&event.record_id);
        match self.collection.remove(&event.record_id) {
            Some(_) => MergeOutcome::Removed,
            None => MergeOutcome::NotPresent,
        }
    }
}
