//! The merged, de-duplicated record collection.
//!
//! Records are kept most-recent-first. The collection never holds two
//! records with the same id: every mutation goes through an id check.

use roost_types::{NaturalKey, Record, RecordId};
use std::collections::HashSet;

/// Ordered set of records keyed by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<R> {
    records: Vec<R>,
    /// Ids written locally and not yet seen from the datastore.
    local: HashSet<RecordId>,
}

impl<R> Default for Collection<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            local: HashSet::new(),
        }
    }
}

impl<R: Record> Collection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from records in the given order. Later copies of
    /// an id already seen are dropped.
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let mut collection = Self::new();
        for record in records {
            if !collection.contains(record.id()) {
                collection.records.push(record);
            }
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.iter()
    }

    /// Snapshot of the records in order.
    pub fn to_vec(&self) -> Vec<R> {
        self.records.clone()
    }

    /// Finds a record with the same natural key as `key`.
    pub fn find_by_natural_key(&self, key: &NaturalKey) -> Option<&R> {
        self.records
            .iter()
            .find(|r| r.natural_key().as_ref() == Some(key))
    }

    /// Inserts at the front. Returns false, leaving the collection unchanged,
    /// if the id is already present.
    pub fn push_front(&mut self, record: R) -> bool {
        if self.contains(record.id()) {
            return false;
        }
        self.local.remove(record.id());
        self.records.insert(0, record);
        true
    }

    /// Replaces the record with the same id in place. Returns false if the
    /// id is absent.
    pub fn replace(&mut self, record: R) -> bool {
        match self.position(record.id()) {
            Some(index) => {
                self.local.remove(record.id());
                self.records[index] = record;
                true
            }
            None => false,
        }
    }

    /// Replaces in place if present, otherwise inserts at the front.
    pub fn upsert(&mut self, record: R) {
        self.local.remove(record.id());
        self.place(record);
    }

    /// Like [`upsert`](Self::upsert), but marks the record as local until
    /// the datastore reports it.
    pub fn upsert_local(&mut self, record: R) {
        self.local.insert(record.id().clone());
        self.place(record);
    }

    /// Whether `id` was written locally and not yet seen from the datastore.
    pub fn is_local(&self, id: &RecordId) -> bool {
        self.local.contains(id)
    }

    fn place(&mut self, record: R) {
        if let Some(index) = self.position(record.id()) {
            self.records[index] = record;
        } else {
            self.records.insert(0, record);
        }
    }

    /// Removes the record with `id`, returning it.
    pub fn remove(&mut self, id: &RecordId) -> Option<R> {
        self.local.remove(id);
        self.position(id).map(|index| self.records.remove(index))
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.local.clear();
    }

    /// Replaces the contents with an authoritative load.
    ///
    /// Authoritative records come first in the order given and always win
    /// over a held record with the same id. Local writes the load does not
    /// mention yet are kept after them, in their existing order. Any other
    /// held record missing from the load was deleted remotely and is dropped.
    pub fn merge_authoritative(&mut self, authoritative: Vec<R>) -> usize {
        let held = std::mem::take(&mut self.records);
        let local = std::mem::take(&mut self.local);
        *self = Self::from_records(authoritative);
        let mut preserved = 0;
        for record in held {
            if local.contains(record.id()) && !self.contains(record.id()) {
                self.local.insert(record.id().clone());
                self.records.push(record);
                preserved += 1;
            }
        }
        preserved
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }
}

impl<R> IntoIterator for Collection<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
