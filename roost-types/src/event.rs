//! Change events pushed by the datastore.
//!
//! A change event describes one committed Insert, Update or Delete of a
//! record. Events are delivered at-least-once and, across reconnects, in no
//! particular order, so each one carries a fingerprint that identifies
//! redeliveries of the same commit.

use crate::{RecordId, ServerTimestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Wire name used by the realtime channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(crate::Error::MalformedRow(format!(
                "unknown event type {other:?}"
            ))),
        }
    }
}

/// Dedup key of a change event: `(kind, record_id, server_timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub kind: ChangeKind,
    pub record_id: RecordId,
    pub server_timestamp: ServerTimestamp,
}

impl Fingerprint {
    #[must_use]
    pub fn new(kind: ChangeKind, record_id: RecordId, server_timestamp: ServerTimestamp) -> Self {
        Self {
            kind,
            record_id,
            server_timestamp,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.kind, self.record_id, self.server_timestamp)
    }
}

/// A change to one record, as delivered by the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<R> {
    /// What happened.
    pub kind: ChangeKind,

    /// The record the change applies to.
    pub record_id: RecordId,

    /// The new row for Insert/Update. Always `None` for Delete.
    pub payload: Option<R>,

    /// Commit time assigned by the datastore.
    pub server_timestamp: ServerTimestamp,

    /// Position in receipt order on the connection that delivered it.
    pub delivery_sequence: u64,
}

impl<R> ChangeEvent<R> {
    /// Creates an insert event.
    #[must_use]
    pub fn insert(
        record_id: RecordId,
        payload: R,
        server_timestamp: ServerTimestamp,
        delivery_sequence: u64,
    ) -> Self {
        Self {
            kind: ChangeKind::Insert,
            record_id,
            payload: Some(payload),
            server_timestamp,
            delivery_sequence,
        }
    }

    /// Creates an update event.
    #[must_use]
    pub fn update(
        record_id: RecordId,
        payload: R,
        server_timestamp: ServerTimestamp,
        delivery_sequence: u64,
    ) -> Self {
        Self {
            kind: ChangeKind::Update,
            record_id,
            payload: Some(payload),
            server_timestamp,
            delivery_sequence,
        }
    }

    /// Creates a delete event.
    #[must_use]
    pub fn delete(
        record_id: RecordId,
        server_timestamp: ServerTimestamp,
        delivery_sequence: u64,
    ) -> Self {
        Self {
            kind: ChangeKind::Delete,
            record_id,
            payload: None,
            server_timestamp,
            delivery_sequence,
        }
    }

    /// Derives the dedup fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.kind, self.record_id.clone(), self.server_timestamp)
    }

    /// Returns a copy with a different delivery sequence. Redelivery after a
    /// reconnect keeps the fingerprint but not the sequence.
    #[must_use]
    pub fn redelivered(&self, delivery_sequence: u64) -> Self
    where
        R: Clone,
    {
        Self {
            delivery_sequence,
            ..self.clone()
        }
    }
}
