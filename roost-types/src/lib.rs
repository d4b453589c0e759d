//! Core type definitions for Roost.
//!
//! This crate defines the types shared by the sync engine and the rest of
//! the application:
//! - Record and user identifiers
//! - Server commit timestamps
//! - Change events and their dedup fingerprints
//! - The `Record` trait and the record shapes mirrored from the datastore
//!
//! Nothing here performs I/O.

mod event;
mod ids;
mod record;
mod timestamp;

pub use event::{ChangeEvent, ChangeKind, Fingerprint};
pub use ids::{RecordId, UserId};
pub use record::{Bird, Chick, Gender, NaturalKey, Record, UNNAMED_BIRD, UNNAMED_CHICK};
pub use timestamp::ServerTimestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("malformed row: {0}")]
    MalformedRow(String),
}
