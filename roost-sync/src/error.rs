//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// None of these cross the coordinator's event loop; each handler logs and
/// classifies its own failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The realtime channel failed in a way a plain retry can fix.
    #[error("transient channel error: {0}")]
    TransientChannel(String),

    /// Server and client disagree on the message format; needs a hard reset.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The session expired and could not be refreshed.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// A change message that could not be decoded.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The authoritative fetch was rejected.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<roost_types::Error> for SyncError {
    fn from(e: roost_types::Error) -> Self {
        SyncError::MalformedEvent(e.to_string())
    }
}
