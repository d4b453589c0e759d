//! Realtime sync core for Roost.
//!
//! Keeps an in-memory collection of a user's records (birds, chicks)
//! consistent with the datastore. Two sources feed it:
//! - A one-shot authoritative load over HTTP
//! - A live stream of row changes over a realtime channel
//!
//! # Architecture
//!
//! Local writes are shown immediately (optimistically) and their remote
//! echoes are recognised as confirmations. Redelivered or repeated change
//! messages are suppressed by fingerprint, so replays after a reconnect
//! never duplicate a record.
//!
//! ## Components
//!
//! - **Source**: One realtime subscription per user, with retry and hard reset
//! - **Suppressor**: Bounded set of recently seen event fingerprints
//! - **Optimistic**: Pending local writes with a short TTL
//! - **Merger**: Applies insert/update/delete events to the collection
//! - **Loader**: Authoritative fetch with a single session refresh
//! - **Coordinator**: The event loop that owns all of the above
//!
//! # Example
//!
//! ```no_run
//! use roost_sync::channel::mock::MockRealtime;
//! use roost_sync::{create_coordinator, RestBackend, RestConfig, SubscriptionRegistry, SyncConfig};
//! use roost_types::{Bird, UserId};
//! use std::sync::Arc;
//!
//! # async fn demo() -> roost_sync::SyncResult<()> {
//! let backend = Arc::new(RestBackend::new(RestConfig::default())?);
//! let (handle, _events, commands, coordinator) = create_coordinator::<Bird>(
//!     Arc::new(MockRealtime::new()),
//!     backend.clone(),
//!     backend,
//!     SubscriptionRegistry::new(),
//!     SyncConfig::default(),
//! );
//! tokio::spawn(coordinator.run(commands));
//!
//! handle.switch_user(Some(UserId::new("user-1"))).await?;
//! let birds = handle.collection();
//! # let _ = birds;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod channel;
pub mod collection;
mod config;
pub mod coordinator;
mod error;
pub mod loader;
pub mod merger;
pub mod optimistic;
pub mod protocol;
pub mod registry;
pub mod rest;
pub mod source;
pub mod suppressor;

pub use auth::{Session, SessionProvider};
pub use channel::{ChannelHandle, ChannelId, ChannelTopic, RealtimeClient};
pub use collection::Collection;
pub use config::SyncConfig;
pub use coordinator::{create_coordinator, CoordinatorHandle, SyncCommand, SyncCoordinator, SyncEvent};
pub use error::{SyncError, SyncResult};
pub use loader::{BulkLoader, LoadSummary, RecordSource};
pub use merger::{MergeOutcome, RecordMerger};
pub use optimistic::OptimisticWriteTracker;
pub use protocol::{
    decode_change, ChannelError, ChannelErrorCode, ChannelMessage, ChannelStatus, ErrorClass,
    RawChangeMessage, BINDING_MISMATCH_PATTERN,
};
pub use registry::{SubscriptionGuard, SubscriptionRegistry};
pub use rest::{RestBackend, RestConfig};
pub use source::{ChangeEventSource, SubscriptionState};
pub use suppressor::DuplicateSuppressor;
