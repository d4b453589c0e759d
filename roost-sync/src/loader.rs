//! Bulk loader - authoritative fetch of a user's records.
//!
//! A load makes sure the session is usable (refreshing it at most once),
//! fetches every row for the user, and merges the result with what the
//! collection already holds. Records held locally but missing from the
//! fetch survive the merge: they are writes that have not round-tripped.

use crate::auth::{Session, SessionProvider};
use crate::collection::Collection;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use roost_types::{Record, UserId};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The authoritative store of record rows.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches every row of `table` owned by `user`, newest first.
    async fn fetch_all(&self, table: &str, user: &UserId, session: &Session) -> SyncResult<Vec<Value>>;
}

/// Counts from one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    /// Rows decoded from the fetch.
    pub fetched: usize,
    /// Rows skipped because they failed to decode.
    pub skipped: usize,
    /// Held records kept because the fetch did not include them.
    pub preserved: usize,
}

impl LoadSummary {
    /// Size of the collection after the merge.
    pub fn total(&self) -> usize {
        self.fetched + self.preserved
    }
}

/// Loads the authoritative collection for one record type.
pub struct BulkLoader<R> {
    records: Arc<dyn RecordSource>,
    sessions: Arc<dyn SessionProvider>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> BulkLoader<R> {
    pub fn new(records: Arc<dyn RecordSource>, sessions: Arc<dyn SessionProvider>) -> Self {
        Self {
            records,
            sessions,
            _record: PhantomData,
        }
    }

    /// Fetches and decodes `user`'s records without touching local state.
    ///
    /// Returns [`SyncError::AuthExpired`] when there is no session, or the
    /// session is expired and the one refresh attempt fails.
    pub async fn fetch(&self, user: &UserId) -> SyncResult<(Vec<R>, usize)> {
        let (session, refreshed) = self.usable_session().await?;

        let rows = match self.records.fetch_all(R::TABLE, user, &session).await {
            Err(SyncError::AuthExpired(reason)) if !refreshed => {
                info!("Fetch rejected the session ({}), refreshing once", reason);
                let session = self.refresh().await?;
                self.records.fetch_all(R::TABLE, user, &session).await?
            }
            other => other?,
        };

        let mut skipped = 0;
        let decoded: Vec<R> = rows
            .into_iter()
            .filter_map(|row| match R::from_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping undecodable {} row: {}", R::TABLE, e);
                    skipped += 1;
                    None
                }
            })
            .collect();
        Ok((decoded, skipped))
    }

    /// Loads and merges with `held`, returning the merged records in order.
    pub async fn load(&self, user: &UserId, held: &Collection<R>) -> SyncResult<Vec<R>> {
        let mut merged = held.clone();
        self.load_into(user, &mut merged).await?;
        Ok(merged.to_vec())
    }

    /// Loads and merges into `collection` in place.
    ///
    /// On [`SyncError::AuthExpired`] the collection is cleared. On any other
    /// failure it is left untouched.
    pub async fn load_into(&self, user: &UserId, collection: &mut Collection<R>) -> SyncResult<LoadSummary> {
        let (fetched, skipped) = match self.fetch(user).await {
            Ok(result) => result,
            Err(e @ SyncError::AuthExpired(_)) => {
                warn!("Session expired, clearing {} collection", R::TABLE);
                collection.clear();
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let fetched_count = fetched.len();
        let preserved = collection.merge_authoritative(fetched);
        let summary = LoadSummary {
            fetched: fetched_count,
            skipped,
            preserved,
        };
        info!(
            "Loaded {} {} for user {} ({} local kept, {} skipped)",
            summary.fetched,
            R::TABLE,
            user,
            summary.preserved,
            summary.skipped
        );
        Ok(summary)
    }

    /// The current session, refreshed if expired. The flag reports whether
    /// a refresh already happened.
    async fn usable_session(&self) -> SyncResult<(Session, bool)> {
        let session = self
            .sessions
            .current()
            .await
            .ok_or_else(|| SyncError::AuthExpired("no active session".to_string()))?;

        if !session.is_expired() {
            return Ok((session, false));
        }

        debug!("Session expired, attempting refresh");
        Ok((self.refresh().await?, true))
    }

    async fn refresh(&self) -> SyncResult<Session> {
        self.sessions.refresh().await.map_err(|e| {
            warn!("Session refresh failed: {}", e);
            match e {
                e @ SyncError::AuthExpired(_) => e,
                other => SyncError::AuthExpired(other.to_string()),
            }
        })
    }
}

/// A record source for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct MockSourceState {
        rows: Vec<Value>,
        failures: VecDeque<SyncError>,
        requests: Vec<(String, UserId, String)>,
    }

    /// Serves a fixed set of rows, optionally failing first.
    #[derive(Debug, Clone, Default)]
    pub struct MockRecordSource {
        state: Arc<Mutex<MockSourceState>>,
    }

    impl MockRecordSource {
        pub fn new(rows: Vec<Value>) -> Self {
            let source = Self::default();
            source.set_rows(rows);
            source
        }

        pub fn set_rows(&self, rows: Vec<Value>) {
            self.state.lock().unwrap().rows = rows;
        }

        /// Makes the next fetch fail with `error`. Failures queue up.
        pub fn fail_next(&self, error: SyncError) {
            self.state.lock().unwrap().failures.push_back(error);
        }

        /// `(table, user, access_token)` of every fetch so far.
        pub fn requests(&self) -> Vec<(String, UserId, String)> {
            self.state.lock().unwrap().requests.clone()
        }
    }

    #[async_trait]
    impl RecordSource for MockRecordSource {
        async fn fetch_all(&self, table: &str, user: &UserId, session: &Session) -> SyncResult<Vec<Value>> {
            let mut state = self.state.lock().unwrap();
            state
                .requests
                .push((table.to_string(), user.clone(), session.access_token.clone()));
            if let Some(error) = state.failures.pop_front() {
                return Err(error);
            }
            Ok(state.rows.clone())
        }
    }
}
