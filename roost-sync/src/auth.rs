//! Session handling for the authoritative fetch.

use crate::error::SyncResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated session against the datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` means the session does not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Supplies and refreshes the current session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The current session, if signed in.
    async fn current(&self) -> Option<Session>;

    /// Exchanges the refresh token for a new session.
    async fn refresh(&self) -> SyncResult<Session>;
}

/// A session provider for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockSessionState {
        session: Option<Session>,
        refreshed: Option<Session>,
        refresh_calls: usize,
    }

    /// Holds a fixed session; `refresh` succeeds only when a replacement was
    /// configured with [`MockSessions::on_refresh`].
    #[derive(Debug, Clone, Default)]
    pub struct MockSessions {
        state: Arc<Mutex<MockSessionState>>,
    }

    impl MockSessions {
        pub fn new(session: Option<Session>) -> Self {
            let sessions = Self::default();
            sessions.state.lock().unwrap().session = session;
            sessions
        }

        /// A session that never expires.
        pub fn signed_in(access_token: &str) -> Self {
            Self::new(Some(Session::new(access_token, None, None)))
        }

        pub fn set(&self, session: Option<Session>) {
            self.state.lock().unwrap().session = session;
        }

        /// The session `refresh` will hand out.
        pub fn on_refresh(&self, session: Session) {
            self.state.lock().unwrap().refreshed = Some(session);
        }

        pub fn refresh_calls(&self) -> usize {
            self.state.lock().unwrap().refresh_calls
        }
    }

    #[async_trait]
    impl SessionProvider for MockSessions {
        async fn current(&self) -> Option<Session> {
            self.state.lock().unwrap().session.clone()
        }

        async fn refresh(&self) -> SyncResult<Session> {
            let mut state = self.state.lock().unwrap();
            state.refresh_calls += 1;
            match state.refreshed.clone() {
                Some(session) => {
                    state.session = Some(session.clone());
                    Ok(session)
                }
                None => Err(SyncError::AuthExpired("refresh token revoked".into())),
            }
        }
    }
}
