//! HTTP backend for the authoritative fetch and session refresh.
//!
//! Talks to a PostgREST-style table API and a GoTrue-style token endpoint
//! under one base URL.

use crate::auth::{Session, SessionProvider};
use crate::error::{SyncError, SyncResult};
use crate::loader::RecordSource;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode};
use roost_types::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Connection settings for the datastore's HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Project base URL (e.g. `https://xyz.example.co`).
    pub base_url: String,
    /// Public API key sent as the `apikey` header.
    pub api_key: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    /// Unix seconds.
    expires_at: Option<i64>,
}

impl TokenResponse {
    fn into_session(self, previous_refresh: String) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + ChronoDuration::seconds(secs))
            });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(Some(previous_refresh)),
            expires_at,
        }
    }
}

/// Datastore HTTP client. Holds the current session.
pub struct RestBackend {
    config: RestConfig,
    client: Client,
    session: Arc<RwLock<Option<Session>>>,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            session: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Sets the session (e.g. after sign-in).
    pub async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn table_url(&self, table: &str, user: &UserId) -> String {
        format!(
            "{}/rest/v1/{}?select=*&user_id=eq.{}&order=created_at.desc",
            self.base(),
            urlencoding::encode(table),
            urlencoding::encode(user.as_str())
        )
    }
}

#[async_trait]
impl RecordSource for RestBackend {
    async fn fetch_all(&self, table: &str, user: &UserId, session: &Session) -> SyncResult<Vec<Value>> {
        debug!("Fetching {} for user {}", table, user);

        let response = self
            .client
            .get(self.table_url(table, user))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&session.access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("fetch {table} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SyncError::AuthExpired(format!("fetch {table} rejected the session")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Fetch(format!("fetch {table} returned {status}: {body}")));
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| SyncError::Fetch(format!("failed to parse {table} rows: {e}")))
    }
}

#[async_trait]
impl SessionProvider for RestBackend {
    async fn current(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn refresh(&self) -> SyncResult<Session> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or_else(|| SyncError::AuthExpired("no refresh token available".to_string()))?;

        debug!("Refreshing access token");

        let response = self
            .client
            .post(format!("{}/auth/v1/token?grant_type=refresh_token", self.base()))
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("token refresh failed: {e}")))?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(SyncError::AuthExpired(format!("token refresh failed: {error}")));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::AuthExpired(format!("failed to parse token response: {e}")))?;

        let session = token_response.into_session(refresh_token);
        *self.session.write().await = Some(session.clone());
        info!("Access token refreshed");
        Ok(session)
    }
}
