//! Realtime channel messages and their decoding.
//!
//! The datastore pushes two kinds of traffic on a channel:
//! 1. Status changes (`SUBSCRIBED`, `CHANNEL_ERROR`, `CLOSED`, `TIMED_OUT`)
//! 2. Row changes (`{ event_type, old_record, new_record, commit_timestamp }`)
//!
//! Status errors are classified here into transient failures and protocol
//! mismatches. Row changes are decoded into typed [`ChangeEvent`]s.

use crate::error::{SyncError, SyncResult};
use roost_types::{ChangeEvent, ChangeKind, Record, RecordId, ServerTimestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Fallback pattern identifying a protocol mismatch when the channel error
/// carries no structured code.
pub const BINDING_MISMATCH_PATTERN: &str = "mismatch between server and client bindings";

/// Structured error codes a realtime client may attach to a channel error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelErrorCode {
    /// Server and client disagree on the subscription bindings.
    BindingMismatch,
    /// The server rejected the subscription's credentials.
    Unauthorized,
    /// The socket dropped or the server failed.
    Connection,
}

/// How the change-event source must react to a channel error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Retry the same subscription after a backoff.
    Transient,
    /// Tear the channel down and start fresh after a cooldown.
    ProtocolMismatch,
}

/// Error payload of a `CHANNEL_ERROR` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelError {
    #[serde(default)]
    pub code: Option<ChannelErrorCode>,
    pub message: String,
}

impl ChannelError {
    /// An error with a structured code.
    pub fn with_code(code: ChannelErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// An error with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Classifies the error. A structured code decides when present;
    /// otherwise the message is matched against [`BINDING_MISMATCH_PATTERN`].
    pub fn classify(&self) -> ErrorClass {
        match self.code {
            Some(ChannelErrorCode::BindingMismatch) => ErrorClass::ProtocolMismatch,
            Some(_) => ErrorClass::Transient,
            None if self
                .message
                .to_lowercase()
                .contains(BINDING_MISMATCH_PATTERN) =>
            {
                ErrorClass::ProtocolMismatch
            }
            None => ErrorClass::Transient,
        }
    }

    /// Converts into the matching sync error.
    pub fn into_sync_error(self) -> SyncError {
        match self.classify() {
            ErrorClass::Transient => SyncError::TransientChannel(self.message),
            ErrorClass::ProtocolMismatch => SyncError::ProtocolMismatch(self.message),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code:?}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Subscription status reported by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    ChannelError(ChannelError),
    Closed,
    TimedOut,
}

/// One message on a channel, in receipt order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Status(ChannelStatus),
    /// A raw row-change payload, decoded by the source.
    Change(Value),
}

/// Row-change payload as pushed by the datastore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChangeMessage {
    #[serde(alias = "eventType")]
    pub event_type: String,
    #[serde(default, alias = "old")]
    pub old_record: Option<Value>,
    #[serde(default, alias = "new")]
    pub new_record: Option<Value>,
    pub commit_timestamp: String,
}

impl RawChangeMessage {
    /// Decodes into a typed change event.
    pub fn into_event<R: Record>(self, delivery_sequence: u64) -> SyncResult<ChangeEvent<R>> {
        let kind: ChangeKind = self.event_type.parse()?;
        let server_timestamp = ServerTimestamp::parse(&self.commit_timestamp)?;

        match kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let row = self
                    .new_record
                    .filter(|row| !is_empty_row(row))
                    .ok_or_else(|| SyncError::MalformedEvent(format!("{kind} without new row")))?;
                let record = R::from_row(row)?;
                Ok(ChangeEvent {
                    kind,
                    record_id: record.id().clone(),
                    payload: Some(record),
                    server_timestamp,
                    delivery_sequence,
                })
            }
            ChangeKind::Delete => {
                let record_id = self
                    .old_record
                    .as_ref()
                    .and_then(row_id)
                    .or_else(|| self.new_record.as_ref().and_then(row_id))
                    .ok_or_else(|| {
                        SyncError::MalformedEvent("DELETE without record id".to_string())
                    })?;
                Ok(ChangeEvent::delete(
                    record_id,
                    server_timestamp,
                    delivery_sequence,
                ))
            }
        }
    }
}

/// Decodes a raw channel payload into a typed change event.
pub fn decode_change<R: Record>(payload: Value, delivery_sequence: u64) -> SyncResult<ChangeEvent<R>> {
    let raw: RawChangeMessage = serde_json::from_value(payload)
        .map_err(|e| SyncError::MalformedEvent(format!("undecodable change payload: {e}")))?;
    raw.into_event(delivery_sequence)
}

fn is_empty_row(row: &Value) -> bool {
    match row {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn row_id(row: &Value) -> Option<RecordId> {
    row.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(RecordId::from)
}
