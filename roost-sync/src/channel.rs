//! Realtime channel abstraction.
//!
//! Defines the boundary to the client library that owns the realtime
//! socket. A subscription is opened synchronously; its status and its row
//! changes then arrive, in receipt order, on the handle's receiver. This
//! mirrors how realtime clients report through callbacks, which is also why
//! the receiver is unbounded: a callback cannot wait for capacity.

use crate::error::SyncResult;
use crate::protocol::ChannelMessage;
use roost_types::UserId;
use std::fmt;
use tokio::sync::mpsc;

/// What a channel listens to: one table, filtered server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTopic {
    /// Unique channel name.
    pub name: String,
    pub schema: String,
    pub table: String,
    /// Row filter, e.g. `user_id=eq.<id>`.
    pub filter: String,
}

impl ChannelTopic {
    /// Topic for all changes to `table` owned by `user`. `attempt`
    /// distinguishes channel names across reconnects.
    pub fn for_user(schema: &str, table: &str, user: &UserId, attempt: u64) -> Self {
        Self {
            name: format!("{table}_user_{user}_{attempt}"),
            schema: schema.to_string(),
            table: table.to_string(),
            filter: format!("user_id=eq.{user}"),
        }
    }
}

/// Client-assigned identity of an open channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

/// An open channel.
#[derive(Debug)]
pub struct ChannelHandle {
    pub id: ChannelId,
    pub messages: mpsc::UnboundedReceiver<ChannelMessage>,
}

/// The realtime client library.
pub trait RealtimeClient: Send + Sync {
    /// Opens a channel for `topic` and starts subscribing.
    fn subscribe(&self, topic: &ChannelTopic) -> SyncResult<ChannelHandle>;

    /// Tears a channel down. Unknown or already removed ids are ignored.
    fn remove_channel(&self, id: ChannelId);
}

/// An in-process realtime client for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use crate::protocol::{ChannelError, ChannelStatus};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct MockChannel {
        id: ChannelId,
        topic: ChannelTopic,
        tx: Option<mpsc::UnboundedSender<ChannelMessage>>,
        removed: bool,
    }

    #[derive(Debug, Default)]
    struct MockState {
        next_id: u64,
        channels: Vec<MockChannel>,
        failing_subscribes: usize,
    }

    /// A realtime client whose channels are driven by the test.
    #[derive(Debug, Clone, Default)]
    pub struct MockRealtime {
        state: Arc<Mutex<MockState>>,
    }

    impl MockRealtime {
        /// Creates a new mock client.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `n` subscribe calls fail.
        pub fn fail_next_subscribes(&self, n: usize) {
            self.state.lock().unwrap().failing_subscribes = n;
        }

        /// Number of channels ever opened.
        pub fn opened(&self) -> usize {
            self.state.lock().unwrap().channels.len()
        }

        /// Number of channels opened and not yet removed.
        pub fn active(&self) -> usize {
            self.state
                .lock()
                .unwrap()
                .channels
                .iter()
                .filter(|c| !c.removed)
                .count()
        }

        /// Topics of all channels ever opened, in order.
        pub fn topics(&self) -> Vec<ChannelTopic> {
            self.state
                .lock()
                .unwrap()
                .channels
                .iter()
                .map(|c| c.topic.clone())
                .collect()
        }

        /// Ends the message stream of channel `id` without removing it, as a
        /// dropped socket would. Controllers for it must be dropped too.
        pub fn drop_stream(&self, id: ChannelId) {
            let mut state = self.state.lock().unwrap();
            if let Some(channel) = state.channels.iter_mut().find(|c| c.id == id) {
                channel.tx = None;
            }
        }

        /// Controller for the most recently opened channel.
        pub fn latest(&self) -> Option<MockChannelController> {
            let state = self.state.lock().unwrap();
            state.channels.last().map(|c| MockChannelController {
                id: c.id,
                tx: c.tx.clone(),
            })
        }
    }

    impl RealtimeClient for MockRealtime {
        fn subscribe(&self, topic: &ChannelTopic) -> SyncResult<ChannelHandle> {
            let mut state = self.state.lock().unwrap();
            if state.failing_subscribes > 0 {
                state.failing_subscribes -= 1;
                return Err(SyncError::Network("socket not connected".into()));
            }
            state.next_id += 1;
            let id = ChannelId(state.next_id);
            let (tx, rx) = mpsc::unbounded_channel();
            state.channels.push(MockChannel {
                id,
                topic: topic.clone(),
                tx: Some(tx),
                removed: false,
            });
            Ok(ChannelHandle { id, messages: rx })
        }

        fn remove_channel(&self, id: ChannelId) {
            let mut state = self.state.lock().unwrap();
            if let Some(channel) = state.channels.iter_mut().find(|c| c.id == id) {
                channel.removed = true;
                channel.tx = None;
            }
        }
    }

    /// Pushes traffic into one mock channel.
    #[derive(Debug, Clone)]
    pub struct MockChannelController {
        id: ChannelId,
        tx: Option<mpsc::UnboundedSender<ChannelMessage>>,
    }

    impl MockChannelController {
        pub fn id(&self) -> ChannelId {
            self.id
        }

        /// Sends a status. Returns false if the channel was removed.
        pub fn status(&self, status: ChannelStatus) -> bool {
            self.send(ChannelMessage::Status(status))
        }

        pub fn subscribed(&self) -> bool {
            self.status(ChannelStatus::Subscribed)
        }

        pub fn error(&self, error: ChannelError) -> bool {
            self.status(ChannelStatus::ChannelError(error))
        }

        /// Sends a raw row-change payload.
        pub fn change(&self, payload: Value) -> bool {
            self.send(ChannelMessage::Change(payload))
        }

        fn send(&self, message: ChannelMessage) -> bool {
            self.tx
                .as_ref()
                .is_some_and(|tx| tx.send(message).is_ok())
        }
    }

    /// Raw INSERT payload.
    pub fn insert_payload(row: Value, commit_timestamp: &str) -> Value {
        json!({
            "event_type": "INSERT",
            "old_record": {},
            "new_record": row,
            "commit_timestamp": commit_timestamp,
        })
    }

    /// Raw UPDATE payload.
    pub fn update_payload(row: Value, commit_timestamp: &str) -> Value {
        json!({
            "event_type": "UPDATE",
            "old_record": { "id": row.get("id").cloned().unwrap_or(Value::Null) },
            "new_record": row,
            "commit_timestamp": commit_timestamp,
        })
    }

    /// Raw DELETE payload.
    pub fn delete_payload(id: &str, commit_timestamp: &str) -> Value {
        json!({
            "event_type": "DELETE",
            "old_record": { "id": id },
            "new_record": {},
            "commit_timestamp": commit_timestamp,
        })
    }
}
