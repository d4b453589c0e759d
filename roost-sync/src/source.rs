//! Change-event source - one live subscription to a user's change stream.
//!
//! The source is a state machine driven by its owner's event loop:
//!
//! ```text
//! Idle -> Connecting -> Subscribed -> Error(Transient) --backoff--> Connecting
//!                                  -> Error(ProtocolMismatch) -> Closed --cooldown--> Connecting
//!                                  -> Closed (remote close or stop)
//! ```
//!
//! [`ChangeEventSource::next_event`] is where everything happens: it waits on
//! whichever of the channel or the pending retry timer is live, handles
//! status changes, and yields decoded events in receipt order. It never
//! de-duplicates; that is the merger's job.

use crate::channel::{ChannelHandle, ChannelTopic, RealtimeClient};
use crate::config::SyncConfig;
use crate::protocol::{decode_change, ChannelMessage, ChannelStatus, ErrorClass};
use roost_types::{ChangeEvent, Record, UserId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle state of a change-event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    Idle,
    Connecting,
    Subscribed,
    Error(ErrorClass),
    Closed,
}

impl SubscriptionState {
    /// Connecting or subscribed.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Subscribed)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Subscribed => f.write_str("subscribed"),
            Self::Error(ErrorClass::Transient) => f.write_str("error (transient)"),
            Self::Error(ErrorClass::ProtocolMismatch) => f.write_str("error (protocol mismatch)"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Transitions retained for a lagging state subscriber.
const STATE_HISTORY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Reconnect after a transient error.
    Retry,
    /// Fresh start after a hard reset.
    Restart,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    at: Instant,
    kind: TimerKind,
}

/// Owns one subscription to the change stream of table `R::TABLE`.
pub struct ChangeEventSource<R> {
    client: Arc<dyn RealtimeClient>,
    config: SyncConfig,
    state: SubscriptionState,
    state_tx: broadcast::Sender<SubscriptionState>,
    user_id: Option<UserId>,
    channel: Option<ChannelHandle>,
    timer: Option<Timer>,
    /// Decoded events drained from a channel that was torn down.
    buffered: VecDeque<ChangeEvent<R>>,
    attempts: u64,
    sequence: u64,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> ChangeEventSource<R> {
    pub fn new(client: Arc<dyn RealtimeClient>, config: SyncConfig) -> Self {
        Self {
            client,
            config,
            state: SubscriptionState::Idle,
            state_tx: broadcast::channel(STATE_HISTORY).0,
            user_id: None,
            channel: None,
            timer: None,
            buffered: VecDeque::new(),
            attempts: 0,
            sequence: 0,
            _record: PhantomData,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// A receiver of every state transition in order, including those made
    /// while [`next_event`](Self::next_event) is waiting.
    pub fn subscribe_states(&self) -> broadcast::Receiver<SubscriptionState> {
        self.state_tx.subscribe()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Number of subscribe attempts so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Returns true while [`next_event`](Self::next_event) can still make
    /// progress: a channel is open, a retry is scheduled, or drained events
    /// are waiting.
    pub fn is_running(&self) -> bool {
        self.channel.is_some() || self.timer.is_some() || !self.buffered.is_empty()
    }

    /// Opens the subscription for `user_id`. A no-op when already connecting
    /// or subscribed for the same user.
    pub fn start(&mut self, user_id: UserId) {
        if self.state.is_active() && self.user_id.as_ref() == Some(&user_id) {
            debug!("Subscription already active for user {}", user_id);
            return;
        }
        if self.user_id.as_ref().is_some_and(|current| *current != user_id) {
            self.stop();
        }

        info!("Starting {} change stream for user {}", R::TABLE, user_id);
        self.user_id = Some(user_id);
        self.timer = None;
        self.connect();
    }

    /// Tears the subscription down from any state and cancels any pending
    /// retry. Idempotent.
    pub fn stop(&mut self) {
        self.timer = None;
        self.teardown(false);
        self.buffered.clear();
        if self.state != SubscriptionState::Closed {
            info!("Stopped {} change stream", R::TABLE);
            self.set_state(SubscriptionState::Closed);
        }
    }

    /// Waits for the next decoded change event.
    ///
    /// Returns `None` once there is nothing left to wait for (stopped,
    /// closed by the remote, or never started). Cancel safe.
    pub async fn next_event(&mut self) -> Option<ChangeEvent<R>> {
        loop {
            if let Some(event) = self.buffered.pop_front() {
                return Some(event);
            }

            if let Some(timer) = self.timer {
                tokio::time::sleep_until(timer.at).await;
                self.timer = None;
                match timer.kind {
                    TimerKind::Retry => info!("Retrying {} subscription", R::TABLE),
                    TimerKind::Restart => info!("Restarting {} subscription after hard reset", R::TABLE),
                }
                self.connect();
                continue;
            }

            let channel = self.channel.as_mut()?;
            match channel.messages.recv().await {
                Some(ChannelMessage::Status(status)) => self.on_status(status),
                Some(ChannelMessage::Change(payload)) => {
                    if let Some(event) = self.decode(payload) {
                        return Some(event);
                    }
                }
                None => {
                    warn!("{} channel stream ended unexpectedly", R::TABLE);
                    self.on_error(ErrorClass::Transient);
                }
            }
        }
    }

    fn set_state(&mut self, state: SubscriptionState) {
        if self.state == state {
            return;
        }
        self.state = state;
        // No subscribers is fine.
        let _ = self.state_tx.send(state);
    }

    fn connect(&mut self) {
        let Some(user_id) = self.user_id.clone() else {
            return;
        };
        self.teardown(true);
        self.attempts += 1;

        let topic = ChannelTopic::for_user(&self.config.schema, R::TABLE, &user_id, self.attempts);
        match self.client.subscribe(&topic) {
            Ok(handle) => {
                debug!("Opened {} for topic {}", handle.id, topic.name);
                self.channel = Some(handle);
                self.set_state(SubscriptionState::Connecting);
            }
            Err(e) => {
                warn!("Failed to open {} channel: {}", R::TABLE, e);
                self.on_error(ErrorClass::Transient);
            }
        }
    }

    fn on_status(&mut self, status: ChannelStatus) {
        match status {
            ChannelStatus::Subscribed => {
                info!("{} realtime subscription active", R::TABLE);
                self.set_state(SubscriptionState::Subscribed);
            }
            ChannelStatus::ChannelError(error) => {
                let class = error.classify();
                warn!("{} channel error ({:?}): {}", R::TABLE, class, error);
                self.on_error(class);
            }
            ChannelStatus::TimedOut => {
                warn!("{} subscription timed out", R::TABLE);
                self.on_error(ErrorClass::Transient);
            }
            ChannelStatus::Closed => {
                info!("{} realtime subscription closed by remote", R::TABLE);
                self.timer = None;
                self.teardown(true);
                self.set_state(SubscriptionState::Closed);
            }
        }
    }

    fn on_error(&mut self, class: ErrorClass) {
        self.teardown(true);
        match class {
            ErrorClass::Transient => {
                self.set_state(SubscriptionState::Error(ErrorClass::Transient));
                self.timer = Some(Timer {
                    at: Instant::now() + self.config.retry_backoff(),
                    kind: TimerKind::Retry,
                });
            }
            ErrorClass::ProtocolMismatch => {
                warn!("Hard reset of {} channel after protocol mismatch", R::TABLE);
                self.set_state(SubscriptionState::Error(ErrorClass::ProtocolMismatch));
                self.set_state(SubscriptionState::Closed);
                self.timer = Some(Timer {
                    at: Instant::now() + self.config.hard_reset_cooldown(),
                    kind: TimerKind::Restart,
                });
            }
        }
    }

    /// Removes the open channel. With `keep_buffered`, change messages already
    /// queued on it are decoded and kept for delivery.
    fn teardown(&mut self, keep_buffered: bool) {
        let Some(mut handle) = self.channel.take() else {
            return;
        };
        if keep_buffered {
            while let Ok(message) = handle.messages.try_recv() {
                if let ChannelMessage::Change(payload) = message {
                    if let Some(event) = self.decode(payload) {
                        self.buffered.push_back(event);
                    }
                }
            }
        }
        self.client.remove_channel(handle.id);
        debug!("Removed {}", handle.id);
    }

    fn decode(&mut self, payload: serde_json::Value) -> Option<ChangeEvent<R>> {
        self.sequence += 1;
        match decode_change::<R>(payload, self.sequence) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Dropping {} change: {}", R::TABLE, e);
                None
            }
        }
    }
}

impl<R> Drop for ChangeEventSource<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.channel.take() {
            self.client.remove_channel(handle.id);
        }
    }
}
