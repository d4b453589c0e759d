//! Sync coordinator - owns one collection and keeps it in sync.
//!
//! The coordinator ties together:
//! - The change-event source (live row changes)
//! - The bulk loader (authoritative snapshot)
//! - The merger, with its duplicate suppressor and optimistic-write tracker
//!
//! Everything runs on a single event loop, [`SyncCoordinator::run`]. The UI
//! talks to it through a [`CoordinatorHandle`] and reads the collection from
//! a `watch` channel that is republished after every change.

use crate::auth::SessionProvider;
use crate::channel::RealtimeClient;
use crate::collection::Collection;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::loader::{BulkLoader, RecordSource};
use crate::merger::RecordMerger;
use crate::optimistic::OptimisticWriteTracker;
use crate::registry::{SubscriptionGuard, SubscriptionRegistry};
use crate::source::{ChangeEventSource, SubscriptionState};
use crate::suppressor::DuplicateSuppressor;
use roost_types::{ChangeEvent, Record, RecordId, UserId};
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// Commands that can be sent to the coordinator.
#[derive(Debug)]
pub enum SyncCommand<R> {
    /// The signed-in user changed; `None` means signed out.
    SwitchUser { user_id: Option<UserId> },
    /// A local create or update for `record_id` is about to be sent.
    NotifyOptimisticWrite { record_id: RecordId },
    /// Show a locally written record immediately.
    UpsertLocal { record: R },
    /// Drop a locally deleted record immediately.
    RemoveLocal { record_id: RecordId },
    /// Re-run the authoritative load. Also resubscribes when this
    /// coordinator holds no live stream.
    Reload,
    /// Stop the coordinator.
    Shutdown,
}

/// Notifications emitted by the coordinator for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A bulk load finished; `count` is the collection size after the merge.
    Loaded { count: usize },
    /// A bulk load failed; the collection was left as it was.
    LoadFailed { error: String },
    /// The session could not be refreshed; the collection was cleared.
    AuthExpired,
    /// The change stream moved to a new state.
    StateChanged { state: SubscriptionState },
    /// Another coordinator already subscribes for this user.
    SubscriptionSkipped { user_id: UserId },
}

/// Handle to send commands to the coordinator and read its collection.
pub struct CoordinatorHandle<R> {
    command_tx: mpsc::Sender<SyncCommand<R>>,
    collection_rx: watch::Receiver<Arc<Vec<R>>>,
}

impl<R> Clone for CoordinatorHandle<R> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            collection_rx: self.collection_rx.clone(),
        }
    }
}

impl<R: Record> CoordinatorHandle<R> {
    /// Snapshot of the collection, most recent first.
    pub fn collection(&self) -> Vec<R> {
        self.collection_rx.borrow().as_ref().clone()
    }

    /// A receiver notified every time the collection changes.
    pub fn watch(&self) -> watch::Receiver<Arc<Vec<R>>> {
        self.collection_rx.clone()
    }

    /// Sends a command to the coordinator.
    pub async fn send(&self, cmd: SyncCommand<R>) -> SyncResult<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Registers a local write so its remote echo is treated as confirmation.
    /// Call before the write is sent.
    pub async fn notify_optimistic_write(&self, record_id: RecordId) -> SyncResult<()> {
        self.send(SyncCommand::NotifyOptimisticWrite { record_id }).await
    }

    pub async fn upsert_local(&self, record: R) -> SyncResult<()> {
        self.send(SyncCommand::UpsertLocal { record }).await
    }

    pub async fn remove_local(&self, record_id: RecordId) -> SyncResult<()> {
        self.send(SyncCommand::RemoveLocal { record_id }).await
    }

    /// Switches to another user, or signs out with `None`.
    pub async fn switch_user(&self, user_id: Option<UserId>) -> SyncResult<()> {
        self.send(SyncCommand::SwitchUser { user_id }).await
    }

    pub async fn reload(&self) -> SyncResult<()> {
        self.send(SyncCommand::Reload).await
    }

    /// Shuts down the coordinator.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.send(SyncCommand::Shutdown).await
    }
}

/// The sync coordinator for one record type.
pub struct SyncCoordinator<R: Record> {
    registry: SubscriptionRegistry,
    source: ChangeEventSource<R>,
    source_states: broadcast::Receiver<SubscriptionState>,
    loader: BulkLoader<R>,
    /// Held while `source` may be active.
    guard: Option<SubscriptionGuard>,
    user_id: Option<UserId>,
    collection: Collection<R>,
    tracker: OptimisticWriteTracker,
    suppressor: DuplicateSuppressor,
    last_state: SubscriptionState,
    event_tx: mpsc::Sender<SyncEvent>,
    collection_tx: watch::Sender<Arc<Vec<R>>>,
}

impl<R: Record> SyncCoordinator<R> {
    /// Runs the coordinator event loop until shutdown or until every handle
    /// is dropped.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<SyncCommand<R>>) -> SyncResult<()> {
        info!("Sync coordinator for {} started", R::TABLE);

        loop {
            tokio::select! {
                // Commands first: an optimistic write is registered before
                // its echo can be merged.
                biased;

                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SyncCommand::Shutdown) | None => {
                            info!("Sync coordinator for {} shutting down", R::TABLE);
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }

                Ok(state) = self.source_states.recv() => {
                    self.report(state);
                }

                Some(event) = self.source.next_event(), if self.source.is_running() => {
                    self.apply_event(event);
                }

                record_id = self.tracker.next_expired() => {
                    debug!("Optimistic write for {} expired unconfirmed", record_id);
                }
            }

            self.report_states();
            self.release_closed_slot();
        }

        self.source.stop();
        self.guard = None;
        self.report_states();
        Ok(())
    }

    async fn handle_command(&mut self, cmd: SyncCommand<R>) {
        debug!("Received command: {:?}", cmd);
        match cmd {
            SyncCommand::SwitchUser { user_id } => self.switch_user(user_id).await,
            SyncCommand::NotifyOptimisticWrite { record_id } => {
                self.tracker.track(record_id);
            }
            SyncCommand::UpsertLocal { record } => {
                self.collection.upsert_local(record);
                self.publish();
            }
            SyncCommand::RemoveLocal { record_id } => {
                self.tracker.clear(&record_id);
                if self.collection.remove(&record_id).is_some() {
                    self.publish();
                }
            }
            SyncCommand::Reload => {
                self.resubscribe();
                self.load().await;
            }
            // Handled by the loop.
            SyncCommand::Shutdown => {}
        }
    }

    async fn switch_user(&mut self, user_id: Option<UserId>) {
        if self.user_id == user_id {
            debug!("User unchanged, ignoring switch");
            return;
        }

        self.reset();
        self.user_id = user_id.clone();

        let Some(user_id) = user_id else {
            info!("Signed out, {} sync idle", R::TABLE);
            return;
        };

        info!("Switching {} sync to user {}", R::TABLE, user_id);
        self.subscribe(user_id);
        self.load().await;
    }

    /// Takes the user's subscription slot and starts the source, unless
    /// another coordinator holds the slot.
    fn subscribe(&mut self, user_id: UserId) {
        match self.registry.try_acquire(&user_id, R::TABLE) {
            Some(guard) => {
                self.guard = Some(guard);
                self.source.start(user_id);
            }
            None => {
                warn!(
                    "{} subscription for user {} is already active elsewhere, not subscribing",
                    R::TABLE,
                    user_id
                );
                self.notify(SyncEvent::SubscriptionSkipped { user_id });
            }
        }
        self.report_states();
    }

    fn resubscribe(&mut self) {
        if self.guard.is_some() {
            return;
        }
        if let Some(user_id) = self.user_id.clone() {
            info!("Resubscribing {} for user {}", R::TABLE, user_id);
            self.subscribe(user_id);
        }
    }

    /// Gives the slot back once the source has closed for good, so another
    /// coordinator (or a later reload) can subscribe.
    fn release_closed_slot(&mut self) {
        if self.guard.is_some()
            && self.source.state() == SubscriptionState::Closed
            && !self.source.is_running()
        {
            info!("{} stream closed, releasing subscription slot", R::TABLE);
            self.guard = None;
        }
    }

    /// Stops the source and forgets everything tied to the previous user.
    fn reset(&mut self) {
        self.source.stop();
        self.guard = None;
        self.suppressor.clear();
        self.tracker.clear_all();
        self.collection.clear();
        self.publish();
    }

    async fn load(&mut self) {
        let Some(user_id) = self.user_id.clone() else {
            debug!("No user, skipping load");
            return;
        };

        let result = self.loader.load_into(&user_id, &mut self.collection).await;
        self.publish();

        match result {
            Ok(_) => {
                self.notify(SyncEvent::Loaded {
                    count: self.collection.len(),
                });
            }
            Err(SyncError::AuthExpired(reason)) => {
                warn!("Load for user {} needs sign-in again: {}", user_id, reason);
                self.notify(SyncEvent::AuthExpired);
            }
            Err(e) => {
                warn!("Load for user {} failed: {}", user_id, e);
                self.notify(SyncEvent::LoadFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    fn apply_event(&mut self, event: ChangeEvent<R>) {
        let outcome = RecordMerger::new(&mut self.collection, &mut self.tracker, &mut self.suppressor)
            .apply(event);
        if outcome.changed() {
            self.publish();
        }
    }

    fn publish(&self) {
        self.collection_tx.send_replace(Arc::new(self.collection.to_vec()));
    }

    /// Reports transitions the source made since the last call.
    fn report_states(&mut self) {
        loop {
            match self.source_states.try_recv() {
                Ok(state) => self.report(state),
                Err(TryRecvError::Lagged(missed)) => {
                    debug!("Missed {} {} state transitions", missed, R::TABLE);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        let current = self.source.state();
        self.report(current);
    }

    fn report(&mut self, state: SubscriptionState) {
        if state != self.last_state {
            debug!("{} subscription {} -> {}", R::TABLE, self.last_state, state);
            self.last_state = state;
            self.notify(SyncEvent::StateChanged { state });
        }
    }

    fn notify(&self, event: SyncEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!("Dropped sync notification: {}", e);
        }
    }
}

/// Creates a coordinator for records of type `R`.
///
/// Returns the handle, the notification receiver, the command receiver to
/// pass to [`SyncCoordinator::run`], and the coordinator itself.
pub fn create_coordinator<R: Record>(
    client: Arc<dyn RealtimeClient>,
    records: Arc<dyn RecordSource>,
    sessions: Arc<dyn SessionProvider>,
    registry: SubscriptionRegistry,
    config: SyncConfig,
) -> (
    CoordinatorHandle<R>,
    mpsc::Receiver<SyncEvent>,
    mpsc::Receiver<SyncCommand<R>>,
    SyncCoordinator<R>,
) {
    let buffer = config.event_buffer.max(1);
    let (command_tx, command_rx) = mpsc::channel(buffer);
    let (event_tx, event_rx) = mpsc::channel(buffer);
    let (collection_tx, collection_rx) = watch::channel(Arc::new(Vec::new()));

    let handle = CoordinatorHandle {
        command_tx,
        collection_rx,
    };

    let source = ChangeEventSource::new(client, config.clone());
    let coordinator = SyncCoordinator {
        registry,
        tracker: OptimisticWriteTracker::from_config(&config),
        suppressor: DuplicateSuppressor::from_config(&config),
        source_states: source.subscribe_states(),
        source,
        loader: BulkLoader::new(records, sessions),
        guard: None,
        user_id: None,
        collection: Collection::new(),
        last_state: SubscriptionState::Idle,
        event_tx,
        collection_tx,
    };

    (handle, event_rx, command_rx, coordinator)
}
