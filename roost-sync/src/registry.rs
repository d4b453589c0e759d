//! Process-wide record of which subscriptions are live.
//!
//! At most one change-event source may be connecting or subscribed for a
//! given user and table. Coordinators share one [`SubscriptionRegistry`] and
//! hold a [`SubscriptionGuard`] for as long as their source runs; dropping
//! the guard frees the slot.

use roost_types::UserId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type SlotKey = (UserId, String);

/// Shared set of `(user, table)` pairs with an active source.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    active: Arc<Mutex<HashSet<SlotKey>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `(user, table)`. Returns `None` if another holder
    /// already has it.
    pub fn try_acquire(&self, user: &UserId, table: &str) -> Option<SubscriptionGuard> {
        let key = (user.clone(), table.to_string());
        if !self.lock().insert(key.clone()) {
            debug!("Subscription slot {}/{} already held", user, table);
            return None;
        }
        debug!("Acquired subscription slot {}/{}", user, table);
        Some(SubscriptionGuard {
            registry: self.clone(),
            key,
        })
    }

    pub fn is_active(&self, user: &UserId, table: &str) -> bool {
        self.lock().contains(&(user.clone(), table.to_string()))
    }

    /// Number of held slots.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<SlotKey>> {
        // The set stays consistent even if a holder panicked mid-release.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Holds one registry slot; releases it on drop.
#[derive(Debug)]
pub struct SubscriptionGuard {
    registry: SubscriptionRegistry,
    key: SlotKey,
}

impl SubscriptionGuard {
    pub fn user_id(&self) -> &UserId {
        &self.key.0
    }

    pub fn table(&self) -> &str {
        &self.key.1
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
        debug!("Released subscription slot {}/{}", self.key.0, self.key.1);
    }
}
