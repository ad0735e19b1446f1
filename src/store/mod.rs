//! Client-side UI state
//!
//! Explicit, owned application state with a publish/subscribe contract
//! replacing ambient globals: components subscribe with a callback and
//! must unsubscribe on teardown. The UI is single-threaded, so there
//! are no concurrent-writer races; locks exist to satisfy `Send + Sync`
//! call sites.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Cross-cutting UI state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiState {
    pub theme: String,
    pub currency: String,
    pub unread_count: u32,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            currency: "USD".to_string(),
            unread_count: 0,
        }
    }
}

/// Opaque subscription handle; pass it back to `unsubscribe`
pub type SubscriptionId = Uuid;

type Listener = Arc<dyn Fn(&UiState) + Send + Sync>;

/// Observable store for [`UiState`]
pub struct UiStore {
    state: RwLock<UiState>,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
}

impl UiStore {
    pub fn new(initial: UiState) -> Self {
        Self {
            state: RwLock::new(initial),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Current state snapshot
    pub fn get(&self) -> UiState {
        self.state.read().clone()
    }

    /// Register a listener invoked after every mutation
    pub fn subscribe(&self, listener: impl Fn(&UiState) + Send + Sync + 'static) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Mutate the state and notify every current subscriber.
    ///
    /// The listener list is snapshotted before dispatch, so a callback
    /// may subscribe or unsubscribe without deadlocking; it only takes
    /// effect from the next mutation.
    pub fn update(&self, mutate: impl FnOnce(&mut UiState)) {
        let snapshot = {
            let mut state = self.state.write();
            mutate(&mut state);
            state.clone()
        };
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    pub fn set_theme(&self, theme: impl Into<String>) {
        let theme = theme.into();
        self.update(|state| state.theme = theme);
    }

    pub fn set_currency(&self, currency: impl Into<String>) {
        let currency = currency.into();
        self.update(|state| state.currency = currency);
    }

    pub fn set_unread_count(&self, count: u32) {
        self.update(|state| state.unread_count = count);
    }
}

impl Default for UiStore {
    fn default() -> Self {
        Self::new(UiState::default())
    }
}

/// One user-facing notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Cached notification list with optimistic local patches
///
/// `mark_read` and `remove` apply immediately without awaiting server
/// confirmation; the next `reconcile` with a fresh fetch overwrites any
/// local drift (apply-then-reconcile).
pub struct NotificationCache {
    items: RwLock<Vec<Notification>>,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn items(&self) -> Vec<Notification> {
        self.items.read().clone()
    }

    pub fn unread_count(&self) -> u32 {
        self.items.read().iter().filter(|n| !n.read).count() as u32
    }

    /// Optimistically mark one notification read
    pub fn mark_read(&self, id: i64) -> bool {
        let mut items = self.items.write();
        match items.iter_mut().find(|n| n.id == id) {
            Some(item) => {
                item.read = true;
                true
            }
            None => false,
        }
    }

    /// Optimistically drop one notification
    pub fn remove(&self, id: i64) -> bool {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|n| n.id != id);
        items.len() != before
    }

    /// Replace the cache with a freshly fetched list
    pub fn reconcile(&self, fetched: Vec<Notification>) {
        debug!("Reconciling notification cache: {} items", fetched.len());
        *self.items.write() = fetched;
    }

    /// Push the current unread count into the UI store
    pub fn sync_unread(&self, store: &UiStore) {
        store.set_unread_count(self.unread_count());
    }
}

impl Default for NotificationCache {
    fn default() -> Self {
        Self::new()
    }
}
