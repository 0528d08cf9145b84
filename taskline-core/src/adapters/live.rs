//! In-process fan-out of live query snapshots and identity changes
//!
//! Shared by the local store and gateway adapters. Hosted services push
//! these over the network; here they are delivered over channels and
//! callbacks in the same process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

use crate::domain::result::Error;
use crate::domain::UserIdentity;
use crate::ports::{IdentityListener, Query, SnapshotStream, StoreEvent, StoredDocument, Subscription};

struct Subscriber {
    collection: String,
    query: Query,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

#[derive(Default)]
struct FanoutState {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
    opened: usize,
    closed: usize,
}

/// Registry of live query subscribers
#[derive(Clone, Default)]
pub(crate) struct SnapshotFanout {
    state: Arc<Mutex<FanoutState>>,
}

/// Subscription counters, for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutStats {
    pub opened: usize,
    pub closed: usize,
    pub active: usize,
}

impl SnapshotFanout {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a live query and deliver `initial` to it right away
    pub(crate) fn register(
        &self,
        collection: &str,
        query: Query,
        initial: Vec<StoredDocument>,
    ) -> SnapshotStream {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, this cannot fail
        let _ = tx.send(StoreEvent::Snapshot(initial));

        let id = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.opened += 1;
            state.subscribers.insert(
                id,
                Subscriber {
                    collection: collection.to_string(),
                    query,
                    tx,
                },
            );
            id
        };

        let weak: Weak<Mutex<FanoutState>> = Arc::downgrade(&self.state);
        let subscription = Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                let mut state = lock(&state);
                if state.subscribers.remove(&id).is_some() {
                    state.closed += 1;
                }
            }
        });

        tracing::debug!(collection, subscriber = id, "live query registered");
        SnapshotStream::new(rx, subscription)
    }

    /// Push the new contents of `collection` to every subscriber of it,
    /// each filtered through its own query
    pub(crate) fn publish(&self, collection: &str, documents: &[StoredDocument]) {
        let state = lock(&self.state);
        for subscriber in state.subscribers.values() {
            if subscriber.collection != collection {
                continue;
            }
            let matching: Vec<StoredDocument> = documents
                .iter()
                .filter(|doc| subscriber.query.matches(&doc.data))
                .cloned()
                .collect();
            let _ = subscriber.tx.send(StoreEvent::Snapshot(matching));
        }
    }

    /// Push an error to every subscriber of `collection`
    pub(crate) fn publish_error(&self, collection: &str, error: &Error) {
        let state = lock(&self.state);
        for subscriber in state.subscribers.values() {
            if subscriber.collection == collection {
                let _ = subscriber.tx.send(StoreEvent::Error(error.clone()));
            }
        }
    }

    pub(crate) fn stats(&self) -> FanoutStats {
        let state = lock(&self.state);
        FanoutStats {
            opened: state.opened,
            closed: state.closed,
            active: state.subscribers.len(),
        }
    }
}

#[derive(Default)]
struct ListenerState {
    next_id: u64,
    listeners: HashMap<u64, Arc<dyn Fn(Option<UserIdentity>) + Send + Sync>>,
}

/// Registry of identity listeners
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    state: Arc<Mutex<ListenerState>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a listener, calling it once with `current`
    pub(crate) fn add(&self, listener: IdentityListener, current: Option<UserIdentity>) -> Subscription {
        let listener: Arc<dyn Fn(Option<UserIdentity>) + Send + Sync> = Arc::from(listener);
        let id = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.insert(id, Arc::clone(&listener));
            id
        };

        listener(current);

        let weak = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                lock(&state).listeners.remove(&id);
            }
        })
    }

    /// Call every listener with `identity`.
    ///
    /// Listeners run outside the registry lock so they may register or
    /// cancel listeners themselves.
    pub(crate) fn notify(&self, identity: Option<UserIdentity>) {
        let listeners: Vec<_> = lock(&self.state).listeners.values().cloned().collect();
        for listener in listeners {
            listener(identity.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

// Registries stay usable after a listener panic.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
