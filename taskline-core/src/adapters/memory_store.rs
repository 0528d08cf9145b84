//! In-memory document store
//!
//! Behaves like the hosted store from the client's point of view: every
//! commit is pushed to live queries as a full snapshot, server timestamps
//! are resolved by the store, and with latency compensation enabled a write
//! is first seen with its server timestamps still pending (`null`).
//!
//! Failure injection hooks make error paths testable without a network.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::live::{FanoutStats, SnapshotFanout};
use super::writes::{apply_write, has_server_timestamp, timestamp_object, ServerClock};
use crate::domain::result::{Error, Result};
use crate::ports::{
    DocumentData, DocumentStore, DocumentWrite, Query, SnapshotStream, StoredDocument,
};

/// Number of calls made against the store, by operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub gets: usize,
    pub queries: usize,
    pub subscribes: usize,
}

impl StoreCallCounts {
    /// Every call that could have changed data
    pub fn writes(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }

    pub fn total(&self) -> usize {
        self.writes() + self.gets + self.queries + self.subscribes
    }
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, DocumentData>>,
    clock: ServerClock,
    calls: StoreCallCounts,
    write_failure: Option<String>,
    subscribe_failure: Option<String>,
}

impl MemoryState {
    fn documents(&self, collection: &str) -> Vec<StoredDocument> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| StoredDocument {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_writable(&self) -> Result<()> {
        match &self.write_failure {
            Some(msg) => Err(Error::transient(msg.clone())),
            None => Ok(()),
        }
    }
}

/// Document store held entirely in process memory
pub struct InMemoryDocumentStore {
    state: Mutex<MemoryState>,
    fanout: SnapshotFanout,
    latency_compensation: bool,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fanout: SnapshotFanout::new(),
            latency_compensation: false,
        }
    }

    /// Publish every write twice: first with server timestamps pending
    /// (`null`), then resolved
    pub fn with_latency_compensation(mut self) -> Self {
        self.latency_compensation = true;
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Put a document with a known id and raw fields, bypassing the
    /// client write path (fixtures, partially-written documents)
    pub fn seed(&self, collection: &str, id: &str, data: DocumentData) -> Result<()> {
        let mut state = self.lock()?;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        let docs = state.documents(collection);
        self.fanout.publish(collection, &docs);
        Ok(())
    }

    /// Make every following write fail with `TransientBackend` (`None` heals)
    pub fn fail_writes(&self, message: Option<&str>) -> Result<()> {
        self.lock()?.write_failure = message.map(str::to_string);
        Ok(())
    }

    /// Make every following subscribe fail with `TransientBackend`
    pub fn fail_subscriptions(&self, message: Option<&str>) -> Result<()> {
        self.lock()?.subscribe_failure = message.map(str::to_string);
        Ok(())
    }

    /// Push an error to every live query on `collection`
    pub fn push_error(&self, collection: &str, message: &str) {
        self.fanout
            .publish_error(collection, &Error::transient(message));
    }

    pub fn call_counts(&self) -> StoreCallCounts {
        self.lock().map(|s| s.calls).unwrap_or_default()
    }

    pub fn subscription_stats(&self) -> FanoutStats {
        self.fanout.stats()
    }

    /// Commit a write to `data`, publishing the pending state first when
    /// latency compensation is on
    fn commit(
        &self,
        state: &mut MemoryState,
        collection: &str,
        id: &str,
        mut data: DocumentData,
        write: &DocumentWrite,
    ) {
        if self.latency_compensation && has_server_timestamp(write) {
            let mut pending = data.clone();
            apply_write(&mut pending, write, &JsonValue::Null);
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), pending);
            let docs = state.documents(collection);
            self.fanout.publish(collection, &docs);
        }

        let resolved = timestamp_object(state.clock.tick());
        apply_write(&mut data, write, &resolved);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        let docs = state.documents(collection);
        self.fanout.publish(collection, &docs);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, write: DocumentWrite) -> Result<String> {
        let mut state = self.lock()?;
        state.calls.inserts += 1;
        state.check_writable()?;

        let id = Uuid::new_v4().simple().to_string();
        self.commit(&mut state, collection, &id, DocumentData::new(), &write);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<()> {
        let mut state = self.lock()?;
        state.calls.updates += 1;
        state.check_writable()?;

        let existing = state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{}/{}", collection, id)))?;
        self.commit(&mut state, collection, id, existing, &write);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.calls.deletes += 1;
        state.check_writable()?;

        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_none() {
            return Err(Error::not_found(format!("{}/{}", collection, id)));
        }
        let docs = state.documents(collection);
        self.fanout.publish(collection, &docs);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
        let mut state = self.lock()?;
        state.calls.gets += 1;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| StoredDocument {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<StoredDocument>> {
        let mut state = self.lock()?;
        state.calls.queries += 1;
        Ok(state
            .documents(collection)
            .into_iter()
            .filter(|doc| query.matches(&doc.data))
            .collect())
    }

    fn subscribe(&self, collection: &str, query: Query) -> Result<SnapshotStream> {
        let mut state = self.lock()?;
        state.calls.subscribes += 1;
        if let Some(msg) = &state.subscribe_failure {
            return Err(Error::transient(msg.clone()));
        }

        let initial = state
            .documents(collection)
            .into_iter()
            .filter(|doc| query.matches(&doc.data))
            .collect();
        Ok(self.fanout.register(collection, query, initial))
    }
}
