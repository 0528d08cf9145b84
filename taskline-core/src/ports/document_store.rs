//! Document store port - hosted collection store abstraction

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use super::Subscription;
use crate::domain::result::{Error, Result};

/// Field map of a stored document
pub type DocumentData = serde_json::Map<String, JsonValue>;

/// A single field in a write
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    /// Store this value as-is
    Value(JsonValue),
    /// Sentinel: the store assigns its own clock at commit time
    ServerTimestamp,
    /// Remove the field (merge writes only)
    Delete,
}

impl FieldWrite {
    pub fn value(v: impl Into<JsonValue>) -> Self {
        Self::Value(v.into())
    }
}

/// Fields written by an insert or merged by an update
pub type DocumentWrite = BTreeMap<String, FieldWrite>;

/// A document as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: DocumentData,
}

/// Conjunction of equality filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<(String, JsonValue)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn filters(&self) -> &[(String, JsonValue)] {
        &self.filters
    }

    /// Whether a document's fields satisfy every filter
    pub fn matches(&self, data: &DocumentData) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| data.get(field) == Some(value))
    }
}

/// One delivery on a snapshot stream
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Every document currently matching the query
    Snapshot(Vec<StoredDocument>),
    Error(Error),
}

/// Live result set of a query.
///
/// Owns the subscription handle; dropping the stream cancels it.
#[derive(Debug)]
pub struct SnapshotStream {
    events: mpsc::UnboundedReceiver<StoreEvent>,
    subscription: Subscription,
}

impl SnapshotStream {
    pub fn new(events: mpsc::UnboundedReceiver<StoreEvent>, subscription: Subscription) -> Self {
        Self {
            events,
            subscription,
        }
    }

    /// Wait for the next event. `None` once the store has closed the stream.
    pub async fn next(&mut self) -> Option<StoreEvent> {
        self.events.recv().await
    }

    /// Take an already delivered event without waiting
    pub fn try_next(&mut self) -> Option<StoreEvent> {
        self.events.try_recv().ok()
    }

    /// Cancel the underlying subscription
    pub fn close(self) {
        self.subscription.unsubscribe();
    }
}

/// Hosted document store abstraction
///
/// Writes never block on subscribers: every committed change is pushed to
/// matching live streams as a full snapshot, in commit order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document, returning its store-assigned id
    async fn insert(&self, collection: &str, write: DocumentWrite) -> Result<String>;

    /// Merge fields into an existing document. `NotFound` if it is absent.
    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<()>;

    /// Remove a document. `NotFound` if it is absent.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Read a single document
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>>;

    /// One-shot query
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<StoredDocument>>;

    /// Open a live query. The current result set is delivered immediately.
    fn subscribe(&self, collection: &str, query: Query) -> Result<SnapshotStream>;
}
