//! Task repository - the only component that talks to the document store
//!
//! Translates between stored documents and [`Task`], owns the live query
//! for a user's tasks and applies the read-side normalization every
//! consumer relies on.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};
use crate::domain::{sort_tasks, Task, TaskFilter, TaskPatch};
use crate::ports::{
    DocumentStore, DocumentWrite, FieldWrite, Query, SnapshotStream, StoreEvent, StoredDocument,
};

/// Collection used when none is configured
pub const DEFAULT_COLLECTION: &str = "tasks";

const FIELD_USER_ID: &str = "userId";
const FIELD_TITLE: &str = "title";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_COMPLETED: &str = "completed";
const FIELD_CREATED_AT: &str = "createdAt";
const FIELD_UPDATED_AT: &str = "updatedAt";

/// One delivery on a task feed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The full, normalized, ordered set of the owner's tasks
    Snapshot(Vec<Task>),
    Error(Error),
}

enum FeedSource {
    Live(SnapshotStream),
    /// Subscription could not be established; holds the error until read
    Failed(Option<Error>),
}

/// Live feed of one user's tasks.
///
/// Dropping the feed cancels the underlying store subscription.
pub struct TaskFeed {
    owner_id: String,
    source: FeedSource,
}

impl TaskFeed {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// False for a feed whose subscription was refused by the store
    pub fn is_live(&self) -> bool {
        matches!(self.source, FeedSource::Live(_))
    }

    /// Wait for the next event. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        match &mut self.source {
            FeedSource::Live(stream) => stream.next().await.map(into_feed_event),
            FeedSource::Failed(error) => error.take().map(FeedEvent::Error),
        }
    }

    /// Take an already delivered event without waiting
    pub fn try_next(&mut self) -> Option<FeedEvent> {
        match &mut self.source {
            FeedSource::Live(stream) => stream.try_next().map(into_feed_event),
            FeedSource::Failed(error) => error.take().map(FeedEvent::Error),
        }
    }

    /// Cancel the store subscription now
    pub fn unsubscribe(self) {
        if let FeedSource::Live(stream) = self.source {
            stream.close();
        }
    }
}

impl std::fmt::Debug for TaskFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFeed")
            .field("owner_id", &self.owner_id)
            .field("live", &self.is_live())
            .finish()
    }
}

fn into_feed_event(event: StoreEvent) -> FeedEvent {
    match event {
        StoreEvent::Snapshot(docs) => FeedEvent::Snapshot(normalize_snapshot(&docs)),
        StoreEvent::Error(e) => FeedEvent::Error(e),
    }
}

/// Coerce a stored timestamp to `DateTime<Utc>`.
///
/// Accepts `{seconds, nanos|nanoseconds}` objects, RFC 3339 strings and
/// epoch milliseconds. Anything else, including a pending `null`, reads as
/// `now`.
pub fn coerce_timestamp(value: Option<&JsonValue>, now: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = match value {
        Some(JsonValue::Object(obj)) => obj.get("seconds").and_then(JsonValue::as_i64).and_then(
            |seconds| {
                let nanos = obj
                    .get("nanos")
                    .or_else(|| obj.get("nanoseconds"))
                    .and_then(JsonValue::as_u64)
                    .unwrap_or(0);
                u32::try_from(nanos)
                    .ok()
                    .and_then(|nanos| Utc.timestamp_opt(seconds, nanos).single())
            },
        ),
        Some(JsonValue::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    };
    parsed.unwrap_or(now)
}

fn string_field(doc: &StoredDocument, field: &str) -> String {
    doc.data
        .get(field)
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Read a stored document as a task, filling defaults for missing fields
pub fn normalize_document(doc: &StoredDocument, now: DateTime<Utc>) -> Task {
    Task {
        id: doc.id.clone(),
        owner_id: string_field(doc, FIELD_USER_ID),
        title: string_field(doc, FIELD_TITLE),
        description: string_field(doc, FIELD_DESCRIPTION),
        completed: doc
            .data
            .get(FIELD_COMPLETED)
            .and_then(JsonValue::as_bool)
            .unwrap_or(false),
        created_at: coerce_timestamp(doc.data.get(FIELD_CREATED_AT), now),
        updated_at: coerce_timestamp(doc.data.get(FIELD_UPDATED_AT), now),
    }
}

fn normalize_snapshot(docs: &[StoredDocument]) -> Vec<Task> {
    let now = Utc::now();
    let mut tasks: Vec<Task> = docs.iter().map(|d| normalize_document(d, now)).collect();
    sort_tasks(&mut tasks);
    tasks
}

fn require_title(title: &str) -> Result<&str> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("task title must not be empty"));
    }
    Ok(trimmed)
}

/// Repository of tasks in a document store collection
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_collection(store, DEFAULT_COLLECTION)
    }

    pub fn with_collection(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create a task owned by `owner_id`, returning its id
    pub async fn create_task(
        &self,
        owner_id: Option<&str>,
        title: &str,
        description: Option<&str>,
    ) -> Result<String> {
        let owner_id = match owner_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(Error::Unauthenticated),
        };
        let title = require_title(title)?;

        let mut write = DocumentWrite::new();
        write.insert(FIELD_USER_ID.into(), FieldWrite::value(owner_id));
        write.insert(FIELD_TITLE.into(), FieldWrite::value(title));
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            write.insert(FIELD_DESCRIPTION.into(), FieldWrite::value(description));
        }
        write.insert(FIELD_COMPLETED.into(), FieldWrite::value(false));
        write.insert(FIELD_CREATED_AT.into(), FieldWrite::ServerTimestamp);
        write.insert(FIELD_UPDATED_AT.into(), FieldWrite::ServerTimestamp);

        let id = self.store.insert(&self.collection, write).await?;
        tracing::debug!(task = %id, "task created");
        Ok(id)
    }

    /// Merge `patch` into a task and refresh its `updatedAt`
    pub async fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<()> {
        let mut write = DocumentWrite::new();
        if let Some(title) = &patch.title {
            write.insert(FIELD_TITLE.into(), FieldWrite::value(require_title(title)?));
        }
        match patch.description {
            Some(Some(description)) if !description.is_empty() => {
                write.insert(FIELD_DESCRIPTION.into(), FieldWrite::value(description));
            }
            Some(_) => {
                write.insert(FIELD_DESCRIPTION.into(), FieldWrite::Delete);
            }
            None => {}
        }
        if let Some(completed) = patch.completed {
            write.insert(FIELD_COMPLETED.into(), FieldWrite::value(completed));
        }
        write.insert(FIELD_UPDATED_AT.into(), FieldWrite::ServerTimestamp);

        self.store.update(&self.collection, task_id, write).await?;
        tracing::debug!(task = task_id, "task updated");
        Ok(())
    }

    /// Delete a task. Deleting an already absent task succeeds.
    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        match self.store.delete(&self.collection, task_id).await {
            Ok(()) => {
                tracing::debug!(task = task_id, "task deleted");
                Ok(())
            }
            Err(Error::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn toggle_completion(&self, task_id: &str, completed: bool) -> Result<()> {
        self.update_task(task_id, TaskPatch::new().completed(completed))
            .await
    }

    /// Open a live feed of `owner_id`'s tasks.
    ///
    /// Never fails: when the store refuses the subscription the feed is
    /// inert and yields the refusal once as [`FeedEvent::Error`].
    pub fn subscribe(&self, owner_id: &str) -> TaskFeed {
        let query = Query::new().where_eq(FIELD_USER_ID, owner_id);
        let source = match self.store.subscribe(&self.collection, query) {
            Ok(stream) => {
                tracing::debug!(owner = owner_id, "task feed opened");
                FeedSource::Live(stream)
            }
            Err(e) => {
                tracing::warn!(owner = owner_id, error = %e, "task feed could not be opened");
                FeedSource::Failed(Some(e))
            }
        };
        TaskFeed {
            owner_id: owner_id.to_string(),
            source,
        }
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self
            .store
            .get(&self.collection, task_id)
            .await?
            .map(|doc| normalize_document(&doc, Utc::now())))
    }

    /// One-shot read of `owner_id`'s tasks under `filter`, in display order
    pub async fn list_tasks(&self, owner_id: &str, filter: TaskFilter) -> Result<Vec<Task>> {
        let query = Query::new().where_eq(FIELD_USER_ID, owner_id);
        let docs = self.store.query(&self.collection, &query).await?;
        Ok(filter.apply(&normalize_snapshot(&docs)))
    }
}
