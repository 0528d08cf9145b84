//! Task view model - UI-facing state of the signed-in user's task list
//!
//! Follows the session: each identity change tears down the previous feed
//! before a new one is opened, so at most one store subscription is live.
//! Actions never touch `tasks` directly; the list only changes when the
//! store pushes a snapshot.

use tokio::sync::watch;

use super::session::SessionSnapshot;
use super::task_repository::{FeedEvent, TaskFeed, TaskRepository};
use crate::domain::result::{Error, Result};
use crate::domain::{same_identity, Task, TaskFilter, TaskPatch, UserIdentity};

/// What [`TaskViewModel::next_update`] applied
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// A session change was observed
    Session { identity_changed: bool },
    /// A snapshot replaced the task list
    Snapshot,
    /// The feed reported an error; the task list was kept
    Error(Error),
    /// The feed ended and was dropped
    FeedClosed,
}

enum Next {
    Session(bool),
    Feed(Option<FeedEvent>),
}

async fn next_feed_event(feed: Option<&mut TaskFeed>) -> Option<FeedEvent> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}

pub struct TaskViewModel {
    repository: TaskRepository,
    identity: Option<UserIdentity>,
    identity_known: bool,
    feed: Option<TaskFeed>,
    /// Last full snapshot, before filtering
    snapshot: Vec<Task>,
    tasks: Vec<Task>,
    loading: bool,
    error: Option<Error>,
    filter: TaskFilter,
}

impl TaskViewModel {
    pub fn new(repository: TaskRepository) -> Self {
        Self::with_filter(repository, TaskFilter::default())
    }

    pub fn with_filter(repository: TaskRepository, filter: TaskFilter) -> Self {
        Self {
            repository,
            identity: None,
            identity_known: false,
            feed: None,
            snapshot: Vec::new(),
            tasks: Vec::new(),
            loading: true,
            error: None,
            filter,
        }
    }

    /// Tasks visible under the current filter, newest first
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// The last full snapshot, unfiltered
    pub fn all_tasks(&self) -> &[Task] {
        &self.snapshot
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn has_feed(&self) -> bool {
        self.feed.is_some()
    }

    /// React to the signed-in identity. Returns whether the identity id
    /// changed (and the feed was re-derived).
    pub fn on_identity_changed(&mut self, identity: Option<UserIdentity>) -> bool {
        if self.identity_known && same_identity(self.identity.as_ref(), identity.as_ref()) {
            self.identity = identity;
            return false;
        }
        self.identity_known = true;

        if let Some(feed) = self.feed.take() {
            tracing::debug!(owner = feed.owner_id(), "closing task feed");
            feed.unsubscribe();
        }
        self.snapshot.clear();
        self.tasks.clear();
        self.error = None;

        match &identity {
            None => self.loading = false,
            Some(user) => {
                self.feed = Some(self.repository.subscribe(&user.id));
                self.loading = true;
            }
        }
        self.identity = identity;
        true
    }

    /// Apply a session snapshot. Ignored while the session is still loading.
    pub fn apply_session(&mut self, session: &SessionSnapshot) -> bool {
        if session.loading {
            return false;
        }
        self.on_identity_changed(session.identity.clone())
    }

    /// Apply the receiver's current session value and mark it seen
    pub fn sync_session(&mut self, session: &mut watch::Receiver<SessionSnapshot>) -> bool {
        let snapshot = session.borrow_and_update().clone();
        self.apply_session(&snapshot)
    }

    /// Apply one feed event
    pub fn apply(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Snapshot(tasks) => {
                self.tasks = self.filter.apply(&tasks);
                self.snapshot = tasks;
                self.error = None;
            }
            FeedEvent::Error(e) => {
                tracing::warn!(error = %e, "task feed error");
                self.error = Some(e);
            }
        }
        self.loading = false;
    }

    /// Change the projection. Never calls the repository.
    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
        self.tasks = filter.apply(&self.snapshot);
    }

    /// Apply every feed event already delivered, without waiting.
    /// Returns how many were applied.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.feed.as_mut().and_then(TaskFeed::try_next) {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next session change or feed event and apply it.
    ///
    /// Returns `None` once the session channel has closed.
    pub async fn next_update(
        &mut self,
        session: &mut watch::Receiver<SessionSnapshot>,
    ) -> Option<ViewUpdate> {
        let next = tokio::select! {
            changed = session.changed() => Next::Session(changed.is_ok()),
            event = next_feed_event(self.feed.as_mut()) => Next::Feed(event),
        };

        match next {
            Next::Session(false) => None,
            Next::Session(true) => {
                let identity_changed = self.sync_session(session);
                Some(ViewUpdate::Session { identity_changed })
            }
            Next::Feed(Some(event)) => {
                let update = match &event {
                    FeedEvent::Snapshot(_) => ViewUpdate::Snapshot,
                    FeedEvent::Error(e) => ViewUpdate::Error(e.clone()),
                };
                self.apply(event);
                Some(update)
            }
            Next::Feed(None) => {
                self.feed = None;
                Some(ViewUpdate::FeedClosed)
            }
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if !e.is_local() {
                self.error = Some(e.clone());
            }
        }
        result
    }

    /// Create a task for the signed-in user, returning its id
    pub async fn add_task(&mut self, title: &str, description: Option<&str>) -> Result<String> {
        let owner_id = match &self.identity {
            Some(user) => user.id.clone(),
            None => return Err(Error::Unauthenticated),
        };
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("task title must not be empty"));
        }

        let result = self
            .repository
            .create_task(Some(&owner_id), title, description)
            .await;
        self.record(result)
    }

    /// Merge `patch` into a task. Requires a signed-in user.
    pub async fn update_task(&mut self, task_id: &str, patch: TaskPatch) -> Result<()> {
        if self.identity.is_none() {
            return Err(Error::Unauthenticated);
        }
        let result = self.repository.update_task(task_id, patch).await;
        self.record(result)
    }

    /// Flip completion based on the last full snapshot. Unknown ids are
    /// ignored.
    pub async fn toggle(&mut self, task_id: &str) -> Result<()> {
        let Some(completed) = self
            .snapshot
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.completed)
        else {
            return Ok(());
        };

        let result = self
            .repository
            .toggle_completion(task_id, !completed)
            .await;
        self.record(result)
    }

    pub async fn remove(&mut self, task_id: &str) -> Result<()> {
        let result = self.repository.delete_task(task_id).await;
        self.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryDocumentStore;
    use std::sync::Arc;

    fn setup() -> (Arc<InMemoryDocumentStore>, TaskViewModel) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let vm = TaskViewModel::new(TaskRepository::new(store.clone()));
        (store, vm)
    }

    fn alice() -> UserIdentity {
        UserIdentity::new("u1", "alice@example.com")
    }

    #[test]
    fn test_initial_state() {
        let (_store, vm) = setup();
        assert!(vm.is_loading());
        assert!(vm.tasks().is_empty());
        assert!(vm.error().is_none());
        assert_eq!(vm.filter(), TaskFilter::All);
    }

    #[test]
    fn test_first_none_stops_loading() {
        let (store, mut vm) = setup();
        assert!(vm.on_identity_changed(None));
        assert!(!vm.is_loading());
        assert!(!vm.has_feed());
        assert_eq!(store.call_counts().subscribes, 0);

        assert!(!vm.on_identity_changed(None));
    }

    #[test]
    fn test_loading_session_is_ignored() {
        let (_store, mut vm) = setup();
        assert!(!vm.apply_session(&SessionSnapshot::default()));
        assert!(vm.is_loading());
    }

    #[test]
    fn test_same_id_does_not_resubscribe() {
        let (store, mut vm) = setup();
        vm.on_identity_changed(Some(alice()));
        let renamed = UserIdentity::new("u1", "alice@new.example.com");
        assert!(!vm.on_identity_changed(Some(renamed.clone())));

        assert_eq!(store.call_counts().subscribes, 1);
        assert_eq!(vm.identity(), Some(&renamed));
    }

    #[tokio::test]
    async fn test_snapshot_clears_error_and_loading() {
        let (store, mut vm) = setup();
        vm.on_identity_changed(Some(alice()));
        assert!(vm.is_loading());

        assert_eq!(vm.drain_pending(), 1);
        assert!(!vm.is_loading());

        store.push_error("tasks", "connection reset");
        vm.drain_pending();
        assert!(matches!(vm.error(), Some(Error::TransientBackend(_))));

        vm.add_task("Buy milk", None).await.unwrap();
        vm.drain_pending();
        assert!(vm.error().is_none());
        assert_eq!(vm.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_errors_are_stored_local_errors_are_not() {
        let (store, mut vm) = setup();
        vm.on_identity_changed(Some(alice()));
        vm.drain_pending();

        assert!(matches!(
            vm.add_task("  ", None).await,
            Err(Error::Validation(_))
        ));
        assert!(vm.error().is_none());

        store.fail_writes(Some("offline")).unwrap();
        let err = vm.add_task("Buy milk", None).await.unwrap_err();
        assert_eq!(vm.error(), Some(&err));
    }

    #[tokio::test]
    async fn test_toggle_unknown_id_is_noop() {
        let (store, mut vm) = setup();
        vm.on_identity_changed(Some(alice()));
        vm.drain_pending();

        vm.toggle("missing").await.unwrap();
        assert_eq!(store.call_counts().updates, 0);
    }

    #[tokio::test]
    async fn test_update_after_logout_is_unauthenticated() {
        let (store, mut vm) = setup();
        vm.on_identity_changed(Some(alice()));
        let id = vm.add_task("Buy milk", None).await.unwrap();
        vm.drain_pending();

        vm.on_identity_changed(None);
        let err = vm
            .update_task(&id, TaskPatch::new().title("Buy oat milk"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Unauthenticated);
        assert!(vm.error().is_none());
        assert_eq!(store.call_counts().updates, 0);
    }
}
