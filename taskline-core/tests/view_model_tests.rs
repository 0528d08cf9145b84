//! Task view model behaviour against the in-memory adapters
//!
//! Run with: cargo test --test view_model_tests

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tokio::sync::watch;

use taskline_core::adapters::{InMemoryCredentialGateway, InMemoryDocumentStore};
use taskline_core::ports::{DocumentData, DocumentStore};
use taskline_core::services::{SessionState, TaskRepository, TaskViewModel};
use taskline_core::{Error, FeedEvent, SessionSnapshot, TaskFilter, TaskPatch, UserIdentity, ViewUpdate};

// ============================================================================
// Test Helpers
// ============================================================================

fn setup() -> (Arc<InMemoryDocumentStore>, TaskViewModel) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let vm = TaskViewModel::new(TaskRepository::new(store.clone()));
    (store, vm)
}

fn user(id: &str) -> UserIdentity {
    UserIdentity::new(id, format!("{}@example.com", id))
}

fn stored_task(owner: &str, title: &str, completed: bool, created_secs: i64) -> DocumentData {
    json!({
        "userId": owner,
        "title": title,
        "completed": completed,
        "createdAt": { "seconds": created_secs, "nanos": 0 },
        "updatedAt": { "seconds": created_secs, "nanos": 0 },
    })
    .as_object()
    .unwrap()
    .clone()
}

fn ids(vm: &TaskViewModel) -> Vec<String> {
    vm.tasks().iter().map(|t| t.id.clone()).collect()
}

// ============================================================================
// Projection
// ============================================================================

#[tokio::test]
async fn test_filter_projection_for_seeded_user() {
    let (store, mut vm) = setup();
    store.seed("tasks", "t1", stored_task("u1", "Write report", false, 10)).unwrap();
    store.seed("tasks", "t2", stored_task("u1", "Pay rent", true, 20)).unwrap();
    store.seed("tasks", "t3", stored_task("u2", "Not mine", false, 30)).unwrap();

    vm.on_identity_changed(Some(user("u1")));
    vm.drain_pending();
    let calls = store.call_counts();

    vm.set_filter(TaskFilter::Active);
    assert_eq!(ids(&vm), vec!["t1"]);

    vm.set_filter(TaskFilter::Completed);
    assert_eq!(ids(&vm), vec!["t2"]);

    vm.set_filter(TaskFilter::All);
    assert_eq!(ids(&vm), vec!["t2", "t1"]);

    // Re-projection is local
    assert_eq!(store.call_counts(), calls);
}

#[tokio::test]
async fn test_snapshots_follow_create_update_delete() {
    let (_store, mut vm) = setup();
    vm.on_identity_changed(Some(user("u1")));
    vm.drain_pending();
    assert!(vm.tasks().is_empty());

    let first = vm.add_task("First", None).await.unwrap();
    let second = vm.add_task("Second", Some("details")).await.unwrap();
    // Actions never touch the list directly
    assert!(vm.tasks().is_empty());

    vm.drain_pending();
    assert_eq!(ids(&vm), vec![second.clone(), first.clone()]);
    assert_eq!(vm.tasks()[0].description, "details");
    assert_eq!(vm.tasks()[1].description, "");

    vm.update_task(&first, TaskPatch::new().title("First, renamed"))
        .await
        .unwrap();
    vm.drain_pending();
    assert_eq!(vm.tasks()[1].title, "First, renamed");

    vm.remove(&second).await.unwrap();
    vm.drain_pending();
    assert_eq!(ids(&vm), vec![first]);
}

#[tokio::test]
async fn test_feed_breaks_created_at_ties_by_id() {
    let store = Arc::new(InMemoryDocumentStore::new());
    for (id, secs) in [("t3", 10), ("t0", 5), ("t1", 10), ("t9", 20), ("t2", 10)] {
        store.seed("tasks", id, stored_task("u1", id, false, secs)).unwrap();
    }

    let mut feed = TaskRepository::new(store.clone()).subscribe("u1");
    match feed.try_next() {
        Some(FeedEvent::Snapshot(tasks)) => {
            let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
            assert_eq!(ids, vec!["t9", "t1", "t2", "t3", "t0"]);
        }
        other => panic!("expected a snapshot, got {:?}", other),
    }
}

/// Display order of `(id, created_secs, completed)` rows
fn expected_order(model: &[(String, i64, bool)]) -> Vec<String> {
    let mut rows: Vec<_> = model.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter().map(|(id, _, _)| id.clone()).collect()
}

#[tokio::test]
async fn test_random_operation_sequences_keep_order_and_liveness() {
    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (store, mut vm) = setup();
        // Another user's writes must never show up
        store.seed("tasks", "other", stored_task("u2", "Not mine", false, 3)).unwrap();
        vm.on_identity_changed(Some(user("u1")));
        vm.drain_pending();

        let mut model: Vec<(String, i64, bool)> = Vec::new();
        for step in 0..40 {
            match rng.gen_range(0..4) {
                // Few distinct timestamps so ties are common
                0 | 1 => {
                    let id = format!("t{:02}", step);
                    let secs = rng.gen_range(0..4);
                    store.seed("tasks", &id, stored_task("u1", &id, false, secs)).unwrap();
                    model.push((id, secs, false));
                }
                2 if !model.is_empty() => {
                    let i = rng.gen_range(0..model.len());
                    vm.toggle(&model[i].0).await.unwrap();
                    model[i].2 = !model[i].2;
                }
                3 if !model.is_empty() => {
                    let i = rng.gen_range(0..model.len());
                    let (id, _, _) = model.remove(i);
                    vm.remove(&id).await.unwrap();
                }
                _ => continue,
            }

            vm.drain_pending();
            assert_eq!(ids(&vm), expected_order(&model), "seed {} step {}", seed, step);
            for task in vm.tasks() {
                assert_eq!(task.owner_id, "u1");
                let expected = model.iter().find(|(id, _, _)| *id == task.id).map(|m| m.2);
                assert_eq!(Some(task.completed), expected, "seed {} step {}", seed, step);
            }
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

#[tokio::test]
async fn test_blank_titles_never_reach_the_store() {
    let (store, mut vm) = setup();
    vm.on_identity_changed(Some(user("u1")));
    vm.drain_pending();

    for title in ["", "   "] {
        assert!(matches!(
            vm.add_task(title, None).await,
            Err(Error::Validation(_))
        ));
    }
    assert_eq!(store.call_counts().inserts, 0);
    assert!(vm.error().is_none());
}

#[tokio::test]
async fn test_add_without_identity_is_unauthenticated() {
    let (store, mut vm) = setup();
    vm.on_identity_changed(None);

    let err = vm.add_task("Buy milk", None).await.unwrap_err();
    assert_eq!(err, Error::Unauthenticated);
    assert_eq!(store.call_counts().total(), 0);
}

#[tokio::test]
async fn test_toggle_uses_last_applied_snapshot() {
    let (store, mut vm) = setup();
    store.seed("tasks", "t1", stored_task("u1", "Write report", false, 10)).unwrap();
    vm.on_identity_changed(Some(user("u1")));
    vm.drain_pending();

    vm.toggle("t1").await.unwrap();
    let doc = store.get("tasks", "t1").await.unwrap().unwrap();
    assert_eq!(doc.data["completed"], json!(true));

    // Not yet applied: the local snapshot still says active
    vm.toggle("t1").await.unwrap();
    let doc = store.get("tasks", "t1").await.unwrap().unwrap();
    assert_eq!(doc.data["completed"], json!(true));

    vm.drain_pending();
    vm.toggle("t1").await.unwrap();
    let doc = store.get("tasks", "t1").await.unwrap().unwrap();
    assert_eq!(doc.data["completed"], json!(false));
}

#[tokio::test]
async fn test_toggle_on_filtered_out_task() {
    let (store, mut vm) = setup();
    store.seed("tasks", "t2", stored_task("u1", "Pay rent", true, 20)).unwrap();
    vm.on_identity_changed(Some(user("u1")));
    vm.drain_pending();
    vm.set_filter(TaskFilter::Active);
    assert!(vm.tasks().is_empty());

    vm.toggle("t2").await.unwrap();
    vm.drain_pending();
    assert_eq!(ids(&vm), vec!["t2"]);
}

// ============================================================================
// Subscription lifecycle
// ============================================================================

#[tokio::test]
async fn test_identity_switch_never_overlaps_feeds() {
    let (store, mut vm) = setup();

    vm.on_identity_changed(Some(user("a")));
    assert_eq!(store.subscription_stats().active, 1);

    vm.on_identity_changed(None);
    let stats = store.subscription_stats();
    assert_eq!((stats.active, stats.closed), (0, 1));
    assert!(vm.tasks().is_empty());
    assert!(!vm.is_loading());

    vm.on_identity_changed(Some(user("b")));
    let stats = store.subscription_stats();
    assert_eq!((stats.opened, stats.active), (2, 1));

    drop(vm);
    let stats = store.subscription_stats();
    assert_eq!((stats.opened, stats.closed, stats.active), (2, 2, 0));
    assert_eq!(store.call_counts().subscribes, 2);
}

#[tokio::test]
async fn test_direct_switch_clears_previous_user_tasks() {
    let (store, mut vm) = setup();
    store.seed("tasks", "t1", stored_task("a", "A's task", false, 10)).unwrap();

    vm.on_identity_changed(Some(user("a")));
    vm.drain_pending();
    assert_eq!(vm.tasks().len(), 1);

    vm.on_identity_changed(Some(user("b")));
    assert!(vm.tasks().is_empty());
    assert!(vm.is_loading());
    assert_eq!(store.subscription_stats().active, 1);

    vm.drain_pending();
    assert!(vm.tasks().is_empty());
    assert!(!vm.is_loading());
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_feed_error_keeps_tasks() {
    let (store, mut vm) = setup();
    store.seed("tasks", "t1", stored_task("u1", "Write report", false, 10)).unwrap();
    vm.on_identity_changed(Some(user("u1")));
    vm.drain_pending();

    store.push_error("tasks", "connection reset");
    vm.drain_pending();
    assert!(matches!(vm.error(), Some(Error::TransientBackend(_))));
    assert_eq!(ids(&vm), vec!["t1"]);
    assert!(!vm.is_loading());

    store.seed("tasks", "t2", stored_task("u1", "Pay rent", false, 20)).unwrap();
    vm.drain_pending();
    assert!(vm.error().is_none());
    assert_eq!(ids(&vm), vec!["t2", "t1"]);
}

#[tokio::test]
async fn test_write_failure_is_stored_and_returned() {
    let (store, mut vm) = setup();
    store.seed("tasks", "t1", stored_task("u1", "Write report", false, 10)).unwrap();
    vm.on_identity_changed(Some(user("u1")));
    vm.drain_pending();

    store.fail_writes(Some("offline")).unwrap();
    let err = vm.toggle("t1").await.unwrap_err();
    assert!(matches!(err, Error::TransientBackend(_)));
    assert_eq!(vm.error(), Some(&err));
    assert_eq!(ids(&vm), vec!["t1"]);
}

#[tokio::test]
async fn test_refused_subscription_surfaces_as_error() {
    let (store, mut vm) = setup();
    store.fail_subscriptions(Some("permission denied")).unwrap();
    let (_tx, mut rx) = watch::channel(SessionSnapshot::default());

    vm.on_identity_changed(Some(user("u1")));
    assert!(vm.has_feed());

    match vm.next_update(&mut rx).await {
        Some(ViewUpdate::Error(Error::TransientBackend(msg))) => {
            assert_eq!(msg, "permission denied")
        }
        other => panic!("unexpected update: {:?}", other),
    }
    assert!(!vm.is_loading());
    assert!(vm.tasks().is_empty());

    assert_eq!(vm.next_update(&mut rx).await, Some(ViewUpdate::FeedClosed));
    assert!(!vm.has_feed());
    assert_eq!(store.subscription_stats().opened, 0);
}

#[tokio::test]
async fn test_pending_server_timestamps_read_as_now() {
    let store = Arc::new(InMemoryDocumentStore::new().with_latency_compensation());
    let mut vm = TaskViewModel::new(TaskRepository::new(store.clone()));
    vm.on_identity_changed(Some(user("u1")));
    vm.drain_pending();

    let before = chrono::Utc::now();
    vm.add_task("Buy milk", None).await.unwrap();

    // Pending snapshot, then resolved snapshot
    assert_eq!(vm.drain_pending(), 2);
    let task = &vm.tasks()[0];
    assert_eq!(task.title, "Buy milk");
    assert!(task.created_at >= before - chrono::Duration::seconds(1));
}

// ============================================================================
// Event loop
// ============================================================================

#[tokio::test]
async fn test_event_loop_follows_session() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let gateway = Arc::new(InMemoryCredentialGateway::new());
    let mut session = SessionState::new(gateway.clone());
    let mut vm = TaskViewModel::new(TaskRepository::new(store.clone()));
    let mut rx = session.watch();

    assert!(vm.sync_session(&mut rx));
    assert!(!vm.is_loading());

    session.register("alice@example.com", "secret1").await.unwrap();
    assert_eq!(
        vm.next_update(&mut rx).await,
        Some(ViewUpdate::Session { identity_changed: true })
    );
    assert!(vm.has_feed());
    assert_eq!(vm.next_update(&mut rx).await, Some(ViewUpdate::Snapshot));

    vm.add_task("Buy milk", None).await.unwrap();
    assert_eq!(vm.next_update(&mut rx).await, Some(ViewUpdate::Snapshot));
    assert_eq!(vm.tasks().len(), 1);

    session.logout().await.unwrap();
    assert_eq!(
        vm.next_update(&mut rx).await,
        Some(ViewUpdate::Session { identity_changed: true })
    );
    assert!(vm.tasks().is_empty());
    assert_eq!(store.subscription_stats().active, 0);

    session.close();
    assert_eq!(gateway.listener_count(), 0);
    assert_eq!(vm.next_update(&mut rx).await, None);
}
