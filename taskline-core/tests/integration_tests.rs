//! Integration tests for taskline-core against the local DuckDB backend
//!
//! Every test opens a real database in a temporary data directory.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use tempfile::TempDir;

use taskline_core::{TaskFilter, TasklineContext};

// ============================================================================
// Test Helpers
// ============================================================================

fn open(dir: &TempDir) -> TasklineContext {
    TasklineContext::new(dir.path()).expect("Failed to open context")
}

fn titles(tasks: &[taskline_core::Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.title.as_str()).collect()
}

// ============================================================================
// End-to-end flow
// ============================================================================

#[tokio::test]
async fn test_register_add_toggle_remove() {
    let dir = TempDir::new().unwrap();
    let ctx = open(&dir);
    let mut session = ctx.session();
    let mut rx = session.watch();
    let mut vm = ctx.view_model();

    vm.sync_session(&mut rx);
    assert!(vm.identity().is_none());

    session.register("alice@example.com", "secret1").await.unwrap();
    vm.sync_session(&mut rx);
    vm.drain_pending();
    assert!(vm.tasks().is_empty());
    assert!(!vm.is_loading());

    let milk = vm.add_task("Buy milk", None).await.unwrap();
    vm.add_task("Call mom", Some("Sunday")).await.unwrap();
    vm.drain_pending();
    assert_eq!(titles(vm.tasks()), vec!["Call mom", "Buy milk"]);

    vm.toggle(&milk).await.unwrap();
    vm.drain_pending();
    vm.set_filter(TaskFilter::Completed);
    assert_eq!(titles(vm.tasks()), vec!["Buy milk"]);
    vm.set_filter(TaskFilter::Active);
    assert_eq!(titles(vm.tasks()), vec!["Call mom"]);

    vm.remove(&milk).await.unwrap();
    vm.drain_pending();
    vm.set_filter(TaskFilter::All);
    assert_eq!(titles(vm.tasks()), vec!["Call mom"]);
}

#[tokio::test]
async fn test_data_and_session_survive_reopen() {
    let dir = TempDir::new().unwrap();

    let owner = {
        let ctx = open(&dir);
        let user = ctx
            .gateway
            .register("alice@example.com", "secret1")
            .await
            .unwrap();
        ctx.repository
            .create_task(Some(&user.id), "Buy milk", None)
            .await
            .unwrap();
        user.id
    };

    let ctx = open(&dir);
    assert_eq!(ctx.data_dir(), dir.path());
    assert!(ctx.data_dir().join(taskline_core::DB_FILENAME).exists());
    let session = ctx.session();
    let snapshot = session.wait_until_loaded().await;
    assert_eq!(snapshot.identity.map(|u| u.id), Some(owner.clone()));

    let tasks = ctx.repository.list_tasks(&owner, TaskFilter::All).await.unwrap();
    assert_eq!(titles(&tasks), vec!["Buy milk"]);
    assert_eq!(tasks[0].owner_id, owner);
    assert!(tasks[0].created_at <= tasks[0].updated_at);
}

#[tokio::test]
async fn test_users_only_see_their_own_tasks() {
    let dir = TempDir::new().unwrap();
    let ctx = open(&dir);
    let mut session = ctx.session();
    let mut rx = session.watch();
    let mut vm = ctx.view_model();

    session.register("alice@example.com", "secret1").await.unwrap();
    vm.sync_session(&mut rx);
    vm.add_task("Alice's task", None).await.unwrap();
    vm.drain_pending();
    assert_eq!(vm.tasks().len(), 1);

    session.logout().await.unwrap();
    vm.sync_session(&mut rx);
    assert!(vm.tasks().is_empty());

    session.register("bob@example.com", "secret2").await.unwrap();
    vm.sync_session(&mut rx);
    vm.drain_pending();
    assert!(vm.tasks().is_empty());

    vm.add_task("Bob's task", None).await.unwrap();
    vm.drain_pending();
    assert_eq!(titles(vm.tasks()), vec!["Bob's task"]);
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_settings_select_filter_and_collection() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{ "app": { "defaultFilter": "active", "collection": "todo" } }"#,
    )
    .unwrap();

    let ctx = open(&dir);
    assert_eq!(ctx.repository.collection(), "todo");

    let user = ctx
        .gateway
        .register("alice@example.com", "secret1")
        .await
        .unwrap();
    let id = ctx
        .repository
        .create_task(Some(&user.id), "Buy milk", None)
        .await
        .unwrap();
    ctx.repository.toggle_completion(&id, true).await.unwrap();

    let mut vm = ctx.view_model();
    vm.on_identity_changed(Some(user));
    vm.drain_pending();
    assert!(vm.tasks().is_empty());
    assert_eq!(vm.all_tasks().len(), 1);
}
