//! Integration tests for AutoGraph
//!
//! These tests run the offline queue against the real document store server
//! over HTTP, and drive the CLI binary.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use autograph_core::{CanvasDocument, ChangeKind, Element};
use autograph_server::{AutographServer, ServerConfig, ServerState};
use autograph_sync::remote::http::HttpDocumentStore;
use autograph_sync::{
    DocumentCache, DocumentStore, EditKind, FileStore, HoldReason, LocalStore, MemoryStore,
    OfflineSyncQueue, PendingEdit, RemoteConfig, SyncHealth, SyncPolicy,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Start a server on an ephemeral port and return its base URL and state.
async fn start_server() -> (String, Arc<ServerState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = AutographServer::new(ServerState::default(), ServerConfig::default());
    let state = server.state();
    tokio::spawn(server.serve(listener));
    (format!("http://{}", addr), state)
}

/// A URL nothing listens on.
async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn http_store(base_url: &str) -> Arc<dyn DocumentStore> {
    Arc::new(
        HttpDocumentStore::new(&RemoteConfig {
            base_url: base_url.to_string(),
            token: None,
            timeout_secs: 5,
        })
        .unwrap(),
    )
}

fn document(x: f64, fill: &str) -> CanvasDocument {
    CanvasDocument::new([
        Element::new("box", "rectangle").at(x, 0.0).styled("fill", fill),
        Element::new("label", "text").at(x, 40.0).with_text("Start"),
    ])
}

fn write(document: &CanvasDocument, base_version: Option<u64>) -> Value {
    json!({ "document": document, "base_version": base_version })
}

#[tokio::test]
async fn test_offline_edits_reach_the_server_after_restart() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("offline.json");

    // Offline session: every replay fails and the edits stay queued
    let offline_ids = {
        let store = Arc::new(FileStore::open(&store_path).unwrap());
        let queue =
            OfflineSyncQueue::open(store, http_store(&dead_url().await), SyncPolicy::default())
                .unwrap();
        let ids = vec![
            queue.enqueue("plan", EditKind::Create, write(&document(0.0, "#fff"), None)).unwrap(),
            queue.enqueue("plan", EditKind::Update, write(&document(50.0, "#fff"), Some(1))).unwrap(),
            queue.enqueue("notes", EditKind::Create, write(&document(0.0, "#000"), None)).unwrap(),
            queue.enqueue("plan", EditKind::Update, write(&document(50.0, "#f00"), Some(2))).unwrap(),
        ];

        let report = queue.flush().await.unwrap();
        assert_eq!(report.still_failing.len(), 4);
        assert_eq!(queue.status().unwrap().health(), SyncHealth::Retrying);
        ids
    };

    // Next session, store reachable
    let (url, state) = start_server().await;
    let store = Arc::new(FileStore::open(&store_path).unwrap());
    let queue = OfflineSyncQueue::open(store, http_store(&url), SyncPolicy::default()).unwrap();
    assert_eq!(queue.list_pending(None).unwrap().len(), 4);

    let report = queue.flush().await.unwrap();
    assert_eq!(report.applied.len(), 4);
    for id in &offline_ids {
        assert!(report.applied.contains(id));
    }
    assert!(queue.list_pending(None).unwrap().is_empty());
    assert_eq!(queue.status().unwrap().health(), SyncHealth::Idle);

    let (version, latest) = state.diagrams.latest("plan").unwrap();
    assert_eq!(version, 3);
    assert_eq!(latest, document(50.0, "#f00"));
    assert_eq!(state.diagrams.latest("notes").unwrap().0, 1);
}

#[tokio::test]
async fn test_stale_edit_is_held_as_conflict() {
    let (url, state) = start_server().await;
    state.diagrams.create("plan", document(0.0, "#fff")).unwrap();
    // Someone else saved version 2 meanwhile
    state.diagrams.update("plan", document(10.0, "#fff"), Some(1)).unwrap();

    let queue =
        OfflineSyncQueue::open(Arc::new(MemoryStore::new()), http_store(&url), SyncPolicy::default())
            .unwrap();
    let id = queue
        .enqueue("plan", EditKind::Update, write(&document(99.0, "#000"), Some(1)))
        .unwrap();

    let report = queue.flush().await.unwrap();
    assert!(report.still_failing.contains(&id));

    let edit = &queue.list_pending(Some("plan")).unwrap()[0];
    assert!(matches!(edit.hold_reason(), Some(HoldReason::Conflict { .. })));
    let status = queue.status().unwrap();
    assert_eq!(status.conflicts, 1);
    assert_eq!(status.health(), SyncHealth::NeedsAttention);
    assert_eq!(state.diagrams.latest("plan").unwrap().0, 2);

    // Rebased on the latest version and requeued
    let mut rebased = edit.clone();
    rebased.payload = write(&document(99.0, "#000"), Some(2));
    rebased.requeue();
    let store = MemoryStore::new();
    store.put_edit(&rebased).unwrap();
    let queue = OfflineSyncQueue::open(Arc::new(store), http_store(&url), SyncPolicy::default())
        .unwrap();
    let report = queue.flush().await.unwrap();
    assert!(report.applied.contains(&id));
    assert_eq!(state.diagrams.latest("plan").unwrap().0, 3);
}

#[tokio::test]
async fn test_rejected_edit_is_held() {
    let (url, _state) = start_server().await;
    let queue =
        OfflineSyncQueue::open(Arc::new(MemoryStore::new()), http_store(&url), SyncPolicy::default())
            .unwrap();
    // Updating a diagram the server never saw
    let id = queue
        .enqueue("ghost", EditKind::Update, write(&document(0.0, "#fff"), None))
        .unwrap();

    queue.flush().await.unwrap();
    let edit = &queue.list_pending(None).unwrap()[0];
    assert_eq!(edit.id, id);
    assert!(matches!(
        edit.hold_reason(),
        Some(HoldReason::Rejected { .. })
    ));

    let report = queue.flush().await.unwrap();
    assert!(report.held.contains(&id));
}

#[tokio::test]
async fn test_duplicate_delivery_creates_one_version() {
    let (url, state) = start_server().await;
    let remote = http_store(&url);

    let create = PendingEdit::new("plan", EditKind::Create, write(&document(0.0, "#fff"), None), 0);
    let update = PendingEdit::new("plan", EditKind::Update, write(&document(5.0, "#fff"), Some(1)), 1);

    remote.apply(&create).await.unwrap();
    remote.apply(&update).await.unwrap();
    // Crash before the local delete: both are sent again
    remote.apply(&create).await.unwrap();
    remote.apply(&update).await.unwrap();

    assert_eq!(state.diagrams.latest("plan").unwrap().0, 2);

    let delete = PendingEdit::new("plan", EditKind::Delete, Value::Null, 2);
    remote.apply(&delete).await.unwrap();
    remote.apply(&delete).await.unwrap();
    assert!(state.diagrams.latest("plan").is_err());
}

#[tokio::test]
async fn test_compare_versions_over_http() {
    let (url, state) = start_server().await;
    state.diagrams.create("plan", document(0.0, "#fff")).unwrap();
    state.diagrams.update("plan", document(30.0, "#000"), None).unwrap();

    let remote = http_store(&url);
    let cache = DocumentCache::new(Arc::new(MemoryStore::new()), remote);

    let diff = cache
        .compare(&Default::default(), "plan", 1, 2)
        .await
        .unwrap();
    assert!(diff.additions.is_empty() && diff.deletions.is_empty());
    let moved_box = diff.modification("box").unwrap();
    assert!(moved_box.has(ChangeKind::Moved));
    assert!(moved_box.has(ChangeKind::ColorChanged));
    assert!(diff.modification("label").unwrap().has(ChangeKind::Moved));
    assert_eq!(diff.summary().total_changes, 2);

    // The last fetched version is kept for offline use
    let cached = cache.cached("plan").unwrap().unwrap();
    assert!(cached.holds(2));
}

#[tokio::test]
async fn test_cached_version_used_when_offline() {
    let (url, state) = start_server().await;
    state.diagrams.create("plan", document(0.0, "#fff")).unwrap();

    let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
    let online = DocumentCache::new(Arc::clone(&store), http_store(&url));
    online.load("plan", 1).await.unwrap();

    let offline = DocumentCache::new(store, http_store(&dead_url().await));
    let loaded = tokio::time::timeout(Duration::from_secs(10), offline.load("plan", 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, document(0.0, "#fff"));
    assert!(offline.load("plan", 2).await.is_err());
}

fn autograph(root: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_autograph"));
    command
        .arg("--root")
        .arg(root)
        .env_remove("AUTOGRAPH_REMOTE_URL")
        .env_remove("AUTOGRAPH_TOKEN")
        .env_remove("AUTOGRAPH_DATA_DIR");
    command
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let dir = TempDir::new().unwrap();
    let output = autograph(dir.path()).arg("--help").output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Diagram version diffs and offline edit sync"));
    assert!(stdout.contains("queue"));
}

#[test]
fn test_cli_diff() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("old.json");
    let new = dir.path().join("new.json");
    std::fs::write(&old, serde_json::to_string(&document(0.0, "#fff")).unwrap()).unwrap();
    std::fs::write(&new, serde_json::to_string(&document(0.0, "#000").with_note("v2")).unwrap())
        .unwrap();

    let output = autograph(dir.path()).arg("diff").arg(&old).arg(&new).output().unwrap();
    assert!(output.status.success());

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["summary"]["modified_count"], 1);
    assert_eq!(result["summary"]["total_changes"], 1);
    assert_eq!(result["note_changed"], true);
    assert_eq!(result["modifications"][0]["change_kinds"], json!(["ColorChanged"]));
}

#[test]
fn test_cli_queue_without_remote() {
    let dir = TempDir::new().unwrap();

    let output = autograph(dir.path())
        .args(["queue", "enqueue", "--diagram", "plan", "--kind", "delete"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(id.starts_with("plan-"));
    assert!(dir.path().join(".autograph").join("offline.json").exists());

    let output = autograph(dir.path()).args(["queue", "flush"]).output().unwrap();
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["still_failing"], json!([id]));

    let output = autograph(dir.path()).args(["queue", "list"]).output().unwrap();
    let listing = String::from_utf8_lossy(&output.stdout);
    assert!(listing.contains(&id));
    assert!(listing.contains("failures=1"));

    let output = autograph(dir.path()).args(["queue", "clear"]).output().unwrap();
    assert!(!output.status.success());

    let output = autograph(dir.path()).args(["queue", "clear", "--yes"]).output().unwrap();
    assert!(output.status.success());

    let output = autograph(dir.path()).args(["queue", "status"]).output().unwrap();
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["health"], "Idle");
    assert_eq!(status["counts"]["pending"], 0);
}
