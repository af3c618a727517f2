//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use autograph_core::CanvasDocument;
use autograph_server::{AutographServer, ServerState};
use autograph_sync::{
    create_document_store, run_sync_loop, DocumentCache, DocumentStore, EditKind, EditState,
    FileStore, LocalStore, OfflineSyncQueue, PendingEdit,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::config::Config;
use crate::QueueAction;

pub async fn serve(config: &Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut server_config = config.server();
    if let Some(host) = host {
        server_config.host = host;
    }
    if let Some(port) = port {
        server_config.port = port;
    }
    tracing::info!(
        "Starting AutoGraph document store on {}:{}",
        server_config.host,
        server_config.port
    );

    let server = AutographServer::new(ServerState::new(config.engine()), server_config);
    server.start().await
}

pub fn diff(config: &Config, old: &Path, new: &Path, pretty: bool) -> anyhow::Result<()> {
    let v1 = read_document(old)?;
    let v2 = read_document(new)?;

    let result = config.engine().compare(&v1, &v2);
    tracing::debug!("{} changes", result.summary().total_changes);
    print_json(&result, pretty)
}

pub async fn compare(
    root: &Path,
    config: &Config,
    diagram_id: &str,
    from: u64,
    to: u64,
) -> anyhow::Result<()> {
    let store = open_store(root, config)?;
    let remote = open_remote(config)?;
    let cache = DocumentCache::new(store, remote);

    let result = cache
        .compare(&config.engine(), diagram_id, from, to)
        .await
        .with_context(|| format!("Failed to compare {} v{}..v{}", diagram_id, from, to))?;
    print_json(&result, true)
}

pub async fn queue(root: &Path, config: &Config, action: QueueAction) -> anyhow::Result<()> {
    let queue = OfflineSyncQueue::open(open_store(root, config)?, open_remote(config)?, config.sync.clone())?;

    match action {
        QueueAction::Enqueue {
            diagram,
            kind,
            document,
            base_version,
        } => {
            let payload = edit_payload(kind, document.as_deref(), base_version)?;
            let id = queue.enqueue(&diagram, kind, payload)?;
            println!("{}", id);
        }
        QueueAction::List { diagram } => {
            let edits = queue.list_pending(diagram.as_deref())?;
            if edits.is_empty() {
                println!("No pending edits");
            }
            for edit in &edits {
                println!("{}", describe(edit));
            }
        }
        QueueAction::Flush => {
            let report = queue.flush().await?;
            print_json(&report, true)?;
        }
        QueueAction::Status => {
            let status = queue.status()?;
            print_json(&json!({ "health": status.health(), "counts": status }), true)?;
        }
        QueueAction::Watch => {
            let queue = Arc::new(queue);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let sync = tokio::spawn(run_sync_loop(Arc::clone(&queue), shutdown_rx));

            tokio::signal::ctrl_c().await?;
            tracing::info!("Stopping sync loop");
            shutdown_tx.send(true)?;
            sync.await?;
        }
        QueueAction::Requeue { id } => {
            let edit = queue.requeue(&id)?;
            println!("{}", describe(&edit));
        }
        QueueAction::Clear { yes } => {
            if !yes {
                anyhow::bail!("Refusing to discard pending edits without --yes");
            }
            let count = queue.clear()?;
            println!("Discarded {} pending edits", count);
        }
    }

    Ok(())
}

pub fn clear(root: &Path, config: &Config, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete the data directory without --yes");
    }
    let dir = config.data_dir(root);
    tracing::info!("Clearing data directory: {}", dir.display());

    autograph_core::clear_data_dir(&dir)?;

    tracing::info!("Data directory cleared");
    Ok(())
}

fn open_store(root: &Path, config: &Config) -> anyhow::Result<Arc<dyn LocalStore>> {
    let dir = config.data_dir(root);
    autograph_core::ensure_data_dir(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = autograph_core::store_path(&dir);
    let store = FileStore::open(&path)
        .with_context(|| format!("Failed to open offline store {}", path.display()))?;
    Ok(Arc::new(store))
}

fn open_remote(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    Ok(Arc::from(create_document_store(&config.remote)?))
}

fn read_document(path: &Path) -> anyhow::Result<CanvasDocument> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    CanvasDocument::from_json(&json).with_context(|| format!("Invalid canvas document {}", path.display()))
}

/// Request body for an edit: `{document, base_version}` for writes, nothing
/// for deletes.
fn edit_payload(kind: EditKind, document: Option<&Path>, base_version: Option<u64>) -> anyhow::Result<Value> {
    match (kind, document) {
        (EditKind::Delete, _) => Ok(Value::Null),
        (_, None) => anyhow::bail!("A {} edit needs --document", kind),
        (_, Some(path)) => {
            let document = read_document(path)?;
            Ok(json!({ "document": document, "base_version": base_version }))
        }
    }
}

fn describe(edit: &PendingEdit) -> String {
    let state = match &edit.state {
        EditState::Queued => "queued".to_string(),
        EditState::Held(reason) => format!("held ({})", serde_json::to_string(reason).unwrap_or_default()),
    };
    format!(
        "{}  {:<6}  {}  failures={}  {}",
        edit.id, edit.kind, edit.diagram_id, edit.retry_count, state
    )
}

fn print_json(value: &impl Serialize, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}
