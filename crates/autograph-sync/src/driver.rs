//! Background task that keeps flushing the queue

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::queue::OfflineSyncQueue;

/// Flush the queue until `shutdown` flips to `true` or its sender is dropped.
///
/// Waits the backoff of the most-failed edit between flushes, or the idle
/// poll interval when nothing is failing. A flush in progress is dropped on
/// shutdown; its edits stay queued and are replayed by the next session.
pub async fn run_sync_loop(queue: Arc<OfflineSyncQueue>, mut shutdown: watch::Receiver<bool>) {
    info!("Sync loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            result = queue.flush() => {
                if let Err(e) = result {
                    error!("Flush failed: {}", e);
                }
            }
            _ = shutdown.changed() => break,
        }

        let delay = match queue.next_retry_delay() {
            Ok(Some(delay)) => delay,
            Ok(None) => queue.policy().idle_poll(),
            Err(e) => {
                error!("Failed to read the queue: {}", e);
                queue.policy().idle_poll()
            }
        };
        debug!("Next flush in {:?}", delay);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Sync loop stopped");
}
