//! Durable queue of offline edits and its replay against the document store

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::edit::{generate_edit_id, EditKind, PendingEdit};
use crate::error::{StoreResult, SyncError, SyncResult};
use crate::policy::{SyncPolicy, SyncStatus};
use crate::remote::DocumentStore;
use crate::store::LocalStore;

/// Outcome of one flush, by edit id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Confirmed by the document store and removed from the queue.
    pub applied: BTreeSet<String>,
    /// Failed during this flush; still in the queue.
    pub still_failing: BTreeSet<String>,
    /// Not attempted because they wait for a user decision.
    pub held: BTreeSet<String>,
    /// Not attempted because another flush owns their diagram.
    pub skipped: BTreeSet<String>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
            && self.still_failing.is_empty()
            && self.held.is_empty()
            && self.skipped.is_empty()
    }

    fn merge(&mut self, other: FlushReport) {
        self.applied.extend(other.applied);
        self.still_failing.extend(other.still_failing);
        self.held.extend(other.held);
        self.skipped.extend(other.skipped);
    }
}

#[derive(Debug, Default)]
struct InFlight {
    /// Diagrams owned by a running flush
    claimed: HashSet<String>,
    /// Edit currently on the wire, per diagram
    sending: HashMap<String, String>,
}

fn lock(in_flight: &Mutex<InFlight>) -> MutexGuard<'_, InFlight> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Earliest edit of a diagram that did not go through in this flush.
enum Blocker {
    /// Failed while being sent; successors count a failure too
    Failed(String),
    /// Already waiting for the user; successors wait with it
    Held(String),
}

/// Releases a flush's diagrams when it completes or its future is dropped.
struct ClaimGuard<'a> {
    in_flight: &'a Mutex<InFlight>,
    diagrams: Vec<String>,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = lock(self.in_flight);
        for diagram_id in &self.diagrams {
            in_flight.claimed.remove(diagram_id);
            in_flight.sending.remove(diagram_id);
        }
    }
}

/// Client-side queue of pending edits.
///
/// Edits of one diagram are replayed one at a time in enqueue order;
/// different diagrams are replayed concurrently. In-flight state lives only
/// in memory, so an edit interrupted by shutdown is replayed on next start.
pub struct OfflineSyncQueue {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn DocumentStore>,
    policy: SyncPolicy,
    next_seq: AtomicU64,
    in_flight: Mutex<InFlight>,
}

impl OfflineSyncQueue {
    /// Open the queue over a store, continuing the enqueue sequence of any
    /// edits persisted by an earlier session.
    pub fn open(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn DocumentStore>,
        policy: SyncPolicy,
    ) -> SyncResult<Self> {
        let edits = store.all_edits()?;
        let next_seq = edits.iter().map(|e| e.seq + 1).max().unwrap_or(0);
        info!(
            "Offline queue opened with {} pending edits (document store: {})",
            edits.len(),
            remote.name()
        );

        Ok(Self {
            store,
            remote,
            policy,
            next_seq: AtomicU64::new(next_seq),
            in_flight: Mutex::new(InFlight::default()),
        })
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Durably queue a mutation. Returns the new edit's id.
    pub fn enqueue(&self, diagram_id: &str, kind: EditKind, payload: Value) -> SyncResult<String> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut edit = PendingEdit::new(diagram_id, kind, payload, seq);
        while self.store.get_edit(&edit.id)?.is_some() {
            edit.id = generate_edit_id(diagram_id, edit.enqueued_at);
        }

        self.store.put_edit(&edit)?;
        debug!("Queued {} edit {} (seq {})", kind, edit.id, seq);
        Ok(edit.id)
    }

    /// Pending edits in enqueue order, optionally for one diagram.
    pub fn list_pending(&self, diagram_id: Option<&str>) -> SyncResult<Vec<PendingEdit>> {
        let edits = match diagram_id {
            Some(id) => self.store.edits_for_diagram(id)?,
            None => self.store.all_edits()?,
        };
        Ok(edits)
    }

    /// Whether an edit is on the wire right now.
    pub fn is_sending(&self, edit_id: &str) -> bool {
        lock(&self.in_flight).sending.values().any(|id| id == edit_id)
    }

    /// Replay every queued edit. A failing edit holds back the rest of its
    /// diagram but never the other diagrams; only a failure to read the local
    /// store is returned as an error.
    pub async fn flush(&self) -> SyncResult<FlushReport> {
        let mut by_diagram: BTreeMap<String, Vec<PendingEdit>> = BTreeMap::new();
        for edit in self.store.all_edits()? {
            by_diagram.entry(edit.diagram_id.clone()).or_default().push(edit);
        }

        let mut report = FlushReport::default();
        let mut batches = Vec::new();
        {
            let mut in_flight = lock(&self.in_flight);
            for (diagram_id, edits) in by_diagram {
                if in_flight.claimed.contains(&diagram_id) {
                    debug!("Diagram {} is being flushed elsewhere, skipping", diagram_id);
                    report.skipped.extend(edits.into_iter().map(|e| e.id));
                    continue;
                }
                in_flight.claimed.insert(diagram_id.clone());
                batches.push((diagram_id, edits));
            }
        }
        let _claims = ClaimGuard {
            in_flight: &self.in_flight,
            diagrams: batches.iter().map(|(id, _)| id.clone()).collect(),
        };

        let outcomes = join_all(
            batches
                .into_iter()
                .map(|(diagram_id, edits)| self.replay_diagram(diagram_id, edits)),
        )
        .await;
        for outcome in outcomes {
            report.merge(outcome);
        }

        if !report.is_empty() {
            info!(
                "Flush finished: {} applied, {} failing, {} held, {} skipped",
                report.applied.len(),
                report.still_failing.len(),
                report.held.len(),
                report.skipped.len()
            );
        }
        Ok(report)
    }

    /// Send one diagram's edits in order, waiting for each outcome.
    ///
    /// Once an edit does not go through, its successors stay unsent for the
    /// rest of this flush so they never land ahead of it.
    async fn replay_diagram(&self, diagram_id: String, edits: Vec<PendingEdit>) -> FlushReport {
        let mut report = FlushReport::default();
        let mut blocked: Option<Blocker> = None;

        for snapshot in edits {
            // Re-read: the edit may have been cleared or requeued meanwhile
            let mut edit = match self.store.get_edit(&snapshot.id) {
                Ok(Some(edit)) => edit,
                Ok(None) => continue,
                Err(e) => {
                    error!("Failed to read pending edit {}: {}", snapshot.id, e);
                    blocked.get_or_insert(Blocker::Failed(snapshot.id.clone()));
                    report.still_failing.insert(snapshot.id);
                    continue;
                }
            };
            if edit.is_held() {
                blocked.get_or_insert(Blocker::Held(edit.id.clone()));
                report.held.insert(edit.id);
                continue;
            }

            match &blocked {
                Some(Blocker::Held(blocker)) => {
                    debug!("Edit {} waits behind held edit {}", edit.id, blocker);
                    report.held.insert(edit.id);
                    continue;
                }
                Some(Blocker::Failed(blocker)) => {
                    edit.record_blocked(blocker);
                    if let Err(e) = self.persist_failure(&edit) {
                        error!("Failed to record failure of {}: {}", edit.id, e);
                    }
                    report.still_failing.insert(edit.id);
                    continue;
                }
                None => {}
            }

            debug!(
                "Replaying {} edit {} for {} (previous failures: {})",
                edit.kind, edit.id, diagram_id, edit.retry_count
            );
            self.set_sending(&diagram_id, Some(&edit.id));
            let outcome = self.remote.apply(&edit).await;
            self.set_sending(&diagram_id, None);

            match outcome {
                Ok(()) => match self.store.delete_edit(&edit.id) {
                    Ok(()) => {
                        report.applied.insert(edit.id);
                    }
                    Err(e) => {
                        error!("Edit {} applied but not removed locally: {}", edit.id, e);
                        blocked = Some(Blocker::Failed(edit.id.clone()));
                        report.still_failing.insert(edit.id);
                    }
                },
                Err(err) => {
                    edit.record_failure(&err, &self.policy);
                    warn!(
                        "Replay of {} failed ({} failures so far): {}",
                        edit.id, edit.retry_count, err
                    );
                    if let Err(e) = self.persist_failure(&edit) {
                        error!("Failed to record failure of {}: {}", edit.id, e);
                    }
                    blocked = Some(Blocker::Failed(edit.id.clone()));
                    report.still_failing.insert(edit.id);
                }
            }
        }

        report
    }

    fn set_sending(&self, diagram_id: &str, edit_id: Option<&str>) {
        let mut in_flight = lock(&self.in_flight);
        match edit_id {
            Some(id) => {
                in_flight.sending.insert(diagram_id.to_string(), id.to_string());
            }
            None => {
                in_flight.sending.remove(diagram_id);
            }
        }
    }

    /// Write back a failed edit unless it was cleared while on the wire.
    fn persist_failure(&self, edit: &PendingEdit) -> StoreResult<()> {
        if self.store.get_edit(&edit.id)?.is_some() {
            self.store.put_edit(edit)?;
        }
        Ok(())
    }

    /// Put a held edit back in line for the next flush.
    pub fn requeue(&self, edit_id: &str) -> SyncResult<PendingEdit> {
        let mut edit = self
            .store
            .get_edit(edit_id)?
            .ok_or_else(|| SyncError::UnknownEdit(edit_id.to_string()))?;
        edit.requeue();
        self.store.put_edit(&edit)?;
        info!("Requeued edit {} after {} failures", edit.id, edit.retry_count);
        Ok(edit)
    }

    /// Drop every pending edit, whatever its state. Returns how many were dropped.
    pub fn clear(&self) -> SyncResult<usize> {
        let count = self.store.all_edits()?.len();
        self.store.clear_edits()?;
        warn!("Discarded {} pending edits", count);
        Ok(count)
    }

    /// Counts for the sync indicator.
    pub fn status(&self) -> SyncResult<SyncStatus> {
        let edits = self.store.all_edits()?;
        let sending = lock(&self.in_flight).sending.len();
        Ok(SyncStatus::from_edits(&edits, &self.policy, sending))
    }

    /// Backoff before the next flush, driven by the most-failed queued edit.
    /// `None` when no queued edit has failed.
    pub fn next_retry_delay(&self) -> SyncResult<Option<Duration>> {
        let worst = self
            .store
            .all_edits()?
            .iter()
            .filter(|e| e.is_queued() && e.retry_count > 0)
            .map(|e| e.retry_count)
            .max();
        Ok(worst.map(|failures| self.policy.backoff_delay(failures)))
    }
}
