//! Pending edits waiting to reach the document store

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FailureClass, RemoteError};
use crate::policy::SyncPolicy;

/// Mutation kind, mapped to POST / PUT / DELETE on replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditKind::Create => "create",
            EditKind::Update => "update",
            EditKind::Delete => "delete",
        };
        f.pad(name)
    }
}

impl FromStr for EditKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(EditKind::Create),
            "update" => Ok(EditKind::Update),
            "delete" => Ok(EditKind::Delete),
            other => Err(format!("unknown edit kind: {}", other)),
        }
    }
}

/// Why an edit is excluded from automatic replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HoldReason {
    Rejected { message: String },
    Conflict { message: String },
    RetriesExhausted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    /// Replayed by the next flush.
    #[default]
    Queued,
    /// Waits for the user to requeue or clear it.
    Held(HoldReason),
}

/// A locally queued mutation awaiting confirmation from the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub id: String,
    pub diagram_id: String,
    pub kind: EditKind,
    /// Request body, opaque to the queue.
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    /// Enqueue order; ties on `enqueued_at` are broken by this.
    pub seq: u64,
    /// Failed replay attempts so far. Never decreases.
    pub retry_count: u32,
    #[serde(default)]
    pub state: EditState,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl PendingEdit {
    pub fn new(diagram_id: impl Into<String>, kind: EditKind, payload: Value, seq: u64) -> Self {
        let diagram_id = diagram_id.into();
        let enqueued_at = Utc::now();
        PendingEdit {
            id: generate_edit_id(&diagram_id, enqueued_at),
            diagram_id,
            kind,
            payload,
            enqueued_at,
            seq,
            retry_count: 0,
            state: EditState::Queued,
            last_error: None,
            last_attempt_at: None,
        }
    }

    pub fn is_queued(&self) -> bool {
        self.state == EditState::Queued
    }

    pub fn is_held(&self) -> bool {
        matches!(self.state, EditState::Held(_))
    }

    pub fn hold_reason(&self) -> Option<&HoldReason> {
        match &self.state {
            EditState::Held(reason) => Some(reason),
            EditState::Queued => None,
        }
    }

    /// Record a failed replay: bump the retry count and decide whether the
    /// edit stays queued or is held for the user.
    pub fn record_failure(&mut self, error: &RemoteError, policy: &SyncPolicy) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(error.to_string());
        self.last_attempt_at = Some(Utc::now());

        self.state = match error.class() {
            FailureClass::Permanent => EditState::Held(HoldReason::Rejected {
                message: error.to_string(),
            }),
            FailureClass::Conflict => EditState::Held(HoldReason::Conflict {
                message: error.to_string(),
            }),
            FailureClass::Transient if policy.is_exhausted(self.retry_count) => {
                EditState::Held(HoldReason::RetriesExhausted)
            }
            FailureClass::Transient => EditState::Queued,
        };
    }

    /// Record a replay skipped because an earlier edit of the same diagram
    /// did not go through. Counts as a failure but never holds the edit.
    pub fn record_blocked(&mut self, blocker: &str) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(format!("blocked by {}", blocker));
        self.last_attempt_at = Some(Utc::now());
    }

    /// Put a held edit back in line. The retry count is kept.
    pub fn requeue(&mut self) {
        self.state = EditState::Queued;
    }
}

/// `<diagram id>-<unix millis>-<8 hex chars>`
pub fn generate_edit_id(diagram_id: &str, at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", diagram_id, at.timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_id_format() {
        let edit = PendingEdit::new("flow-chart", EditKind::Create, Value::Null, 0);

        assert!(edit.id.starts_with("flow-chart-"));
        let mut parts = edit.id.rsplitn(3, '-');
        let suffix = parts.next().unwrap();
        let millis = parts.next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(millis.parse::<i64>().unwrap(), edit.enqueued_at.timestamp_millis());
    }

    #[test]
    fn test_edit_ids_are_unique() {
        let at = Utc::now();
        let a = generate_edit_id("d", at);
        let b = generate_edit_id("d", at);
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_failure_by_class() {
        let policy = SyncPolicy::default();

        let mut edit = PendingEdit::new("d", EditKind::Update, Value::Null, 0);
        edit.record_failure(&RemoteError::Transient("timeout".into()), &policy);
        assert_eq!(edit.retry_count, 1);
        assert!(edit.is_queued());
        assert!(edit.last_error.as_deref().unwrap().contains("timeout"));

        edit.record_failure(&RemoteError::from_status(409, "stale base version"), &policy);
        assert_eq!(edit.retry_count, 2);
        assert!(matches!(edit.hold_reason(), Some(HoldReason::Conflict { .. })));

        edit.requeue();
        assert!(edit.is_queued());
        assert_eq!(edit.retry_count, 2);

        edit.record_failure(&RemoteError::from_status(422, "bad shape"), &policy);
        assert!(matches!(edit.hold_reason(), Some(HoldReason::Rejected { .. })));
    }

    #[test]
    fn test_exhausted_retries_hold_the_edit() {
        let policy = SyncPolicy {
            max_attempts: Some(2),
            ..Default::default()
        };
        let mut edit = PendingEdit::new("d", EditKind::Delete, Value::Null, 0);

        edit.record_failure(&RemoteError::Transient("offline".into()), &policy);
        assert!(edit.is_queued());
        edit.record_failure(&RemoteError::Transient("offline".into()), &policy);
        assert_eq!(edit.hold_reason(), Some(&HoldReason::RetriesExhausted));
    }

    #[test]
    fn test_edit_kind_parsing() {
        assert_eq!("Create".parse::<EditKind>().unwrap(), EditKind::Create);
        assert_eq!("delete".parse::<EditKind>().unwrap(), EditKind::Delete);
        assert!("merge".parse::<EditKind>().is_err());
        assert_eq!(EditKind::Update.to_string(), "update");
    }

    #[test]
    fn test_state_defaults_when_missing_from_json() {
        let json = serde_json::json!({
            "id": "d-1-abcdef01",
            "diagram_id": "d",
            "kind": "update",
            "payload": {"document": {}},
            "enqueued_at": "2026-01-01T00:00:00Z",
            "seq": 4,
            "retry_count": 2
        });
        let edit: PendingEdit = serde_json::from_value(json).unwrap();
        assert!(edit.is_queued());
        assert_eq!(edit.retry_count, 2);
        assert!(edit.last_error.is_none());
    }
}
