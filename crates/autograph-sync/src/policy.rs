//! Retry policy and sync status reporting

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::edit::{HoldReason, PendingEdit};

/// Retry configuration for replaying pending edits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Consecutive failures after which an edit is flagged for the user
    pub attention_after: u32,
    /// Failures after which an edit is held instead of retried. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Backoff after the first failure
    pub base_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
    /// Poll interval of the background loop when nothing is failing
    pub idle_poll_ms: u64,
}

impl SyncPolicy {
    /// Backoff before the next attempt of an edit that failed `retry_count` times.
    /// Doubles per failure, capped at `max_delay_ms`.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(retry_count - 1).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Whether the retry budget for an edit is used up
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        self.max_attempts.is_some_and(|max| retry_count >= max)
    }

    /// Whether the UI should ask the user about this edit
    pub fn needs_attention(&self, edit: &PendingEdit) -> bool {
        edit.is_held() || edit.retry_count >= self.attention_after
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            attention_after: 5,
            max_attempts: None,
            base_delay_ms: 2_000,
            max_delay_ms: 300_000,
            idle_poll_ms: 30_000,
        }
    }
}

/// Overall sync state shown by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncHealth {
    /// Nothing queued
    Idle,
    /// Edits waiting, none has failed yet
    Pending,
    /// Some edits failed and will be retried
    Retrying,
    /// At least one edit needs a user decision
    NeedsAttention,
}

/// Queue counts for the UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub pending: usize,
    pub retrying: usize,
    pub needs_attention: usize,
    pub conflicts: usize,
    pub sending: usize,
}

impl SyncStatus {
    pub fn from_edits<'a>(
        edits: impl IntoIterator<Item = &'a PendingEdit>,
        policy: &SyncPolicy,
        sending: usize,
    ) -> Self {
        let mut status = SyncStatus {
            sending,
            ..Default::default()
        };
        for edit in edits {
            status.pending += 1;
            if edit.retry_count > 0 && !edit.is_held() {
                status.retrying += 1;
            }
            if policy.needs_attention(edit) {
                status.needs_attention += 1;
            }
            if matches!(edit.hold_reason(), Some(HoldReason::Conflict { .. })) {
                status.conflicts += 1;
            }
        }
        status
    }

    pub fn health(&self) -> SyncHealth {
        match self {
            s if s.needs_attention > 0 => SyncHealth::NeedsAttention,
            s if s.retrying > 0 => SyncHealth::Retrying,
            s if s.pending > 0 => SyncHealth::Pending,
            _ => SyncHealth::Idle,
        }
    }
}
