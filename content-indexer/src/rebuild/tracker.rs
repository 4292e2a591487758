//! Per-index rebuild progress.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::IndexerError;

/// Where a rebuild currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildPhase {
    #[default]
    NotStarted,
    /// Shadow index exists; backfill tasks are queued or being written.
    Backfilling,
    /// Backfill finished; the alias is being moved.
    Swapping,
    Done,
    Failed,
}

impl RebuildPhase {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Backfilling | Self::Swapping)
    }
}

/// Snapshot of one index's latest rebuild.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebuildStatus {
    pub logical_index_name: String,
    pub phase: RebuildPhase,
    pub old_physical_index_name: Option<String>,
    pub new_physical_index_name: Option<String>,
    pub items_enqueued: usize,
    pub items_written: usize,
    pub items_failed: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RebuildStatus {
    pub fn not_started(logical_index_name: impl Into<String>) -> Self {
        Self {
            logical_index_name: logical_index_name.into(),
            ..Self::default()
        }
    }
}

/// Rebuild state for every logical index, keyed case-insensitively.
#[derive(Debug, Default)]
pub struct RebuildTracker {
    statuses: Mutex<HashMap<String, RebuildStatus>>,
}

impl RebuildTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn statuses(&self) -> MutexGuard<'_, HashMap<String, RebuildStatus>> {
        self.statuses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update<F: FnOnce(&mut RebuildStatus)>(&self, logical: &str, f: F) {
        if let Some(status) = self.statuses().get_mut(&logical.to_lowercase()) {
            f(status);
        }
    }

    /// Claim the index for a new rebuild.
    ///
    /// Fails if a rebuild of the same index is still backfilling or swapping.
    pub fn begin(&self, logical: &str) -> Result<(), IndexerError> {
        let mut statuses = self.statuses();
        let key = logical.to_lowercase();
        if statuses.get(&key).is_some_and(|s| s.phase.is_active()) {
            return Err(IndexerError::rebuild(format!(
                "A rebuild of '{}' is already in progress",
                logical
            )));
        }
        statuses.insert(
            key,
            RebuildStatus {
                logical_index_name: logical.to_string(),
                phase: RebuildPhase::Backfilling,
                started_at: Some(Utc::now()),
                ..RebuildStatus::default()
            },
        );
        Ok(())
    }

    /// Record the physical indices involved once they are known.
    pub fn set_targets(&self, logical: &str, old: Option<String>, new: String) {
        self.update(logical, |status| {
            status.old_physical_index_name = old;
            status.new_physical_index_name = Some(new);
        });
    }

    pub fn set_enqueued(&self, logical: &str, count: usize) {
        self.update(logical, |status| status.items_enqueued = count);
    }

    /// Count backfill writes to `physical`.
    ///
    /// Writes to a physical index other than the current rebuild target are
    /// leftovers of an earlier attempt and are ignored.
    pub fn record_backfill(&self, logical: &str, physical: &str, written: usize, failed: usize) {
        self.update(logical, |status| {
            if status.phase == RebuildPhase::Backfilling
                && status.new_physical_index_name.as_deref() == Some(physical)
            {
                status.items_written += written;
                status.items_failed += failed;
            }
        });
    }

    pub fn mark_swapping(&self, logical: &str) {
        self.update(logical, |status| status.phase = RebuildPhase::Swapping);
    }

    pub fn mark_done(&self, logical: &str) {
        self.update(logical, |status| {
            status.phase = RebuildPhase::Done;
            status.finished_at = Some(Utc::now());
        });
    }

    pub fn mark_failed(&self, logical: &str, error: impl Into<String>) {
        let error = error.into();
        self.update(logical, |status| {
            status.phase = RebuildPhase::Failed;
            status.finished_at = Some(Utc::now());
            status.error = Some(error);
        });
    }

    pub fn status(&self, logical: &str) -> Option<RebuildStatus> {
        self.statuses().get(&logical.to_lowercase()).cloned()
    }

    pub fn is_active(&self, logical: &str) -> bool {
        self.status(logical).is_some_and(|s| s.phase.is_active())
    }
}
