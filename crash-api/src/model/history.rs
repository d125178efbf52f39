//! Read-only history row derived from the currently loaded branch record.
//!
//! There is no history store: only the most recent crash window per branch is
//! known, so the "history" is at most one entry.

use crate::model::branch::{BranchCrashState, CrashWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrashBadge {
    Active,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashHistoryEntry {
    started_at: DateTime<Utc>,
    duration_minutes: i64,
    intensity_percent: u32,
    badge: CrashBadge,
}

impl CrashHistoryEntry {
    /// Builds the entry for the branch's latest crash window.
    ///
    /// # Returns
    ///
    /// * `None` if the branch has never crashed (no start time).
    pub fn from_state(state: &BranchCrashState) -> Option<Self> {
        let started_at = state.start_time()?;
        let duration_minutes = match state.effective_end_time() {
            Some(end) => (end - started_at).num_minutes().max(0),
            None => i64::from(state.duration_minutes()),
        };
        let badge = if state.active() {
            CrashBadge::Active
        } else {
            CrashBadge::Ended
        };

        Some(Self {
            started_at,
            duration_minutes,
            intensity_percent: state.intensity_percent(),
            badge,
        })
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration_minutes
    }

    pub fn intensity_percent(&self) -> u32 {
        self.intensity_percent
    }

    pub fn badge(&self) -> CrashBadge {
        self.badge
    }
}
