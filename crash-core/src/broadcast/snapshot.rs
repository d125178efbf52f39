use chrono::{DateTime, Utc};
use crash::{BranchId, BranchSummary};

/// Branches currently crashing, as of the last successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalCrashSnapshot {
    crashing_branches: Vec<BranchSummary>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl GlobalCrashSnapshot {
    /// The state before the first refresh.
    pub fn empty() -> Self {
        Self {
            crashing_branches: Vec::new(),
            refreshed_at: None,
        }
    }

    pub fn new(crashing_branches: Vec<BranchSummary>, refreshed_at: DateTime<Utc>) -> Self {
        Self {
            crashing_branches,
            refreshed_at: Some(refreshed_at),
        }
    }

    pub fn crashing_branches(&self) -> &[BranchSummary] {
        &self.crashing_branches
    }

    pub fn is_any_branch_crashing(&self) -> bool {
        !self.crashing_branches.is_empty()
    }

    pub fn contains(&self, id: &BranchId) -> bool {
        self.crashing_branches.iter().any(|b| b.branch_id() == id)
    }

    /// `None` until the first successful refresh.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}
