//! Defines the `BranchDirectory` trait: read-only access to branches.

use crate::error::Result;
use crate::model::branch::{BranchCrashState, BranchId, BranchSummary};
use async_trait::async_trait;

/// Read-only access to the list of branches and their crash-relevant fields.
///
/// Pure data fetch. Implementations hold no lifecycle logic.
#[async_trait]
pub trait BranchDirectory: Send + Sync {
    /// Lists every branch with its current crash fields.
    ///
    /// # Returns
    ///
    /// * `Vec<BranchSummary>` - One row per branch, in backend order.
    async fn list_branches(&self) -> Result<Vec<BranchSummary>>;

    /// Loads the authoritative crash record of one branch.
    ///
    /// # Arguments
    ///
    /// * `id` - The branch to load.
    async fn get_branch(&self, id: &BranchId) -> Result<BranchCrashState>;
}
