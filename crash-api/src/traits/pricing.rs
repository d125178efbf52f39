//! Defines the `PricingService` trait: the mutating crash endpoints.

use crate::error::Result;
use crate::model::ack::CrashAck;
use crate::model::branch::BranchId;
use crate::model::options::{CrashDuration, CrashIntensity};
use async_trait::async_trait;

/// The remote service that opens and closes crash windows.
///
/// The backend is the final arbiter: it rejects a trigger on a branch that is
/// already crashing and an end on a branch that is not.
#[async_trait]
pub trait PricingService: Send + Sync {
    /// Opens a crash window on `id`.
    ///
    /// # Arguments
    ///
    /// * `id` - The branch to crash.
    /// * `intensity` - How far prices move toward the floor price.
    /// * `duration` - Length of the window.
    async fn trigger_crash(
        &self,
        id: &BranchId,
        intensity: CrashIntensity,
        duration: CrashDuration,
    ) -> Result<CrashAck>;

    /// Closes the open crash window on `id`.
    ///
    /// # Returns
    ///
    /// * `CrashAck` - May carry the number of item prices reset to floor.
    async fn end_crash(&self, id: &BranchId) -> Result<CrashAck>;
}
