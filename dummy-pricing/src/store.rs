use chrono::{DateTime, Utc};
use crash::{
    BranchCrashState, BranchId, BranchSummary, CrashDuration, CrashIntensity, CrashWindow,
    ValidationError,
};
use log::info;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Branch {0} not found")]
    NotFound(BranchId),

    #[error("A market crash is already active for branch {0}")]
    AlreadyActive(BranchId),

    #[error("No market crash is active for branch {0}")]
    NotActive(BranchId),

    #[error("{0}")]
    Invalid(#[from] ValidationError),
}

struct StoredBranch {
    state: BranchCrashState,
    /// Priced items whose price a crash end resets.
    items: u64,
}

/// The authoritative branch records.
///
/// A crash whose end time has passed is closed on the next access, so every
/// reader sees the window end on time whether or not anyone asked to end it.
#[derive(Default)]
pub struct BranchStore {
    branches: Mutex<BTreeMap<BranchId, StoredBranch>>,
}

impl BranchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(self, state: BranchCrashState, items: u64) -> Self {
        self.insert(state, items);
        self
    }

    pub fn insert(&self, state: BranchCrashState, items: u64) {
        self.lock()
            .insert(state.branch_id().clone(), StoredBranch { state, items });
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<BranchId, StoredBranch>> {
        self.branches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn expire(branch: &mut StoredBranch, now: DateTime<Utc>) {
        if !branch.state.active() {
            return;
        }
        if let Some(end) = branch.state.effective_end_time() {
            if end <= now {
                info!("Market crash on branch {} ran out", branch.state.branch_id());
                branch.state = branch.state.clone().ended_at(end);
            }
        }
    }

    pub fn list(&self, now: DateTime<Utc>) -> Vec<BranchSummary> {
        let mut branches = self.lock();
        branches
            .values_mut()
            .map(|branch| {
                Self::expire(branch, now);
                branch.state.summary()
            })
            .collect()
    }

    pub fn get(&self, id: &BranchId, now: DateTime<Utc>) -> Result<BranchCrashState, StoreError> {
        let mut branches = self.lock();
        let branch = branches
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Self::expire(branch, now);
        Ok(branch.state.clone())
    }

    /// Opens a crash window starting at `now`.
    pub fn trigger(
        &self,
        id: &BranchId,
        intensity_percent: u32,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<BranchCrashState, StoreError> {
        let intensity = CrashIntensity::try_from(intensity_percent)?;
        let duration = CrashDuration::try_from(duration_minutes)?;

        let mut branches = self.lock();
        let branch = branches
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Self::expire(branch, now);
        if branch.state.active() {
            return Err(StoreError::AlreadyActive(id.clone()));
        }

        branch.state = branch
            .state
            .clone()
            .started_at(now, duration.minutes())
            .with_end_time(Some(now + duration.as_chrono()))
            .with_intensity(intensity.percent());
        info!(
            "Market crash triggered on branch {}: {} for {}",
            id, intensity, duration
        );
        Ok(branch.state.clone())
    }

    /// Closes the running crash window at `now`.
    ///
    /// # Returns
    ///
    /// * The number of item prices reset.
    pub fn end(&self, id: &BranchId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut branches = self.lock();
        let branch = branches
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Self::expire(branch, now);
        if !branch.state.active() {
            return Err(StoreError::NotActive(id.clone()));
        }

        branch.state = branch.state.clone().ended_at(now);
        info!(
            "Market crash ended on branch {}, {} prices reset",
            id, branch.items
        );
        Ok(branch.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 12, 19, 0, 0).unwrap()
    }

    fn store() -> BranchStore {
        BranchStore::new().with_branch(BranchCrashState::new(BranchId::new("b1"), "Harbour"), 9)
    }

    #[test]
    fn test_trigger_then_end() {
        let store = store();
        let id = BranchId::new("b1");

        let state = store.trigger(&id, 75, 10, t0()).unwrap();
        assert!(state.active());
        assert_eq!(state.end_time(), Some(t0() + Duration::minutes(10)));
        assert_eq!(
            store.trigger(&id, 75, 10, t0()),
            Err(StoreError::AlreadyActive(id.clone()))
        );

        assert_eq!(store.end(&id, t0() + Duration::minutes(2)).unwrap(), 9);
        assert_eq!(store.end(&id, t0()), Err(StoreError::NotActive(id.clone())));
    }

    #[test]
    fn test_window_closes_at_end_time() {
        let store = store();
        let id = BranchId::new("b1");
        store.trigger(&id, 50, 5, t0()).unwrap();

        assert!(store.get(&id, t0() + Duration::seconds(299)).unwrap().active());
        let state = store.get(&id, t0() + Duration::minutes(5)).unwrap();
        assert!(!state.active());
        assert_eq!(state.end_time(), Some(t0() + Duration::minutes(5)));
        assert!(store.list(t0() + Duration::minutes(6)).iter().all(|b| !b.active()));
    }

    #[test]
    fn test_rejects_unknown_branch_and_bad_options() {
        let store = store();
        let missing = BranchId::new("nope");
        assert_eq!(
            store.get(&missing, t0()),
            Err(StoreError::NotFound(missing.clone()))
        );
        assert_eq!(
            store.trigger(&BranchId::new("b1"), 40, 5, t0()),
            Err(StoreError::Invalid(ValidationError::IntensityNotAllowed(40)))
        );
        assert_eq!(
            store.trigger(&BranchId::new("b1"), 50, 45, t0()),
            Err(StoreError::Invalid(ValidationError::DurationNotAllowed(45)))
        );
    }
}
