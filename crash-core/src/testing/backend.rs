use crate::timer::Clock;
use async_trait::async_trait;
use crash::{
    BranchCrashState, BranchDirectory, BranchId, BranchSummary, CrashAck, CrashDuration,
    CrashError, CrashIntensity, PricingService,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

const DEFAULT_ITEM_COUNT: u64 = 12;

/// Every call the backend received, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub list: usize,
    pub get: Vec<BranchId>,
    pub trigger: Vec<(BranchId, u32, u32)>,
    pub end: Vec<BranchId>,
}

impl CallLog {
    pub fn gets_of(&self, id: &BranchId) -> usize {
        self.get.iter().filter(|g| *g == id).count()
    }
}

#[derive(Default)]
struct Failures {
    list: Option<CrashError>,
    get: Option<CrashError>,
    trigger: Option<CrashError>,
    end: Option<CrashError>,
}

/// Holds calls back until released.
#[derive(Clone)]
pub struct Hold(Arc<Semaphore>);

impl Hold {
    fn new() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    /// Lets every waiting and future call through.
    pub fn release(&self) {
        self.0.add_permits(1 << 20);
    }

    async fn wait(&self) {
        let _ = self.0.acquire().await;
    }
}

/// Branch directory and pricing service backed by a map.
///
/// Behaves like the real backend for the lifecycle rules (rejects a trigger
/// while active and an end while inactive, with HTTP 409) and records every
/// call. Failures can be injected per operation and calls can be held back
/// to stage races.
pub struct InMemoryBackend {
    clock: Arc<dyn Clock>,
    branches: Mutex<BTreeMap<BranchId, BranchCrashState>>,
    items: Mutex<HashMap<BranchId, u64>>,
    calls: Mutex<CallLog>,
    failures: Mutex<Failures>,
    branch_holds: Mutex<HashMap<BranchId, Hold>>,
    list_hold: Mutex<Option<Hold>>,
    listing_now: AtomicUsize,
    listing_peak: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            branches: Mutex::new(BTreeMap::new()),
            items: Mutex::new(HashMap::new()),
            calls: Mutex::new(CallLog::default()),
            failures: Mutex::new(Failures::default()),
            branch_holds: Mutex::new(HashMap::new()),
            list_hold: Mutex::new(None),
            listing_now: AtomicUsize::new(0),
            listing_peak: AtomicUsize::new(0),
        }
    }

    pub fn with_branch(self, state: BranchCrashState) -> Self {
        self.put(state);
        self
    }

    /// Replaces the stored record, as another operator or the server itself would.
    pub fn put(&self, state: BranchCrashState) {
        self.branches
            .lock()
            .unwrap()
            .insert(state.branch_id().clone(), state);
    }

    pub fn branch(&self, id: &BranchId) -> Option<BranchCrashState> {
        self.branches.lock().unwrap().get(id).cloned()
    }

    /// Number of item prices an end call reports as reset for `id`.
    pub fn set_items(&self, id: &BranchId, count: u64) {
        self.items.lock().unwrap().insert(id.clone(), count);
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of listings that were in flight at the same time.
    pub fn listing_peak(&self) -> usize {
        self.listing_peak.load(Ordering::SeqCst)
    }

    pub fn fail_next_list(&self, error: CrashError) {
        self.failures.lock().unwrap().list = Some(error);
    }

    pub fn fail_next_get(&self, error: CrashError) {
        self.failures.lock().unwrap().get = Some(error);
    }

    pub fn fail_next_trigger(&self, error: CrashError) {
        self.failures.lock().unwrap().trigger = Some(error);
    }

    pub fn fail_next_end(&self, error: CrashError) {
        self.failures.lock().unwrap().end = Some(error);
    }

    /// Holds `get_branch(id)` calls until the returned hold is released.
    pub fn hold_branch(&self, id: &BranchId) -> Hold {
        let hold = Hold::new();
        self.branch_holds
            .lock()
            .unwrap()
            .insert(id.clone(), hold.clone());
        hold
    }

    /// Holds `list_branches` calls until the returned hold is released.
    pub fn hold_listing(&self) -> Hold {
        let hold = Hold::new();
        *self.list_hold.lock().unwrap() = Some(hold.clone());
        hold
    }

    fn not_found(id: &BranchId) -> CrashError {
        CrashError::remote(Some(404), format!("Branch {} not found", id))
    }
}

#[async_trait]
impl BranchDirectory for InMemoryBackend {
    async fn list_branches(&self) -> crash::Result<Vec<BranchSummary>> {
        self.calls.lock().unwrap().list += 1;
        let now = self.listing_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.listing_peak.fetch_max(now, Ordering::SeqCst);

        let hold = self.list_hold.lock().unwrap().clone();
        if let Some(hold) = hold {
            hold.wait().await;
        }

        let result = match self.failures.lock().unwrap().list.take() {
            Some(error) => Err(error),
            None => Ok(self
                .branches
                .lock()
                .unwrap()
                .values()
                .map(BranchCrashState::summary)
                .collect()),
        };
        self.listing_now.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_branch(&self, id: &BranchId) -> crash::Result<BranchCrashState> {
        self.calls.lock().unwrap().get.push(id.clone());

        let hold = self.branch_holds.lock().unwrap().get(id).cloned();
        if let Some(hold) = hold {
            hold.wait().await;
        }

        if let Some(error) = self.failures.lock().unwrap().get.take() {
            return Err(error);
        }
        self.branch(id).ok_or_else(|| Self::not_found(id))
    }
}

#[async_trait]
impl PricingService for InMemoryBackend {
    async fn trigger_crash(
        &self,
        id: &BranchId,
        intensity: CrashIntensity,
        duration: CrashDuration,
    ) -> crash::Result<CrashAck> {
        self.calls.lock().unwrap().trigger.push((
            id.clone(),
            intensity.percent(),
            duration.minutes(),
        ));
        if let Some(error) = self.failures.lock().unwrap().trigger.take() {
            return Err(error);
        }

        let mut branches = self.branches.lock().unwrap();
        let state = branches.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if state.active() {
            return Err(CrashError::remote(
                Some(409),
                "A market crash is already active for this branch",
            ));
        }

        let now = self.clock.now();
        *state = state
            .clone()
            .started_at(now, duration.minutes())
            .with_end_time(Some(now + duration.as_chrono()))
            .with_intensity(intensity.percent());
        Ok(CrashAck::default().with_message("Market crash triggered"))
    }

    async fn end_crash(&self, id: &BranchId) -> crash::Result<CrashAck> {
        self.calls.lock().unwrap().end.push(id.clone());
        if let Some(error) = self.failures.lock().unwrap().end.take() {
            return Err(error);
        }

        let mut branches = self.branches.lock().unwrap();
        let state = branches.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if !state.active() {
            return Err(CrashError::remote(
                Some(409),
                "No market crash is active for this branch",
            ));
        }

        *state = state.clone().ended_at(self.clock.now());
        let reset = self
            .items
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(DEFAULT_ITEM_COUNT);
        Ok(CrashAck::default()
            .with_message("Market crash ended")
            .with_reset_count(reset))
    }
}
