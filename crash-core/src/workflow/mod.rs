//! # Per-Branch Crash Workflow
//!
//! Orchestrates one operator managing one selected branch: selection, the
//! live countdown, confirmation-gated trigger/end calls, and re-synchronising
//! both the branch view and the global broadcast after every mutation.
//!
//! ## Ordering
//! - The countdown only starts once `select_branch` has loaded the branch.
//! - Every selection bumps a generation counter. A response that arrives for
//!   an older generation (the operator moved on, or the view closed) is
//!   dropped, never applied.
//! - A confirmed mutation re-fetches the branch and refreshes the broadcast
//!   before the gate closes.
//!
//! ## Failures
//! Validation, remote and network failures all end in exactly one
//! notification. Nothing is retried and no state is ever set optimistically:
//! the branch record only changes when the backend says so.

mod messages;

use crate::broadcast::CrashBroadcast;
use crate::config::ConsoleConfig;
use crate::gate::{BackgroundLock, ConfirmationGate, DismissReason, IntentExecutor};
use crate::timer::{compute_remaining, Clock, Scheduler, TickHandle};
use chrono::{DateTime, Utc};
use crash::{
    BranchCrashState, BranchDirectory, BranchId, ConfirmationIntent, CrashDuration, CrashError,
    CrashHistoryEntry, CrashIntensity, CrashTimerState, Notification, NotificationSink,
    PricingService, ValidationError,
};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Timing knobs of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Countdown tick period.
    pub tick_interval: Duration,
    /// Minimum wait between two expiry re-fetches while the backend still
    /// reports a crash the local clock considers over.
    pub expiry_recheck: chrono::Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            expiry_recheck: chrono::Duration::seconds(5),
        }
    }
}

impl From<&ConsoleConfig> for WorkflowSettings {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            expiry_recheck: config.expiry_recheck(),
        }
    }
}

/// Everything the workflow talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn BranchDirectory>,
    pub pricing: Arc<dyn PricingService>,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn Scheduler>,
    pub background: Arc<dyn BackgroundLock>,
}

/// What a front end renders for the selected branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchView {
    state: BranchCrashState,
    timer: CrashTimerState,
}

impl BranchView {
    pub fn state(&self) -> &BranchCrashState {
        &self.state
    }

    pub fn timer(&self) -> CrashTimerState {
        self.timer
    }

    pub fn history(&self) -> Option<CrashHistoryEntry> {
        CrashHistoryEntry::from_state(&self.state)
    }
}

#[derive(Default)]
struct Selection {
    generation: u64,
    branch_id: Option<BranchId>,
    branch: Option<BranchCrashState>,
    timer: Option<TickHandle>,
    last_expiry_refetch: Option<DateTime<Utc>>,
    refetch_in_flight: bool,
}

impl Selection {
    /// Forgets the current branch. Dropping the tick handle stops the countdown.
    fn reset(&mut self, branch_id: Option<BranchId>) -> u64 {
        self.generation += 1;
        self.branch_id = branch_id;
        self.branch = None;
        self.timer = None;
        self.last_expiry_refetch = None;
        self.refetch_in_flight = false;
        self.generation
    }
}

struct Inner {
    parts: Collaborators,
    broadcast: CrashBroadcast,
    gate: ConfirmationGate,
    settings: WorkflowSettings,
    selection: Mutex<Selection>,
    view: watch::Sender<Option<BranchView>>,
}

/// Handle to a per-branch workflow. Clones share the same selection.
///
/// The countdown and any pending confirmation are released when the last
/// handle is dropped.
#[derive(Clone)]
pub struct BranchWorkflow {
    inner: Arc<Inner>,
}

impl BranchWorkflow {
    /// Creates a workflow with nothing selected.
    ///
    /// # Arguments
    ///
    /// * `parts` - Backend, notification, time and scheduling collaborators.
    /// * `broadcast` - The process-wide broadcast to refresh after mutations.
    /// * `settings` - Tick period and expiry re-check throttle.
    pub fn new(parts: Collaborators, broadcast: CrashBroadcast, settings: WorkflowSettings) -> Self {
        let gate = ConfirmationGate::new(parts.background.clone());
        let (view, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                parts,
                broadcast,
                gate,
                settings,
                selection: Mutex::new(Selection::default()),
                view,
            }),
        }
    }

    fn selection(&self) -> MutexGuard<'_, Selection> {
        self.inner
            .selection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, notification: Notification) {
        self.inner.parts.notifier.notify(notification);
    }

    fn publish(&self, next: Option<BranchView>) {
        self.inner.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    // --- Queries ---

    pub fn gate(&self) -> &ConfirmationGate {
        &self.inner.gate
    }

    pub fn broadcast(&self) -> &CrashBroadcast {
        &self.inner.broadcast
    }

    /// The branch currently selected, loaded or not.
    pub fn selected(&self) -> Option<BranchId> {
        self.selection().branch_id.clone()
    }

    pub fn view(&self) -> Option<BranchView> {
        self.inner.view.borrow().clone()
    }

    /// Receives the branch view every time it changes.
    pub fn subscribe_view(&self) -> watch::Receiver<Option<BranchView>> {
        self.inner.view.subscribe()
    }

    /// Whether a countdown tick source is currently held.
    pub fn is_ticking(&self) -> bool {
        self.selection().timer.is_some()
    }

    // --- Selection ---

    /// Loads a branch and makes it the selected one.
    ///
    /// Any previous selection is dropped at once: its countdown stops, its
    /// pending confirmation is dismissed and its in-flight responses will be
    /// ignored. The countdown for the new branch starts only after its record
    /// has been loaded.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(state))` - The branch is loaded and selected.
    /// * `Ok(None)` - Another selection (or `deselect`) overtook this one
    ///   while the fetch was in flight; the response was discarded.
    /// * `Err(e)` - The fetch failed. Nothing is selected and the operator
    ///   has been notified.
    pub async fn select_branch(&self, id: BranchId) -> Result<Option<BranchCrashState>, CrashError> {
        let generation = {
            let mut selection = self.selection();
            let generation = selection.reset(Some(id.clone()));
            self.publish(None);
            generation
        };
        self.inner.gate.dismiss(DismissReason::Cancel);
        info!("Selecting branch {}", id);

        match self.inner.parts.directory.get_branch(&id).await {
            Ok(state) => {
                if self.apply(generation, state.clone()) {
                    Ok(Some(state))
                } else {
                    debug!("Selection of branch {} was overtaken, response dropped", id);
                    Ok(None)
                }
            }
            Err(e) => {
                {
                    let mut selection = self.selection();
                    if selection.generation != generation {
                        debug!("Dropping failed load of superseded branch {}", id);
                        return Ok(None);
                    }
                    selection.branch_id = None;
                }
                error!("Failed to load branch {}: {}", id, e);
                self.notify(Notification::error("Failed to load branch", e.to_string()));
                Err(e)
            }
        }
    }

    /// Clears the selection: stops the countdown, dismisses any pending
    /// confirmation and invalidates in-flight fetches.
    pub fn deselect(&self) {
        {
            let mut selection = self.selection();
            if let Some(id) = &selection.branch_id {
                info!("Deselecting branch {}", id);
            }
            selection.reset(None);
            self.publish(None);
        }
        self.inner.gate.dismiss(DismissReason::Cancel);
    }

    /// Tears the view down. Same as `deselect`; kept as the explicit
    /// unmount point for front ends.
    pub fn close(&self) {
        self.deselect();
    }

    /// Applies an authoritative record if it belongs to the current selection.
    ///
    /// # Returns
    ///
    /// * `false` if the record is stale and was dropped.
    fn apply(&self, generation: u64, state: BranchCrashState) -> bool {
        let mut selection = self.selection();
        if selection.generation != generation {
            return false;
        }

        let timer = compute_remaining(&state, self.inner.parts.clock.now());
        if state.active() {
            if selection.timer.is_none() {
                debug!("Starting countdown for branch {}", state.branch_id());
                selection.timer = Some(self.start_timer(generation));
            }
        } else if selection.timer.take().is_some() {
            debug!("Stopped countdown for branch {}", state.branch_id());
        }
        if !timer.expired() {
            selection.last_expiry_refetch = None;
        }
        selection.refetch_in_flight = false;
        selection.branch = Some(state.clone());
        self.publish(Some(BranchView { state, timer }));
        true
    }

    /// Re-loads `id` if it is still the selected branch.
    async fn reload(&self, id: &BranchId) {
        let generation = {
            let selection = self.selection();
            if selection.branch_id.as_ref() != Some(id) {
                debug!("Branch {} no longer selected, skipping re-fetch", id);
                return;
            }
            selection.generation
        };

        match self.inner.parts.directory.get_branch(id).await {
            Ok(state) => {
                self.apply(generation, state);
            }
            Err(e) => {
                warn!("Failed to re-fetch branch {}: {}", id, e);
                self.notify(Notification::error("Failed to refresh branch", e.to_string()));
            }
        }
    }

    async fn refresh_broadcast(&self) {
        if let Err(e) = self.inner.broadcast.refresh().await {
            warn!("Global crash refresh failed: {}", e);
            self.notify(Notification::error("Failed to refresh crash status", e.to_string()));
        }
    }

    // --- Countdown ---

    fn start_timer(&self, generation: u64) -> TickHandle {
        // Weak: the handle is owned by the selection inside `inner`.
        let weak = Arc::downgrade(&self.inner);
        self.inner.parts.scheduler.schedule_repeating(
            self.inner.settings.tick_interval,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    BranchWorkflow { inner }.on_tick(generation);
                }
            }),
        )
    }

    fn on_tick(&self, generation: u64) {
        let refetch = {
            let mut selection = self.selection();
            if selection.generation != generation {
                return;
            }
            let Some(state) = selection.branch.clone() else {
                return;
            };

            let now = self.inner.parts.clock.now();
            let timer = compute_remaining(&state, now);
            let id = state.branch_id().clone();
            self.publish(Some(BranchView { state, timer }));

            let throttled = matches!(
                selection.last_expiry_refetch,
                Some(last) if now - last < self.inner.settings.expiry_recheck
            );
            if !timer.expired() || selection.refetch_in_flight || throttled {
                None
            } else {
                selection.refetch_in_flight = true;
                selection.last_expiry_refetch = Some(now);
                Some(id)
            }
        };

        if let Some(id) = refetch {
            // Only the backend can say the crash is over.
            info!(
                "Countdown for branch {} reached zero, re-fetching authoritative state",
                id
            );
            let workflow = self.clone();
            tokio::spawn(async move {
                workflow.refetch_expired(generation, id).await;
            });
        }
    }

    async fn refetch_expired(&self, generation: u64, id: BranchId) {
        match self.inner.parts.directory.get_branch(&id).await {
            Ok(state) => {
                let ended = !state.active();
                let label = state.label().to_string();
                if self.apply(generation, state) && ended {
                    info!("Market crash on branch {} has ended", id);
                    self.notify(messages::expired(&label));
                    self.refresh_broadcast().await;
                } else if !ended {
                    warn!(
                        "Branch {} still reported crashing after local expiry (clock skew?)",
                        id
                    );
                }
            }
            Err(e) => {
                warn!("Expiry re-fetch of branch {} failed: {}", id, e);
                let mut selection = self.selection();
                if selection.generation == generation {
                    selection.refetch_in_flight = false;
                }
            }
        }
    }

    // --- Mutations ---

    fn loaded_branch(&self) -> Result<BranchCrashState, ValidationError> {
        self.selection()
            .branch
            .clone()
            .ok_or(ValidationError::NoBranchSelected)
    }

    fn label_of(&self, id: &BranchId) -> String {
        match &self.selection().branch {
            Some(state) if state.branch_id() == id => state.label().to_string(),
            _ => id.to_string(),
        }
    }

    fn reject(&self, title: &str, error: ValidationError) -> CrashError {
        warn!("{}: {}", title, error);
        self.notify(Notification::error(title, error.to_string()));
        error.into()
    }

    fn executor(&self) -> IntentExecutor {
        let weak = Arc::downgrade(&self.inner);
        Box::new(move |intent| {
            async move {
                if let Some(inner) = weak.upgrade() {
                    BranchWorkflow { inner }.execute(intent).await;
                }
            }
            .boxed()
        })
    }

    fn open_gate(&self, title: &str, intent: ConfirmationIntent) -> Result<(), CrashError> {
        if self.inner.gate.open(intent, self.executor()) {
            Ok(())
        } else {
            Err(self.reject(title, ValidationError::ConfirmationPending))
        }
    }

    /// Asks for confirmation to crash the selected branch.
    ///
    /// Checked locally, before anything reaches the gate: a branch is loaded,
    /// it is not already crashing, and both values are in their allowed sets.
    ///
    /// # Arguments
    ///
    /// * `intensity_percent` - One of [`CrashIntensity::ALLOWED`].
    /// * `duration_minutes` - One of [`CrashDuration::ALLOWED`].
    pub fn request_trigger(&self, intensity_percent: u32, duration_minutes: u32) -> Result<(), CrashError> {
        const TITLE: &str = "Cannot trigger market crash";

        let branch = self.loaded_branch().map_err(|e| self.reject(TITLE, e))?;
        if branch.active() {
            let error = ValidationError::CrashAlreadyActive(branch.branch_id().to_string());
            return Err(self.reject(TITLE, error));
        }
        let intensity = CrashIntensity::try_from(intensity_percent).map_err(|e| self.reject(TITLE, e))?;
        let duration = CrashDuration::try_from(duration_minutes).map_err(|e| self.reject(TITLE, e))?;

        self.open_gate(
            TITLE,
            ConfirmationIntent::Trigger {
                branch_id: branch.branch_id().clone(),
                intensity,
                duration,
            },
        )
    }

    /// Asks for confirmation to end the selected branch's crash.
    pub fn request_end(&self) -> Result<(), CrashError> {
        const TITLE: &str = "Cannot end market crash";

        let branch = self.loaded_branch().map_err(|e| self.reject(TITLE, e))?;
        if !branch.active() {
            let error = ValidationError::CrashNotActive(branch.branch_id().to_string());
            return Err(self.reject(TITLE, error));
        }

        self.open_gate(
            TITLE,
            ConfirmationIntent::End {
                branch_id: branch.branch_id().clone(),
            },
        )
    }

    /// Confirms the pending request. See [`ConfirmationGate::confirm`].
    pub async fn confirm(&self) -> bool {
        self.inner.gate.confirm().await
    }

    /// Dismisses the pending request without side effect.
    pub fn dismiss(&self, reason: DismissReason) -> bool {
        self.inner.gate.dismiss(reason)
    }

    async fn execute(&self, intent: ConfirmationIntent) {
        match intent {
            ConfirmationIntent::Trigger {
                branch_id,
                intensity,
                duration,
            } => {
                let label = self.label_of(&branch_id);
                match self
                    .inner
                    .parts
                    .pricing
                    .trigger_crash(&branch_id, intensity, duration)
                    .await
                {
                    Ok(ack) => {
                        info!(
                            "Market crash triggered on branch {} ({} for {})",
                            branch_id, intensity, duration
                        );
                        self.reload(&branch_id).await;
                        self.refresh_broadcast().await;
                        self.notify(messages::triggered(&label, intensity, duration, &ack));
                    }
                    Err(e) => {
                        error!("Trigger on branch {} failed: {}", branch_id, e);
                        self.reconcile_conflict(&branch_id, &e).await;
                        self.notify(Notification::error(
                            "Failed to trigger market crash",
                            e.to_string(),
                        ));
                    }
                }
            }
            ConfirmationIntent::End { branch_id } => {
                let label = self.label_of(&branch_id);
                match self.inner.parts.pricing.end_crash(&branch_id).await {
                    Ok(ack) => {
                        info!(
                            "Market crash ended on branch {} ({} prices reset)",
                            branch_id,
                            ack.reset_count.unwrap_or_default()
                        );
                        self.reload(&branch_id).await;
                        self.refresh_broadcast().await;
                        self.notify(messages::ended(&label, &ack));
                    }
                    Err(e) => {
                        error!("End on branch {} failed: {}", branch_id, e);
                        self.reconcile_conflict(&branch_id, &e).await;
                        self.notify(Notification::error(
                            "Failed to end market crash",
                            e.to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// A 409 means the backend disagrees with our view of the branch (another
    /// session got there first). Pull the authoritative state; nothing else
    /// changes.
    async fn reconcile_conflict(&self, id: &BranchId, error: &CrashError) {
        if error.is_conflict() {
            info!("Backend state of branch {} diverged, re-fetching", id);
            self.reload(id).await;
            self.refresh_broadcast().await;
        }
    }
}
