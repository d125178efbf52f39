//! # Confirmation Gate
//!
//! Intercepts irreversible intents and only runs them after an explicit
//! confirmation.
//!
//! ```text
//!  Closed --open--> Open --confirm--> Executing --settled--> Closed
//!                    |  \--open (replaces intent, last request wins)
//!                    \--cancel / escape / backdrop--> Closed
//! ```
//!
//! `confirm` moves the gate out of `Open` synchronously, before the action is
//! awaited, so a double confirm can never run the action twice. The gate only
//! returns to `Closed` once the action has settled (including its re-fetch),
//! so the next `open` always observes post-mutation state.

pub mod background;

pub use background::{BackgroundLock, NoopBackground, SuspendGuard};

use crash::{ConfirmationIntent, IntentKind};
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Runs a confirmed intent. Failures must be caught and reported inside the
/// action itself: the gate has nowhere to send them.
pub type IntentExecutor = Box<dyn FnOnce(ConfirmationIntent) -> BoxFuture<'static, ()> + Send>;

/// How an open gate was dismissed without running its intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    /// The explicit cancel button.
    Cancel,
    /// The escape key.
    Escape,
    /// A click on the overlay behind the dialog.
    Backdrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Closed,
    Open,
    Executing,
}

enum GateState {
    Closed,
    Open {
        intent: ConfirmationIntent,
        executor: IntentExecutor,
        _suspended: SuspendGuard,
    },
    Executing {
        intent: ConfirmationIntent,
        _suspended: SuspendGuard,
    },
}

impl GateState {
    fn status(&self) -> GateStatus {
        match self {
            GateState::Closed => GateStatus::Closed,
            GateState::Open { .. } => GateStatus::Open,
            GateState::Executing { .. } => GateStatus::Executing,
        }
    }
}

pub struct ConfirmationGate {
    state: Mutex<GateState>,
    background: Arc<dyn BackgroundLock>,
}

impl ConfirmationGate {
    pub fn new(background: Arc<dyn BackgroundLock>) -> Self {
        Self {
            state: Mutex::new(GateState::Closed),
            background,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> GateStatus {
        self.lock().status()
    }

    pub fn is_open(&self) -> bool {
        self.status() == GateStatus::Open
    }

    /// The intent awaiting confirmation, or being executed.
    pub fn pending(&self) -> Option<ConfirmationIntent> {
        match &*self.lock() {
            GateState::Closed => None,
            GateState::Open { intent, .. } | GateState::Executing { intent, .. } => {
                Some(intent.clone())
            }
        }
    }

    pub fn pending_kind(&self) -> Option<IntentKind> {
        self.pending().map(|intent| intent.kind())
    }

    /// Opens the gate for `intent`.
    ///
    /// If the gate is already open the pending intent is replaced without
    /// running it.
    ///
    /// # Returns
    ///
    /// * `false` if a confirmed action is still executing; nothing changes.
    pub fn open(&self, intent: ConfirmationIntent, executor: IntentExecutor) -> bool {
        let mut state = self.lock();
        let suspended = match std::mem::replace(&mut *state, GateState::Closed) {
            GateState::Executing {
                intent: running,
                _suspended,
            } => {
                warn!(
                    "Confirmation gate busy with {} on branch {}, ignoring {} request",
                    running.kind(),
                    running.branch_id(),
                    intent.kind()
                );
                *state = GateState::Executing {
                    intent: running,
                    _suspended,
                };
                return false;
            }
            GateState::Open {
                intent: replaced,
                _suspended,
                ..
            } => {
                debug!(
                    "Replacing pending {} intent on branch {}",
                    replaced.kind(),
                    replaced.branch_id()
                );
                _suspended
            }
            GateState::Closed => SuspendGuard::new(self.background.clone()),
        };

        info!(
            "Confirmation requested: {} on branch {}",
            intent.kind(),
            intent.branch_id()
        );
        *state = GateState::Open {
            intent,
            executor,
            _suspended: suspended,
        };
        true
    }

    /// Runs the pending intent exactly once, then closes the gate.
    ///
    /// # Returns
    ///
    /// * `true` if this call ran the intent, `false` if the gate was not open
    ///   (already confirmed, dismissed, or never opened).
    pub async fn confirm(&self) -> bool {
        let (intent, executor) = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, GateState::Closed) {
                GateState::Open {
                    intent,
                    executor,
                    _suspended,
                } => {
                    *state = GateState::Executing {
                        intent: intent.clone(),
                        _suspended,
                    };
                    (intent, executor)
                }
                other => {
                    debug!("Confirm ignored, gate is {:?}", other.status());
                    *state = other;
                    return false;
                }
            }
        };

        info!(
            "Confirmed: {} on branch {}",
            intent.kind(),
            intent.branch_id()
        );
        let _settle = SettleOnDrop(self);
        executor(intent).await;
        true
    }

    /// Closes an open gate without running its intent.
    ///
    /// # Returns
    ///
    /// * `true` if an intent was discarded. An executing action cannot be
    ///   dismissed.
    pub fn dismiss(&self, reason: DismissReason) -> bool {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, GateState::Closed) {
            GateState::Open { intent, .. } => {
                info!(
                    "Confirmation dismissed ({:?}): {} on branch {}",
                    reason,
                    intent.kind(),
                    intent.branch_id()
                );
                true
            }
            other => {
                *state = other;
                false
            }
        }
    }

    pub fn cancel(&self) -> bool {
        self.dismiss(DismissReason::Cancel)
    }
}

/// Returns the gate to `Closed` when the confirmed action settles, or when its
/// future is dropped half-way.
struct SettleOnDrop<'a>(&'a ConfirmationGate);

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        *self.0.lock() = GateState::Closed;
    }
}
