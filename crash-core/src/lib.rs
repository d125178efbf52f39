//! # Crash Core
//!
//! The market-crash lifecycle manager. Tracks, across independently operated
//! branches, whether a time-boxed price drop is active, keeps a live countdown
//! against the backend's end time, broadcasts the global "something is
//! crashing" signal and gates the irreversible trigger/end actions behind an
//! explicit confirmation.
//!
//! ## Modules
//! - `timer`: countdown computation, wall clock and recurring tick scheduling.
//! - `gate`: the two-step confirmation state machine.
//! - `broadcast`: process-wide snapshot of crashing branches, polled and refreshable.
//! - `workflow`: the per-branch orchestrator composing the pieces above.
//! - `http`: REST adapter for the branch directory and pricing service.
//! - `config`: console configuration loading.
//! - `notify`: log-backed notification sink.

pub mod broadcast;
pub mod config;
pub mod gate;
pub mod http;
pub mod notify;
pub mod timer;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use broadcast::{CrashBroadcast, CrashSubscription, GlobalCrashSnapshot};
pub use self::config::{ConfigError, ConsoleConfig};
pub use gate::{BackgroundLock, ConfirmationGate, DismissReason, GateStatus, NoopBackground};
pub use http::HttpBackend;
pub use notify::LogNotifier;
pub use timer::{compute_remaining, Clock, Scheduler, SystemClock, TickHandle, TokioScheduler};
pub use workflow::{BranchView, BranchWorkflow, Collaborators, WorkflowSettings};
