//! Fakes for exercising the lifecycle manager without a backend or wall time.
//!
//! Compiled for this crate's own tests and for dependents that enable the
//! `test-utils` feature.

mod backend;
mod clock;
mod scheduler;
mod sink;

pub use backend::{CallLog, Hold, InMemoryBackend};
pub use clock::ManualClock;
pub use scheduler::ManualScheduler;
pub use sink::RecordingSink;

/// Lets spawned tasks (expiry re-fetches, coalesced refreshes) run to
/// completion on a current-thread runtime. Only works with fakes that never
/// wait on real I/O.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
