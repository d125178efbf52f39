use chrono::{DateTime, Utc};

/// Source of "now" for countdown computation.
///
/// Injected so tests can pin the instant instead of waiting on wall time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The local wall clock. Expected to be skewed against the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
