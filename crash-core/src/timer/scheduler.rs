use log::debug;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Callback fired on every tick of a recurring schedule.
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// Schedules recurring callbacks.
///
/// Each tick is an independent callback, not a blocking wait. Tests inject a
/// manual implementation and fire ticks by hand.
pub trait Scheduler: Send + Sync {
    /// Starts calling `callback` every `period`, first call one period from now.
    ///
    /// # Returns
    ///
    /// * `TickHandle` - Stops the schedule when cancelled or dropped.
    fn schedule_repeating(&self, period: Duration, callback: TickCallback) -> TickHandle;
}

/// Ownership of a running schedule. Dropping it cancels the schedule.
pub struct TickHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TickHandle {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stops the schedule now. Same as dropping the handle.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Runs each schedule as a tokio task driven by `tokio::time::interval`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, period: Duration, mut callback: TickCallback) -> TickHandle {
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            // A stalled runtime should not replay a burst of stale ticks.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                callback();
            }
        });
        TickHandle::new(move || {
            debug!("Cancelling recurring tick");
            task.abort();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_ticks_until_dropped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let handle = TokioScheduler.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        drop(handle);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_tick_handle_cancels_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let handle = TickHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
