use crate::timer::{Scheduler, TickCallback, TickHandle};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Entry {
    period: Duration,
    callback: Option<TickCallback>,
    cancelled: Arc<AtomicBool>,
}

/// A scheduler whose ticks are fired by hand with [`ManualScheduler::fire`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    entries: Arc<Mutex<Vec<Entry>>>,
    scheduled: Arc<AtomicUsize>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires one tick on every live schedule.
    ///
    /// Callbacks run without the internal lock held, so they may schedule or
    /// cancel freely.
    ///
    /// # Returns
    ///
    /// * The number of callbacks that ran.
    pub fn fire(&self) -> usize {
        let taken: Vec<(usize, TickCallback)> = {
            let mut entries = self.entries.lock().unwrap();
            entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));
            entries
                .iter_mut()
                .enumerate()
                .filter_map(|(i, e)| e.callback.take().map(|cb| (i, cb)))
                .collect()
        };

        let fired = taken.len();
        let mut returned = Vec::with_capacity(fired);
        for (i, mut callback) in taken {
            callback();
            returned.push((i, callback));
        }

        let mut entries = self.entries.lock().unwrap();
        for (i, callback) in returned {
            if let Some(entry) = entries.get_mut(i) {
                if !entry.cancelled.load(Ordering::SeqCst) {
                    entry.callback = Some(callback);
                }
            }
        }
        fired
    }

    /// Number of schedules not yet cancelled.
    pub fn active(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Number of schedules ever started.
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Periods of the live schedules.
    pub fn periods(&self) -> Vec<Duration> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::SeqCst))
            .map(|e| e.period)
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, callback: TickCallback) -> TickHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.entries.lock().unwrap().push(Entry {
            period,
            callback: Some(callback),
            cancelled: cancelled.clone(),
        });
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        TickHandle::new(move || cancelled.store(true, Ordering::SeqCst))
    }
}
