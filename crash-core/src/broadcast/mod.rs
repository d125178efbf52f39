//! # Global Crash Broadcast
//!
//! Process-wide view of which branches are crashing, independent of any
//! screen. It is the single writer of the [`GlobalCrashSnapshot`]; every other
//! component only reads it or subscribes to it.
//!
//! ## Lifecycle
//! 1. `CrashBroadcast::new` starts with an empty snapshot.
//! 2. `init` starts the polling task (first refresh immediately).
//! 3. `refresh` may be called at any time, typically right after a mutation.
//! 4. `dispose` (or dropping the last handle) stops polling.
//!
//! ## Coalescing
//! At most one listing request is in flight. A `refresh` arriving while a
//! request is running does not start a second one: it queues a single
//! follow-up that every later caller joins, and that follow-up only starts
//! once the running request has finished. Callers therefore always observe a
//! listing that started after they asked.

mod snapshot;

pub use snapshot::GlobalCrashSnapshot;

use crate::timer::Clock;
use crash::{BranchDirectory, BranchSummary, CrashError};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

pub type RefreshResult = Result<Arc<GlobalCrashSnapshot>, CrashError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// The most recently queued refresh.
struct PendingRefresh {
    id: u64,
    started: Arc<AtomicBool>,
    future: SharedRefresh,
}

#[derive(Default)]
struct RefreshSlot {
    next_id: u64,
    latest: Option<PendingRefresh>,
}

struct BroadcastInner {
    directory: Arc<dyn BranchDirectory>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    snapshot: watch::Sender<Arc<GlobalCrashSnapshot>>,
    slot: Mutex<RefreshSlot>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastInner {
    async fn fetch_and_publish(&self) -> RefreshResult {
        let branches = self.directory.list_branches().await.map_err(|e| {
            warn!("Crash broadcast refresh failed: {}", e);
            e
        })?;

        let crashing: Vec<BranchSummary> = branches.into_iter().filter(|b| b.active()).collect();
        let next = Arc::new(GlobalCrashSnapshot::new(crashing, self.clock.now()));

        // Whole-list replacement: readers never see a half-applied list.
        self.snapshot.send_if_modified(|current| {
            let changed = current.crashing_branches() != next.crashing_branches();
            *current = next.clone();
            changed
        });
        debug!(
            "Crash broadcast refreshed: {} branch(es) crashing",
            next.crashing_branches().len()
        );
        Ok(next)
    }
}

impl Drop for BroadcastInner {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.poller).take() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to the process-wide crash broadcast. Cheap to clone; all clones
/// share one snapshot and one polling task.
#[derive(Clone)]
pub struct CrashBroadcast {
    inner: Arc<BroadcastInner>,
}

impl CrashBroadcast {
    /// Creates a broadcast with an empty snapshot. Nothing is fetched until
    /// `init` or `refresh` is called.
    ///
    /// # Arguments
    ///
    /// * `directory` - Source of the branch list.
    /// * `clock` - Stamps each snapshot's refresh time.
    /// * `poll_interval` - Period of the background refresh started by `init`.
    pub fn new(
        directory: Arc<dyn BranchDirectory>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(GlobalCrashSnapshot::empty()));
        Self {
            inner: Arc::new(BroadcastInner {
                directory,
                clock,
                poll_interval,
                snapshot,
                slot: Mutex::new(RefreshSlot::default()),
                poller: Mutex::new(None),
            }),
        }
    }

    /// Starts the background polling task. Calling it twice is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(&self) {
        let mut poller = lock(&self.inner.poller);
        if poller.is_some() {
            warn!("Crash broadcast already initialized");
            return;
        }

        info!(
            "Crash broadcast polling every {:?}",
            self.inner.poll_interval
        );
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.poll_interval;
        *poller = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                // Failures are already logged and the last snapshot stays in place.
                let _ = CrashBroadcast { inner }.refresh().await;
            }
        }));
    }

    /// Stops the polling task. The last snapshot stays readable.
    pub fn dispose(&self) {
        if let Some(task) = lock(&self.inner.poller).take() {
            info!("Crash broadcast disposed");
            task.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.inner.poller).is_some()
    }

    /// Re-fetches every branch and atomically replaces the snapshot.
    ///
    /// Overlapping calls coalesce; see the module docs.
    ///
    /// # Returns
    ///
    /// * The snapshot produced by the listing this call waited on. On failure
    ///   the previous snapshot is kept and the error is returned.
    pub async fn refresh(&self) -> RefreshResult {
        let (id, future) = self.join_or_queue();
        let result = future.await;

        let mut slot = lock(&self.inner.slot);
        if slot.latest.as_ref().map(|p| p.id) == Some(id) {
            slot.latest = None;
        }
        result
    }

    fn join_or_queue(&self) -> (u64, SharedRefresh) {
        let mut slot = lock(&self.inner.slot);

        if let Some(pending) = &slot.latest {
            if !pending.started.load(Ordering::SeqCst) {
                debug!("Joining queued crash broadcast refresh #{}", pending.id);
                return (pending.id, pending.future.clone());
            }
        }

        slot.next_id += 1;
        let id = slot.next_id;
        let previous = slot.latest.as_ref().map(|p| p.future.clone());
        let started = Arc::new(AtomicBool::new(false));

        // Weak: the queued future lives inside `inner`.
        let inner = Arc::downgrade(&self.inner);
        let flag = started.clone();
        let future = async move {
            if let Some(previous) = previous {
                debug!("Refresh #{} waiting for the one in flight", id);
                let _ = previous.await;
            }
            flag.store(true, Ordering::SeqCst);
            match inner.upgrade() {
                Some(inner) => inner.fetch_and_publish().await,
                None => Err(CrashError::network("crash broadcast disposed")),
            }
        }
        .boxed()
        .shared();

        slot.latest = Some(PendingRefresh {
            id,
            started,
            future: future.clone(),
        });
        (id, future)
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<GlobalCrashSnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn is_any_branch_crashing(&self) -> bool {
        self.snapshot().is_any_branch_crashing()
    }

    pub fn crashing_branches(&self) -> Vec<BranchSummary> {
        self.snapshot().crashing_branches().to_vec()
    }

    /// Subscribes to snapshot changes. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> CrashSubscription {
        CrashSubscription {
            receiver: self.inner.snapshot.subscribe(),
        }
    }
}

/// A subscriber to the global crash snapshot.
///
/// Wraps a `tokio::sync::watch` receiver so a subscriber only ever sees whole
/// snapshots and only wakes when the set of crashing branches changes.
pub struct CrashSubscription {
    receiver: watch::Receiver<Arc<GlobalCrashSnapshot>>,
}

impl CrashSubscription {
    pub fn current(&self) -> Arc<GlobalCrashSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next change.
    ///
    /// # Returns
    ///
    /// * `None` once the broadcast has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<GlobalCrashSnapshot>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests;
