use super::*;
use crate::testing::{settle, InMemoryBackend, ManualClock};
use chrono::{TimeZone, Utc};
use crash::{BranchCrashState, BranchId};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 12, 19, 0, 0).unwrap()
}

fn backend() -> Arc<InMemoryBackend> {
    let clock = Arc::new(ManualClock::new(t0()));
    Arc::new(
        InMemoryBackend::new(clock)
            .with_branch(BranchCrashState::new(BranchId::new("b1"), "Harbour").started_at(t0(), 15))
            .with_branch(BranchCrashState::new(BranchId::new("b2"), "Old Town"))
            .with_branch(BranchCrashState::new(BranchId::new("b3"), "Airport").started_at(t0(), 5)),
    )
}

fn broadcast(backend: Arc<InMemoryBackend>) -> CrashBroadcast {
    CrashBroadcast::new(backend, Arc::new(ManualClock::new(t0())), Duration::from_secs(15))
}

#[tokio::test]
async fn test_starts_empty_and_refresh_keeps_only_crashing_branches() {
    let backend = backend();
    let broadcast = broadcast(backend.clone());
    assert!(!broadcast.is_any_branch_crashing());
    assert!(broadcast.snapshot().refreshed_at().is_none());

    let snapshot = broadcast.refresh().await.unwrap();

    assert!(snapshot.is_any_branch_crashing());
    let ids: Vec<&str> = snapshot
        .crashing_branches()
        .iter()
        .map(|b| b.branch_id().as_str())
        .collect();
    assert_eq!(ids, vec!["b1", "b3"]);
    assert_eq!(broadcast.crashing_branches().len(), 2);
    assert!(!snapshot.contains(&BranchId::new("b2")));
    assert_eq!(snapshot.refreshed_at(), Some(t0()));
}

#[tokio::test]
async fn test_snapshot_is_stamped_by_injected_clock() {
    let clock = Arc::new(ManualClock::new(t0()));
    let broadcast = CrashBroadcast::new(backend(), clock.clone(), Duration::from_secs(15));

    broadcast.refresh().await.unwrap();
    clock.advance(chrono::Duration::seconds(15));
    broadcast.refresh().await.unwrap();

    assert_eq!(
        broadcast.snapshot().refreshed_at(),
        Some(t0() + chrono::Duration::seconds(15))
    );
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let backend = backend();
    let broadcast = broadcast(backend.clone());
    broadcast.refresh().await.unwrap();

    backend.fail_next_list(CrashError::network("connection reset"));
    let err = broadcast.refresh().await.unwrap_err();

    assert_eq!(err, CrashError::network("connection reset"));
    assert_eq!(broadcast.crashing_branches().len(), 2);
}

#[tokio::test]
async fn test_overlapping_refreshes_coalesce() {
    let backend = backend();
    let broadcast = broadcast(backend.clone());
    let hold = backend.hold_listing();

    let first = broadcast.refresh();
    let second = broadcast.refresh();
    let third = broadcast.refresh();
    let release = async {
        settle().await;
        // The first listing is in flight; the later callers share one queued follow-up.
        assert_eq!(backend.calls().list, 1);
        hold.release();
    };

    let (first, second, third, _) = tokio::join!(first, second, third, release);
    let (first, second, third) = (first.unwrap(), second.unwrap(), third.unwrap());

    assert_eq!(backend.calls().list, 2);
    assert_eq!(backend.listing_peak(), 1);
    assert!(Arc::ptr_eq(&second, &third));
    assert!(!Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_refresh_after_mutation_observes_new_state() {
    let backend = backend();
    let broadcast = broadcast(backend.clone());
    broadcast.refresh().await.unwrap();
    assert!(broadcast.snapshot().contains(&BranchId::new("b1")));

    backend.put(BranchCrashState::new(BranchId::new("b1"), "Harbour"));
    broadcast.refresh().await.unwrap();

    assert!(!broadcast.snapshot().contains(&BranchId::new("b1")));
}

#[tokio::test]
async fn test_subscribers_only_wake_on_change() {
    let backend = backend();
    let broadcast = broadcast(backend.clone());
    let mut subscription = broadcast.subscribe();

    broadcast.refresh().await.unwrap();
    let seen = subscription.changed().await.unwrap();
    assert_eq!(seen.crashing_branches().len(), 2);

    // Same crashing set: no wake-up.
    broadcast.refresh().await.unwrap();
    let quiet = tokio::time::timeout(Duration::from_millis(20), subscription.changed()).await;
    assert!(quiet.is_err());

    backend.put(BranchCrashState::new(BranchId::new("b3"), "Airport"));
    broadcast.refresh().await.unwrap();
    let seen = subscription.changed().await.unwrap();
    assert_eq!(seen.crashing_branches().len(), 1);
    assert_eq!(subscription.current().crashing_branches().len(), 1);
}

#[tokio::test]
async fn test_subscription_ends_when_broadcast_dropped() {
    let broadcast = broadcast(backend());
    let mut subscription = broadcast.subscribe();
    drop(broadcast);
    assert!(subscription.changed().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_polls_on_interval_until_disposed() {
    let backend = backend();
    let broadcast = broadcast(backend.clone());
    broadcast.init();
    broadcast.init();
    assert!(broadcast.is_polling());

    // First poll fires immediately, then every 15s.
    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.calls().list, 1);
    assert!(broadcast.is_any_branch_crashing());

    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.calls().list, 3);

    broadcast.dispose();
    assert!(!broadcast.is_polling());
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.calls().list, 3);
    assert!(broadcast.is_any_branch_crashing());
}
