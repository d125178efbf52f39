//! Drives the reqwest-based adapter against the axum backend on an ephemeral port.

use chrono::{Duration, Utc};
use crash::prelude::*;
use crash::CrashWindow;
use crash_core::testing::{ManualScheduler, RecordingSink};
use crash_core::{
    BranchWorkflow, Collaborators, ConsoleConfig, CrashBroadcast, HttpBackend, NoopBackground,
    SystemClock, WorkflowSettings,
};
use dummy_pricing::{router, BranchStore};
use std::sync::Arc;

fn seeded_store() -> Arc<BranchStore> {
    let started = Utc::now() - Duration::minutes(20);
    Arc::new(
        BranchStore::new()
            .with_branch(BranchCrashState::new(BranchId::new("b1"), "Harbour"), 9)
            .with_branch(BranchCrashState::new(BranchId::new("b2"), "Old Town"), 4)
            // Ran out five minutes ago without anyone ending it.
            .with_branch(
                BranchCrashState::new(BranchId::new("b3"), "Airport").started_at(started, 15),
                3,
            ),
    )
}

async fn serve(store: Arc<BranchStore>, token: Option<&str>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(store, token.map(str::to_string));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn client(base: String, token: Option<&str>) -> HttpBackend {
    HttpBackend::new(&ConsoleConfig {
        api_base_url: base,
        api_token: token.map(str::to_string),
        ..ConsoleConfig::default()
    })
    .unwrap()
}

fn options(intensity: u32, duration: u32) -> (CrashIntensity, CrashDuration) {
    (
        CrashIntensity::try_from(intensity).unwrap(),
        CrashDuration::try_from(duration).unwrap(),
    )
}

#[tokio::test]
async fn test_lists_and_loads_branches() {
    let http = client(serve(seeded_store(), None).await, None);

    let branches = http.list_branches().await.unwrap();
    assert_eq!(branches.len(), 3);
    assert_eq!(branches[0].name(), "Harbour");
    // The expired window was closed by the backend.
    assert!(branches.iter().all(|b| !b.active()));

    let b3 = http.get_branch(&BranchId::new("b3")).await.unwrap();
    assert!(!b3.active());
    assert!(b3.start_time().is_some());
}

#[tokio::test]
async fn test_trigger_and_end_round_trip() {
    let http = client(serve(seeded_store(), None).await, None);
    let id = BranchId::new("b1");
    let (intensity, duration) = options(75, 10);

    let ack = http.trigger_crash(&id, intensity, duration).await.unwrap();
    assert_eq!(
        ack.message.as_deref(),
        Some("Market crash triggered for Harbour (75% for 10 min)")
    );

    let state = http.get_branch(&id).await.unwrap();
    assert!(state.active());
    assert_eq!(state.intensity_percent(), 75);
    let (start, end) = (state.start_time().unwrap(), state.end_time().unwrap());
    assert_eq!(end - start, Duration::minutes(10));

    let ack = http.end_crash(&id).await.unwrap();
    assert_eq!(ack.reset_count, Some(9));
    assert!(!http.get_branch(&id).await.unwrap().active());
}

#[tokio::test]
async fn test_lifecycle_conflicts_surface_as_409() {
    let http = client(serve(seeded_store(), None).await, None);
    let id = BranchId::new("b2");
    let (intensity, duration) = options(50, 15);

    let err = http.end_crash(&id).await.unwrap_err();
    assert!(err.is_conflict());

    http.trigger_crash(&id, intensity, duration).await.unwrap();
    let err = http.trigger_crash(&id, intensity, duration).await.unwrap_err();
    assert_eq!(
        err,
        CrashError::remote(Some(409), "A market crash is already active for branch b2")
    );
}

#[tokio::test]
async fn test_unknown_branch_is_404_with_backend_message() {
    let http = client(serve(seeded_store(), None).await, None);
    let err = http.get_branch(&BranchId::new("nowhere")).await.unwrap_err();
    assert_eq!(err, CrashError::remote(Some(404), "Branch nowhere not found"));
}

#[tokio::test]
async fn test_bearer_token_is_enforced() {
    let base = serve(seeded_store(), Some("s3cret")).await;

    let err = client(base.clone(), None).list_branches().await.unwrap_err();
    assert_eq!(err, CrashError::remote(Some(401), "Unauthorized"));

    let branches = client(base, Some("s3cret")).list_branches().await.unwrap();
    assert_eq!(branches.len(), 3);
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{}/api", addr), None)
        .list_branches()
        .await
        .unwrap_err();
    assert!(matches!(err, CrashError::Network(_)));
}

#[tokio::test]
async fn test_workflow_over_http() {
    let http = Arc::new(client(serve(seeded_store(), None).await, None));
    let sink = Arc::new(RecordingSink::new());
    let scheduler = ManualScheduler::new();
    let broadcast = CrashBroadcast::new(
        http.clone(),
        Arc::new(SystemClock),
        std::time::Duration::from_secs(15),
    );
    let workflow = BranchWorkflow::new(
        Collaborators {
            directory: http.clone(),
            pricing: http.clone(),
            notifier: sink.clone(),
            clock: Arc::new(SystemClock),
            scheduler: Arc::new(scheduler.clone()),
            background: Arc::new(NoopBackground),
        },
        broadcast.clone(),
        WorkflowSettings::default(),
    );
    let id = BranchId::new("b2");

    workflow.select_branch(id.clone()).await.unwrap();
    workflow.request_trigger(35, 30).unwrap();
    assert!(workflow.confirm().await);

    assert!(workflow.view().unwrap().state().active());
    assert!(broadcast.snapshot().contains(&id));
    assert_eq!(scheduler.active(), 1);
    let remaining = workflow.view().unwrap().timer().remaining_seconds();
    assert!(remaining > 29 * 60 && remaining <= 30 * 60);

    workflow.request_end().unwrap();
    assert!(workflow.confirm().await);

    assert!(!broadcast.is_any_branch_crashing());
    assert_eq!(scheduler.active(), 0);
    assert!(sink.errors().is_empty());
    assert!(sink.last().unwrap().description.contains("4 item prices reset"));
}
