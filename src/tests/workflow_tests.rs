use super::*;
use crate::cache::{CacheKey, FetchStatus};
use crate::model::{GroupingKey, Severity};
use crate::status::StatusFilter;
use crate::test_support::{record, FakeGateway};
use futures::FutureExt;
use serde_json::json;
use std::sync::atomic::Ordering;

fn setup(
    status: &str,
) -> (
    Arc<FakeGateway>,
    Arc<QueryCache>,
    StatusWorkflow,
    mpsc::UnboundedReceiver<ConsoleEvent>,
) {
    let gateway = FakeGateway::with_records(vec![record(
        json!({"id": 9, "name_of_firm": "Acme", "profile_status": status}),
    )]);
    let cache = Arc::new(QueryCache::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let wf = StatusWorkflow::new(gateway.clone(), cache.clone(), tx);
    (gateway, cache, wf, rx)
}

fn listing_key() -> CacheKey {
    CacheKey::new(
        "participants",
        Some(GroupingKey("30".into())),
        StatusFilter::All,
    )
}

async fn load(cache: &QueryCache, gateway: &Arc<FakeGateway>) -> Vec<Record> {
    let gw = gateway.clone();
    let entry = cache
        .read(&listing_key(), move || {
            async move { gw.list(EntityKind::Participants, None).await }.boxed()
        })
        .await;
    assert_eq!(entry.status, FetchStatus::Success);
    entry.data.as_ref().clone()
}

#[tokio::test]
async fn advance_writes_successor_and_refreshes_listing() {
    let (gateway, cache, wf, mut rx) = setup("Pending");
    let rows = load(&cache, &gateway).await;

    let next = wf.advance(EntityKind::Participants, &rows[0]).await.unwrap();
    assert_eq!(next, ParticipantStatus::Confirm);
    assert_eq!(gateway.field_of("9", "profile_status").as_deref(), Some("Confirm"));

    let reloaded = load(&cache, &gateway).await;
    assert_eq!(reloaded[0].text("profile_status"), "Confirm");
    assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 2);

    match rx.try_recv() {
        Ok(ConsoleEvent::Notice(n)) => {
            assert_eq!(n.severity, Severity::Success);
            assert_eq!(n.title, "Status Updated");
            assert_eq!(n.message, "Participant status changed to Confirm");
        }
        other => panic!("expected notice, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_wraps_back_to_pending() {
    let (gateway, cache, wf, _rx) = setup("Cancel");
    let rows = load(&cache, &gateway).await;
    let next = wf.advance(EntityKind::Participants, &rows[0]).await.unwrap();
    assert_eq!(next, ParticipantStatus::Pending);
    assert_eq!(gateway.field_of("9", "profile_status").as_deref(), Some("Pending"));
}

#[tokio::test]
async fn failed_write_leaves_cache_untouched_and_does_not_retry() {
    let (gateway, cache, wf, mut rx) = setup("Confirm");
    gateway.fail_status.store(true, Ordering::SeqCst);
    let rows = load(&cache, &gateway).await;

    let err = wf.advance(EntityKind::Participants, &rows[0]).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Gateway(GatewayError::Status { status: 500 })));
    assert_eq!(gateway.status_calls.load(Ordering::SeqCst), 1);

    load(&cache, &gateway).await;
    assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(rows[0].text("profile_status"), "Confirm");

    match rx.try_recv() {
        Ok(ConsoleEvent::Notice(n)) => {
            assert_eq!(n.severity, Severity::Error);
            assert_eq!(n.message, "Failed to update status. Please try again.");
        }
        other => panic!("expected notice, got {other:?}"),
    }
}

#[tokio::test]
async fn registrations_have_no_workflow() {
    let (gateway, _cache, wf, _rx) = setup("Pending");
    let row = record(json!({"id": 1, "fair_print_status": ""}));
    assert!(matches!(
        wf.advance(EntityKind::Registrations, &row).await,
        Err(WorkflowError::NoWorkflow(EntityKind::Registrations))
    ));
    assert_eq!(gateway.status_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn status_outside_the_cycle_advances_to_pending() {
    for status in [json!("Archived"), json!(null), json!("")] {
        let row = record(json!({"id": 1, "profile_status": status}));
        assert_eq!(
            StatusWorkflow::next_status(EntityKind::Participants, &row).unwrap(),
            ParticipantStatus::Pending,
            "{status}"
        );
    }
    let missing = record(json!({"id": 1}));
    assert_eq!(
        StatusWorkflow::next_status(EntityKind::Participants, &missing).unwrap(),
        ParticipantStatus::Pending
    );
}
