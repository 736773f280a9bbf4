//! Audit trail conformance tests.

use std::future::Future;

use super::{make_event, seed_ticket, TestResult};
use crate::WorkflowStorage;

pub(super) async fn run_audit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "audit",
        "events_ordered_by_created_at",
        events_ordered_by_created_at(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "same_instant_events_keep_insert_order",
        same_instant_events_keep_insert_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "events_scoped_to_ticket",
        events_scoped_to_ticket(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "aborted_event_invisible",
        aborted_event_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "event_preserves_fields",
        event_preserves_fields(factory).await,
    ));

    results
}

async fn append<S: WorkflowStorage>(
    s: &S,
    ticket_id: i64,
    label: &str,
    at: &str,
) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_ticket_event(&mut snap, make_event(ticket_id, label, at))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}

async fn labels<S: WorkflowStorage>(s: &S, ticket_id: i64) -> Result<Vec<String>, String> {
    Ok(s.list_ticket_events(ticket_id)
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|e| e.status_label)
        .collect())
}

async fn events_ordered_by_created_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    // Inserted out of order on purpose.
    append(&s, ticket.id, "OCD Approved", "2025-09-03T00:00:00Z").await?;
    append(&s, ticket.id, "Submitted IT Job Request", "2025-09-01T00:00:00Z").await?;
    append(&s, ticket.id, "Division Chief Approved", "2025-09-02T00:00:00Z").await?;

    let got = labels(&s, ticket.id).await?;
    let want = [
        "Submitted IT Job Request",
        "Division Chief Approved",
        "OCD Approved",
    ];
    if got != want {
        return Err(format!("expected {want:?}, got {got:?}"));
    }
    Ok(())
}

async fn same_instant_events_keep_insert_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    let at = "2025-09-04T10:00:00Z";
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for label in ["MIS Assessed the Request", "Acted by MIS", "Completed"] {
        s.insert_ticket_event(&mut snap, make_event(ticket.id, label, at))
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let got = labels(&s, ticket.id).await?;
    if got != ["MIS Assessed the Request", "Acted by MIS", "Completed"] {
        return Err(format!("same-instant events reordered: {got:?}"));
    }
    Ok(())
}

async fn events_scoped_to_ticket<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = seed_ticket(&s, "2025-09-0001").await?;
    let b = seed_ticket(&s, "2025-09-0002").await?;
    append(&s, a.id, "Submitted IT Job Request", "2025-09-01T00:00:00Z").await?;
    append(&s, b.id, "Submitted IT Job Request", "2025-09-01T00:00:00Z").await?;
    append(&s, b.id, "Division Chief Rejected", "2025-09-02T00:00:00Z").await?;

    let events_a = s.list_ticket_events(a.id).await.map_err(|e| e.to_string())?;
    let events_b = s.list_ticket_events(b.id).await.map_err(|e| e.to_string())?;
    if events_a.len() != 1 || events_b.len() != 2 {
        return Err(format!(
            "expected 1 and 2 events, got {} and {}",
            events_a.len(),
            events_b.len()
        ));
    }
    if events_b.iter().any(|e| e.ticket_id != b.id) {
        return Err("event listed under the wrong ticket".to_string());
    }
    Ok(())
}

async fn aborted_event_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    append(&s, ticket.id, "Submitted IT Job Request", "2025-09-01T00:00:00Z").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_ticket_event(
        &mut snap,
        make_event(ticket.id, "Division Chief Approved", "2025-09-02T00:00:00Z"),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let got = labels(&s, ticket.id).await?;
    if got != ["Submitted IT Job Request"] {
        return Err(format!("aborted event visible: {got:?}"));
    }
    Ok(())
}

async fn event_preserves_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let inserted = s
        .insert_ticket_event(
            &mut snap,
            make_event(ticket.id, "Completed", "2025-09-05T00:00:00Z"),
        )
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let events = s
        .list_ticket_events(ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    match events.as_slice() {
        [only] if *only == inserted => {
            if only.remarks != "Completed remarks" || only.actor_id != 100 {
                return Err(format!("fields altered: {only:?}"));
            }
            Ok(())
        }
        other => Err(format!("expected exactly the inserted event, got {other:?}")),
    }
}
