use std::future::Future;

use super::{make_event, make_ticket, seed_document, seed_ticket, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "ticket_update_committed",
        ticket_update_committed(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "update_returns_new_version",
        update_returns_new_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "ticket_and_event_both_visible_after_commit",
        ticket_and_event_both_visible_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "ticket_and_event_neither_visible_after_abort",
        ticket_and_event_neither_visible_after_abort(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "failed_commit_publishes_nothing",
        failed_commit_publishes_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "association_replace_is_atomic",
        association_replace_is_atomic(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "multiple_commits_accumulate",
        multiple_commits_accumulate(factory).await,
    ));

    results
}

// ── Single row ──────────────────────────────────────────────────────────────

async fn ticket_update_committed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut row = s
        .get_ticket_for_update(&mut snap, ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    row.status = "Pending OCD Approval".to_string();
    row.dc_approval_date = Some("2025-09-02T00:00:00Z".to_string());
    s.update_ticket(&mut snap, row.version, row)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let stored = s.get_ticket(ticket.id).await.map_err(|e| e.to_string())?;
    if stored.status != "Pending OCD Approval" {
        return Err(format!("expected updated status, got {}", stored.status));
    }
    if stored.dc_approval_date.as_deref() != Some("2025-09-02T00:00:00Z") {
        return Err(format!("dc_approval_date not stored: {:?}", stored.dc_approval_date));
    }
    if stored.version != 1 {
        return Err(format!("expected version 1, got {}", stored.version));
    }
    Ok(())
}

async fn update_returns_new_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let v1 = s
        .update_ticket(&mut snap, 0, ticket.clone())
        .await
        .map_err(|e| e.to_string())?;
    let mut again = s
        .get_ticket_for_update(&mut snap, ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    again.title = "Printer jam (retitled)".to_string();
    let v2 = s
        .update_ticket(&mut snap, v1, again)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    if (v1, v2) != (1, 2) {
        return Err(format!("expected versions (1, 2), got ({v1}, {v2})"));
    }
    let stored = s.get_ticket(ticket.id).await.map_err(|e| e.to_string())?;
    if stored.version != 2 {
        return Err(format!("expected stored version 2, got {}", stored.version));
    }
    Ok(())
}

// ── Ticket + audit atomicity ────────────────────────────────────────────────

async fn ticket_and_event_both_visible_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let ticket = s
        .insert_ticket(&mut snap, make_ticket("2025-09-0001"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_ticket_event(
        &mut snap,
        make_event(ticket.id, "Submitted IT Job Request", "2025-09-01T00:00:00Z"),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    s.get_ticket(ticket.id).await.map_err(|e| e.to_string())?;
    let events = s
        .list_ticket_events(ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    if events.len() != 1 {
        return Err(format!("expected 1 event, got {}", events.len()));
    }
    Ok(())
}

async fn ticket_and_event_neither_visible_after_abort<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut row = s
        .get_ticket_for_update(&mut snap, ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    row.status = "Rejected by Division Chief".to_string();
    s.update_ticket(&mut snap, 0, row)
        .await
        .map_err(|e| e.to_string())?;
    s.insert_ticket_event(
        &mut snap,
        make_event(ticket.id, "Division Chief Rejected", "2025-09-02T00:00:00Z"),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let stored = s.get_ticket(ticket.id).await.map_err(|e| e.to_string())?;
    let events = s
        .list_ticket_events(ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    if stored.status != ticket.status || !events.is_empty() {
        return Err(format!(
            "abort leaked: status {}, {} events",
            stored.status,
            events.len()
        ));
    }
    Ok(())
}

/// A commit that violates a constraint on its last mutation must not publish
/// the earlier ones.
async fn failed_commit_publishes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let fresh = s
        .insert_ticket(&mut snap, make_ticket("2025-09-0002"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_ticket_event(
        &mut snap,
        make_event(fresh.id, "Submitted IT Job Request", "2025-09-01T00:00:00Z"),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.insert_ticket(&mut snap, make_ticket("2025-09-0001"))
        .await
        .map_err(|e| e.to_string())?;

    // Another writer takes 2025-09-0001 first.
    seed_ticket(&s, "2025-09-0001").await?;

    match s.commit_snapshot(snap).await {
        Err(StorageError::DuplicateTicketNo { .. }) => {}
        other => return Err(format!("expected DuplicateTicketNo, got {other:?}")),
    }
    if s.get_ticket(fresh.id).await.is_ok() {
        return Err("ticket from failed commit is visible".to_string());
    }
    let events = s
        .list_ticket_events(fresh.id)
        .await
        .map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err("event from failed commit is visible".to_string());
    }
    Ok(())
}

// ── Associations ────────────────────────────────────────────────────────────

async fn association_replace_is_atomic<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1, 2]).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_association(&mut snap, doc.id, 1)
        .await
        .map_err(|e| e.to_string())?;
    s.insert_association(&mut snap, doc.id, 3, "2025-09-03T00:00:00Z")
        .await
        .map_err(|e| e.to_string())?;

    let before: Vec<i64> = s
        .list_associations(doc.id)
        .await
        .map_err(|e| e.to_string())?
        .iter()
        .map(|a| a.plan_id)
        .collect();
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    let after: Vec<i64> = s
        .list_associations(doc.id)
        .await
        .map_err(|e| e.to_string())?
        .iter()
        .map(|a| a.plan_id)
        .collect();

    if before != vec![1, 2] {
        return Err(format!("partial replace visible before commit: {before:?}"));
    }
    if after != vec![2, 3] {
        return Err(format!("expected [2, 3] after commit, got {after:?}"));
    }
    Ok(())
}

async fn multiple_commits_accumulate<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for n in 1..=3 {
        seed_ticket(&s, &format!("2025-09-{n:04}")).await?;
    }
    let all = s
        .list_tickets(&Default::default())
        .await
        .map_err(|e| e.to_string())?;
    if all.len() != 3 {
        return Err(format!("expected 3 tickets, got {}", all.len()));
    }
    if all[0].ticket_no != "2025-09-0003" {
        return Err(format!("expected newest first, got {}", all[0].ticket_no));
    }
    Ok(())
}
