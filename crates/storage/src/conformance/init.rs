use std::future::Future;

use super::{make_document, make_target, make_ticket, seed_ticket, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "insert_ticket_starts_at_version_0",
        insert_ticket_starts_at_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_ticket_assigns_distinct_ids",
        insert_ticket_assigns_distinct_ids(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "inserted_ticket_readable_for_update_in_same_snapshot",
        inserted_ticket_readable_for_update_in_same_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "duplicate_ticket_no_in_same_snapshot",
        duplicate_ticket_no_in_same_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "duplicate_ticket_no_across_snapshots_fails_at_commit",
        duplicate_ticket_no_across_snapshots_fails_at_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "max_ticket_sequence_none_for_empty_period",
        max_ticket_sequence_none_for_empty_period(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "max_ticket_sequence_scoped_to_prefix",
        max_ticket_sequence_scoped_to_prefix(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "max_ticket_sequence_sees_own_insert",
        max_ticket_sequence_sees_own_insert(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "duplicate_target_rejected",
        duplicate_target_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_document_starts_at_version_0",
        insert_document_starts_at_version_0(factory).await,
    ));

    results
}

// ── Tickets ─────────────────────────────────────────────────────────────────

async fn insert_ticket_starts_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    let stored = s.get_ticket(ticket.id).await.map_err(|e| e.to_string())?;
    if stored.version != 0 {
        return Err(format!("expected version 0, got {}", stored.version));
    }
    if stored.ticket_no != "2025-09-0001" {
        return Err(format!("ticket_no not preserved: {}", stored.ticket_no));
    }
    if stored.feedback != 0 {
        return Err(format!("expected feedback 0, got {}", stored.feedback));
    }
    Ok(())
}

async fn insert_ticket_assigns_distinct_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = seed_ticket(&s, "2025-09-0001").await?;
    let b = seed_ticket(&s, "2025-09-0002").await?;
    if a.id == b.id {
        return Err(format!("both tickets got id {}", a.id));
    }
    Ok(())
}

async fn inserted_ticket_readable_for_update_in_same_snapshot<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
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
    let read = s
        .get_ticket_for_update(&mut snap, ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    if read != ticket {
        return Err(format!("read back {read:?}, inserted {ticket:?}"));
    }
    Ok(())
}

async fn duplicate_ticket_no_in_same_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_ticket(&mut snap, make_ticket("2025-09-0001"))
        .await
        .map_err(|e| e.to_string())?;
    let second = s.insert_ticket(&mut snap, make_ticket("2025-09-0001")).await;
    let _ = s.abort_snapshot(snap).await;
    match second {
        Err(StorageError::DuplicateTicketNo { ticket_no }) if ticket_no == "2025-09-0001" => Ok(()),
        other => Err(format!("expected DuplicateTicketNo, got {other:?}")),
    }
}

/// Two snapshots both allocate the same number; the second commit must fail.
async fn duplicate_ticket_no_across_snapshots_fails_at_commit<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap1 = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut snap2 = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_ticket(&mut snap1, make_ticket("2025-09-0001"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_ticket(&mut snap2, make_ticket("2025-09-0001"))
        .await
        .map_err(|e| format!("second snapshot should not see the first yet: {e}"))?;
    s.commit_snapshot(snap1).await.map_err(|e| e.to_string())?;
    match s.commit_snapshot(snap2).await {
        Err(StorageError::DuplicateTicketNo { .. }) => {}
        other => return Err(format!("expected DuplicateTicketNo at commit, got {other:?}")),
    }
    let all = s
        .list_tickets(&Default::default())
        .await
        .map_err(|e| e.to_string())?;
    if all.len() != 1 {
        return Err(format!("expected 1 ticket, found {}", all.len()));
    }
    Ok(())
}

async fn max_ticket_sequence_none_for_empty_period<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_ticket(&s, "2025-08-0004").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let max = s
        .max_ticket_sequence(&mut snap, "2025-09-")
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    match max {
        None => Ok(()),
        Some(n) => Err(format!("expected None, got {n}")),
    }
}

async fn max_ticket_sequence_scoped_to_prefix<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_ticket(&s, "2025-09-0001").await?;
    seed_ticket(&s, "2025-09-0007").await?;
    seed_ticket(&s, "2025-10-0003").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let sept = s
        .max_ticket_sequence(&mut snap, "2025-09-")
        .await
        .map_err(|e| e.to_string())?;
    let oct = s
        .max_ticket_sequence(&mut snap, "2025-10-")
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    if sept != Some(7) {
        return Err(format!("expected Some(7) for 2025-09, got {sept:?}"));
    }
    if oct != Some(3) {
        return Err(format!("expected Some(3) for 2025-10, got {oct:?}"));
    }
    Ok(())
}

async fn max_ticket_sequence_sees_own_insert<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_ticket(&mut snap, make_ticket("2025-09-0001"))
        .await
        .map_err(|e| e.to_string())?;
    let max = s
        .max_ticket_sequence(&mut snap, "2025-09-")
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    if max != Some(1) {
        return Err(format!("expected Some(1), got {max:?}"));
    }
    Ok(())
}

// ── Targets and documents ───────────────────────────────────────────────────

async fn duplicate_target_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_target(&mut snap, make_target(5, 1))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.insert_target(&mut snap, make_target(5, 1)).await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::DuplicateTarget {
            employee_id: 5,
            plan_id: 1,
        }) => Ok(()),
        other => Err(format!("expected DuplicateTarget, got {other:?}")),
    }
}

async fn insert_document_starts_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let doc = s
        .insert_document(&mut snap, make_document(5))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    let stored = s.get_document(doc.id).await.map_err(|e| e.to_string())?;
    if stored.version != 0 || stored.status != "New Target" {
        return Err(format!("unexpected stored document {stored:?}"));
    }
    Ok(())
}
