//! Snapshot isolation conformance tests.
//!
//! Verifies that uncommitted writes are invisible outside a snapshot,
//! committed writes are visible, and aborted or dropped writes are discarded.

use std::future::Future;

use super::{make_document, make_ticket, seed_ticket, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "commit_empty_snapshot_succeeds",
        commit_empty_snapshot_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_ticket_invisible_to_get",
        uncommitted_ticket_invisible_to_get(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_ticket_invisible_to_list",
        uncommitted_ticket_invisible_to_list(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_update_invisible",
        uncommitted_update_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "aborted_insert_discarded",
        aborted_insert_discarded(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "dropped_snapshot_discarded",
        dropped_snapshot_discarded(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_document_invisible",
        uncommitted_document_invisible(factory).await,
    ));

    results
}

async fn commit_empty_snapshot_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}

async fn uncommitted_ticket_invisible_to_get<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let outside = s.get_ticket(ticket.id).await;
    let _ = s.abort_snapshot(snap).await;
    match outside {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("uncommitted ticket visible: {other:?}")),
    }
}

async fn uncommitted_ticket_invisible_to_list<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let listed = s
        .list_tickets(&Default::default())
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    if !listed.is_empty() {
        return Err(format!("expected no tickets, listed {}", listed.len()));
    }
    Ok(())
}

async fn uncommitted_update_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut changed = s
        .get_ticket_for_update(&mut snap, ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    changed.status = "Pending OCD Approval".to_string();
    s.update_ticket(&mut snap, 0, changed)
        .await
        .map_err(|e| e.to_string())?;
    let outside = s.get_ticket(ticket.id).await.map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    if outside.status != ticket.status || outside.version != 0 {
        return Err(format!(
            "uncommitted update leaked: status {} version {}",
            outside.status, outside.version
        ));
    }
    Ok(())
}

async fn aborted_insert_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    match s.get_ticket(ticket.id).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("aborted ticket visible: {other:?}")),
    }
}

async fn dropped_snapshot_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.insert_ticket(&mut snap, make_ticket("2025-09-0001"))
            .await
            .map_err(|e| e.to_string())?
        // snapshot dropped here without commit
    };
    match s.get_ticket(ticket.id).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("dropped snapshot leaked a ticket: {other:?}")),
    }
}

async fn uncommitted_document_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.insert_association(&mut snap, doc.id, 1, "2025-09-01T00:00:00Z")
        .await
        .map_err(|e| e.to_string())?;
    let outside_doc = s.get_document(doc.id).await;
    let outside_assocs = s
        .list_associations(doc.id)
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    if outside_doc.is_ok() || !outside_assocs.is_empty() {
        return Err("uncommitted document or association visible".to_string());
    }
    Ok(())
}
