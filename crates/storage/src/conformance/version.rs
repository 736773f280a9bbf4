//! Optimistic concurrency conformance tests.
//!
//! Every `update_*` carries the version the caller read. A stale version must
//! surface as `ConcurrentConflict`, either immediately or at commit.

use std::future::Future;

use super::{make_document, make_target, seed_ticket, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "stale_ticket_version_in_same_snapshot",
        stale_ticket_version_in_same_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_ticket_version_across_snapshots",
        stale_ticket_version_across_snapshots(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_target_version_across_snapshots",
        stale_target_version_across_snapshots(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_document_version_across_snapshots",
        stale_document_version_across_snapshots(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_leaves_winner_intact",
        conflict_leaves_winner_intact(factory).await,
    ));

    results
}

fn expect_conflict(result: Result<(), StorageError>, table: &str) -> Result<(), String> {
    match result {
        Err(StorageError::ConcurrentConflict { table: t, .. }) if t == table => Ok(()),
        other => Err(format!("expected ConcurrentConflict on {table}, got {other:?}")),
    }
}

async fn stale_ticket_version_in_same_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.update_ticket(&mut snap, 5, ticket).await.map(|_| ());
    let _ = s.abort_snapshot(snap).await;
    expect_conflict(result, "ticket")
}

/// Two snapshots read version 0; the first commit wins and the second
/// commit conflicts.
async fn stale_ticket_version_across_snapshots<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;

    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;

    let mut a = s
        .get_ticket_for_update(&mut first, ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    let mut b = s
        .get_ticket_for_update(&mut second, ticket.id)
        .await
        .map_err(|e| e.to_string())?;
    a.status = "Pending OCD Approval".to_string();
    b.status = "Rejected by Division Chief".to_string();

    s.update_ticket(&mut first, a.version, a)
        .await
        .map_err(|e| e.to_string())?;
    s.update_ticket(&mut second, b.version, b)
        .await
        .map_err(|e| e.to_string())?;

    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    expect_conflict(s.commit_snapshot(second).await, "ticket")
}

async fn stale_target_version_across_snapshots<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let target = s
        .insert_target(&mut snap, make_target(5, 1))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut a = s
        .get_target_for_update(&mut first, target.id)
        .await
        .map_err(|e| e.to_string())?;
    let mut b = s
        .get_target_for_update(&mut second, target.id)
        .await
        .map_err(|e| e.to_string())?;
    a.status = "approved".to_string();
    b.status = "rejected".to_string();
    s.update_target(&mut first, a.version, a)
        .await
        .map_err(|e| e.to_string())?;
    s.update_target(&mut second, b.version, b)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    expect_conflict(s.commit_snapshot(second).await, "target")
}

async fn stale_document_version_across_snapshots<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut a = s
        .get_document_for_update(&mut first, doc.id)
        .await
        .map_err(|e| e.to_string())?;
    let mut b = s
        .get_document_for_update(&mut second, doc.id)
        .await
        .map_err(|e| e.to_string())?;
    a.remarks = Some("first".to_string());
    b.remarks = Some("second".to_string());
    s.update_document(&mut first, a.version, a)
        .await
        .map_err(|e| e.to_string())?;
    s.update_document(&mut second, b.version, b)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    expect_conflict(s.commit_snapshot(second).await, "document")
}

async fn conflict_leaves_winner_intact<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ticket = seed_ticket(&s, "2025-09-0001").await?;

    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut a = ticket.clone();
    a.status = "Pending OCD Approval".to_string();
    let mut b = ticket.clone();
    b.status = "Rejected by Division Chief".to_string();
    s.update_ticket(&mut first, 0, a)
        .await
        .map_err(|e| e.to_string())?;
    s.update_ticket(&mut second, 0, b)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    let _ = s.commit_snapshot(second).await;

    let stored = s.get_ticket(ticket.id).await.map_err(|e| e.to_string())?;
    if stored.status != "Pending OCD Approval" || stored.version != 1 {
        return Err(format!(
            "expected winner at version 1, got {} at {}",
            stored.status, stored.version
        ));
    }
    Ok(())
}
