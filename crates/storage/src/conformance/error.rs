use std::future::Future;

use super::{make_event, seed_document, TestResult};
use crate::{Rater, StorageError, WorkflowStorage};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_ticket_nonexistent",
        get_ticket_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_ticket_for_update_nonexistent",
        get_ticket_for_update_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "event_for_nonexistent_ticket",
        event_for_nonexistent_ticket(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_target_nonexistent",
        get_target_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_document_nonexistent",
        get_document_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "association_for_nonexistent_document",
        association_for_nonexistent_document(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "patch_rating_unassociated_plan",
        patch_rating_unassociated_plan(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "delete_unassociated_plan",
        delete_unassociated_plan(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_queries_empty_on_fresh_store",
        list_queries_empty_on_fresh_store(factory).await,
    ));

    results
}

fn expect_not_found<T: std::fmt::Debug>(
    result: Result<T, StorageError>,
    table: &str,
) -> Result<(), String> {
    match result {
        Err(StorageError::NotFound { table: t, .. }) if t == table => Ok(()),
        other => Err(format!("expected NotFound on {table}, got {other:?}")),
    }
}

async fn get_ticket_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(s.get_ticket(999).await, "ticket")
}

async fn get_ticket_for_update_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.get_ticket_for_update(&mut snap, 999).await;
    let _ = s.abort_snapshot(snap).await;
    expect_not_found(result, "ticket")
}

async fn event_for_nonexistent_ticket<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .insert_ticket_event(&mut snap, make_event(999, "Completed", "2025-09-01T00:00:00Z"))
        .await;
    let _ = s.abort_snapshot(snap).await;
    expect_not_found(result, "ticket")
}

async fn get_target_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(s.get_target(999).await, "target")
}

async fn get_document_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(s.get_document(999).await, "document")
}

async fn association_for_nonexistent_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .insert_association(&mut snap, 999, 1, "2025-09-01T00:00:00Z")
        .await;
    let _ = s.abort_snapshot(snap).await;
    expect_not_found(result, "document")
}

async fn patch_rating_unassociated_plan<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .patch_rating(
            &mut snap,
            doc.id,
            2,
            super::make_patch(Rater::Employee, 3, 4, 5, rust_decimal::Decimal::from(4)),
        )
        .await;
    let _ = s.abort_snapshot(snap).await;
    expect_not_found(result, "association")
}

async fn delete_unassociated_plan<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.delete_association(&mut snap, doc.id, 2).await;
    let _ = s.abort_snapshot(snap).await;
    expect_not_found(result, "association")
}

async fn list_queries_empty_on_fresh_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let tickets = s
        .list_tickets(&Default::default())
        .await
        .map_err(|e| e.to_string())?;
    let events = s.list_ticket_events(1).await.map_err(|e| e.to_string())?;
    let targets = s
        .list_targets(&Default::default())
        .await
        .map_err(|e| e.to_string())?;
    let docs = s
        .list_documents(&Default::default())
        .await
        .map_err(|e| e.to_string())?;
    let assocs = s.list_associations(1).await.map_err(|e| e.to_string())?;
    if !(tickets.is_empty()
        && events.is_empty()
        && targets.is_empty()
        && docs.is_empty()
        && assocs.is_empty())
    {
        return Err("fresh store returned rows".to_string());
    }
    Ok(())
}
