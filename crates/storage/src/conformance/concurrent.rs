//! Concurrent conformance tests.
//!
//! Real task races against a shared storage instance. The sequential tests
//! elsewhere interleave snapshots by hand; these let the runtime pick the
//! interleaving.

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;

use super::{make_patch, make_ticket, seed_document, seed_ticket, TestResult};
use crate::{Rater, StorageError, WorkflowStorage};

const RACERS: usize = 8;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "same_ticket_no_has_one_winner",
        same_ticket_no_has_one_winner(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "same_version_update_has_one_winner",
        same_version_update_has_one_winner(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "disjoint_rater_patches_all_land",
        disjoint_rater_patches_all_land(factory).await,
    ));

    results
}

async fn same_ticket_no_has_one_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = Arc::new(factory().await);
    let mut handles = Vec::with_capacity(RACERS);
    for _ in 0..RACERS {
        let s = Arc::clone(&s);
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            s.insert_ticket(&mut snap, make_ticket("2025-09-0001")).await?;
            tokio::task::yield_now().await;
            s.commit_snapshot(snap).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.map_err(|e| format!("task panicked: {e}"))? {
            Ok(()) => winners += 1,
            Err(StorageError::DuplicateTicketNo { .. }) => {}
            Err(other) => return Err(format!("unexpected error: {other}")),
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    let all = s
        .list_tickets(&Default::default())
        .await
        .map_err(|e| e.to_string())?;
    if all.len() != 1 {
        return Err(format!("expected 1 stored ticket, found {}", all.len()));
    }
    Ok(())
}

async fn same_version_update_has_one_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = Arc::new(factory().await);
    let ticket = seed_ticket(s.as_ref(), "2025-09-0001").await?;

    let mut handles = Vec::with_capacity(RACERS);
    for i in 0..RACERS {
        let s = Arc::clone(&s);
        let id = ticket.id;
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let mut row = s.get_ticket_for_update(&mut snap, id).await?;
            let version = row.version;
            row.action_taken = Some(format!("racer {i}"));
            tokio::task::yield_now().await;
            s.update_ticket(&mut snap, version, row).await?;
            s.commit_snapshot(snap).await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.map_err(|e| format!("task panicked: {e}"))? {
            Ok(()) => winners += 1,
            Err(StorageError::ConcurrentConflict { .. }) => conflicts += 1,
            Err(other) => return Err(format!("unexpected error: {other}")),
        }
    }
    // A racer that began after an earlier commit legitimately wins too;
    // every win must bump the version exactly once.
    let stored = s.get_ticket(ticket.id).await.map_err(|e| e.to_string())?;
    if winners == 0 || stored.version != winners {
        return Err(format!(
            "{winners} winners, {conflicts} conflicts, stored version {}",
            stored.version
        ));
    }
    Ok(())
}

async fn disjoint_rater_patches_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = Arc::new(factory().await);
    let plans: Vec<i64> = (1..=4).collect();
    let doc = seed_document(s.as_ref(), 5, &plans).await?;

    let mut handles = Vec::new();
    for plan_id in plans.clone() {
        for (rater, score) in [(Rater::Employee, 4), (Rater::Supervisor, 3)] {
            let s = Arc::clone(&s);
            let doc_id = doc.id;
            handles.push(tokio::spawn(async move {
                let mut snap = s.begin_snapshot().await?;
                tokio::task::yield_now().await;
                s.patch_rating(
                    &mut snap,
                    doc_id,
                    plan_id,
                    make_patch(rater, score, score, score, Decimal::from(score)),
                )
                .await?;
                s.commit_snapshot(snap).await
            }));
        }
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panicked: {e}"))?
            .map_err(|e| format!("rating patch failed: {e}"))?;
    }

    for row in s
        .list_associations(doc.id)
        .await
        .map_err(|e| e.to_string())?
    {
        if row.self_average != Some(Decimal::from(4)) || row.sup_average != Some(Decimal::from(3)) {
            return Err(format!(
                "plan {} lost a rating: self {:?} sup {:?}",
                row.plan_id, row.self_average, row.sup_average
            ));
        }
    }
    Ok(())
}
