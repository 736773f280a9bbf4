//! Rating association conformance tests.
//!
//! The employee and supervisor write disjoint column groups of the same row.
//! Neither may clobber the other, whatever order or interleaving they use.

use std::future::Future;

use rust_decimal::Decimal;

use super::{make_patch, seed_document, TestResult};
use crate::{Rater, StorageError, WorkflowStorage};

pub(super) async fn run_rating_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "rating",
        "self_then_supervisor_keeps_both",
        self_then_supervisor_keeps_both(factory).await,
    ));
    results.push(TestResult::from_result(
        "rating",
        "supervisor_then_self_keeps_both",
        supervisor_then_self_keeps_both(factory).await,
    ));
    results.push(TestResult::from_result(
        "rating",
        "interleaved_snapshots_keep_both",
        interleaved_snapshots_keep_both(factory).await,
    ));
    results.push(TestResult::from_result(
        "rating",
        "shared_fields_untouched_when_absent",
        shared_fields_untouched_when_absent(factory).await,
    ));
    results.push(TestResult::from_result(
        "rating",
        "duplicate_association_rejected",
        duplicate_association_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "rating",
        "reassociated_plan_starts_empty",
        reassociated_plan_starts_empty(factory).await,
    ));
    results.push(TestResult::from_result(
        "rating",
        "asserting_raters_both_commit",
        asserting_raters_both_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "rating",
        "document_update_invalidates_rating",
        document_update_invalidates_rating(factory).await,
    ));

    results
}

async fn patch_once<S: WorkflowStorage>(
    s: &S,
    document_id: i64,
    plan_id: i64,
    patch: crate::RatingPatch,
) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.patch_rating(&mut snap, document_id, plan_id, patch)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}

fn check_both(row: &crate::AssociationRecord) -> Result<(), String> {
    if row.self_average != Some(Decimal::from(4)) {
        return Err(format!("self average lost: {:?}", row.self_average));
    }
    if row.sup_average != Some(Decimal::from(3)) {
        return Err(format!("supervisor average lost: {:?}", row.sup_average));
    }
    Ok(())
}

async fn self_then_supervisor_keeps_both<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;
    patch_once(&s, doc.id, 1, make_patch(Rater::Employee, 4, 4, 4, Decimal::from(4))).await?;
    patch_once(&s, doc.id, 1, make_patch(Rater::Supervisor, 3, 3, 3, Decimal::from(3))).await?;
    let row = s.get_association(doc.id, 1).await.map_err(|e| e.to_string())?;
    check_both(&row)
}

async fn supervisor_then_self_keeps_both<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;
    patch_once(&s, doc.id, 1, make_patch(Rater::Supervisor, 3, 3, 3, Decimal::from(3))).await?;
    patch_once(&s, doc.id, 1, make_patch(Rater::Employee, 4, 4, 4, Decimal::from(4))).await?;
    let row = s.get_association(doc.id, 1).await.map_err(|e| e.to_string())?;
    check_both(&row)
}

/// Both raters open snapshots against the same empty row before either
/// commits. Full-row writes would lose one side.
async fn interleaved_snapshots_keep_both<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;

    let mut employee = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut supervisor = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.patch_rating(
        &mut employee,
        doc.id,
        1,
        make_patch(Rater::Employee, 4, 4, 4, Decimal::from(4)),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.patch_rating(
        &mut supervisor,
        doc.id,
        1,
        make_patch(Rater::Supervisor, 3, 3, 3, Decimal::from(3)),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(supervisor)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(employee)
        .await
        .map_err(|e| e.to_string())?;

    let row = s.get_association(doc.id, 1).await.map_err(|e| e.to_string())?;
    check_both(&row)
}

async fn shared_fields_untouched_when_absent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;

    let mut with_text = make_patch(Rater::Employee, 4, 4, 4, Decimal::from(4));
    with_text.accomplishment = Some("Closed 40 tickets".to_string());
    with_text.mov_link = Some("https://drive.example.org/mov/1".to_string());
    patch_once(&s, doc.id, 1, with_text).await?;

    // Supervisor rates without touching the shared text.
    patch_once(&s, doc.id, 1, make_patch(Rater::Supervisor, 3, 3, 3, Decimal::from(3))).await?;

    let row = s.get_association(doc.id, 1).await.map_err(|e| e.to_string())?;
    if row.accomplishment.as_deref() != Some("Closed 40 tickets") {
        return Err(format!("accomplishment overwritten: {:?}", row.accomplishment));
    }
    if row.mov_link.as_deref() != Some("https://drive.example.org/mov/1") {
        return Err(format!("mov_link overwritten: {:?}", row.mov_link));
    }
    check_both(&row)
}

async fn duplicate_association_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .insert_association(&mut snap, doc.id, 1, "2025-09-02T00:00:00Z")
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::DuplicateAssociation { plan_id: 1, .. }) => Ok(()),
        other => Err(format!("expected DuplicateAssociation, got {other:?}")),
    }
}

async fn reassociated_plan_starts_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;
    patch_once(&s, doc.id, 1, make_patch(Rater::Employee, 4, 4, 4, Decimal::from(4))).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_association(&mut snap, doc.id, 1)
        .await
        .map_err(|e| e.to_string())?;
    s.insert_association(&mut snap, doc.id, 1, "2025-09-03T00:00:00Z")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let row = s.get_association(doc.id, 1).await.map_err(|e| e.to_string())?;
    if row.self_average.is_some() {
        return Err("re-created association carried old ratings".to_string());
    }
    Ok(())
}

/// Two raters pin the same document version. Neither bumps it, so both land.
async fn asserting_raters_both_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;

    let mut employee = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut supervisor = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for (snap, patch) in [
        (&mut employee, make_patch(Rater::Employee, 4, 4, 4, Decimal::from(4))),
        (&mut supervisor, make_patch(Rater::Supervisor, 3, 3, 3, Decimal::from(3))),
    ] {
        s.assert_document_version(snap, doc.id, doc.version)
            .await
            .map_err(|e| e.to_string())?;
        s.patch_rating(snap, doc.id, 1, patch)
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(employee)
        .await
        .map_err(|e| format!("employee commit: {e}"))?;
    s.commit_snapshot(supervisor)
        .await
        .map_err(|e| format!("supervisor commit: {e}"))?;

    let stored = s.get_document(doc.id).await.map_err(|e| e.to_string())?;
    if stored.version != doc.version {
        return Err(format!(
            "assertion bumped the version: {} -> {}",
            doc.version, stored.version
        ));
    }
    let row = s.get_association(doc.id, 1).await.map_err(|e| e.to_string())?;
    check_both(&row)
}

/// A document update committed between a rater's read and its commit makes
/// the rating commit fail and leaves the row untouched.
async fn document_update_invalidates_rating<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doc = seed_document(&s, 5, &[1]).await?;

    let mut rater = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let seen = s
        .get_document_for_update(&mut rater, doc.id)
        .await
        .map_err(|e| e.to_string())?;
    s.assert_document_version(&mut rater, doc.id, seen.version)
        .await
        .map_err(|e| e.to_string())?;
    s.patch_rating(
        &mut rater,
        doc.id,
        1,
        make_patch(Rater::Supervisor, 3, 3, 3, Decimal::from(3)),
    )
    .await
    .map_err(|e| e.to_string())?;

    let mut closer = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut closed = s
        .get_document_for_update(&mut closer, doc.id)
        .await
        .map_err(|e| e.to_string())?;
    closed.status = "Rated & For PMT Review".to_string();
    s.update_document(&mut closer, closed.version, closed)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(closer).await.map_err(|e| e.to_string())?;

    match s.commit_snapshot(rater).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
    let row = s.get_association(doc.id, 1).await.map_err(|e| e.to_string())?;
    if row.sup_average.is_some() {
        return Err(format!("rating landed on a closed document: {:?}", row.sup_average));
    }
    Ok(())
}
