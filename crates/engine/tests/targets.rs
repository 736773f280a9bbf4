//! Direct target workflow integration tests.

mod support;

use officeflow_engine::{AccomplishmentReport, Dimensions, TargetStatus, WorkflowError};
use support::*;

fn status(target: &officeflow_storage::TargetRecord) -> TargetStatus {
    target.status.parse().unwrap()
}

fn report(q: &str, e: &str, t: &str) -> AccomplishmentReport {
    AccomplishmentReport {
        accomplishment: "Closed 212 helpdesk tickets".to_string(),
        mov_link: Some("https://drive.example.org/mov/212".to_string()),
        ratings: Dimensions::new(dec(q), dec(e), dec(t)),
    }
}

#[tokio::test]
async fn target_lifecycle_with_both_ratings() {
    let engine = engine();
    let target = engine
        .submit_target(&ana(), 1, "Close 200 tickets this semester")
        .await
        .unwrap();
    assert_eq!(status(&target), TargetStatus::Submitted);
    assert!(target.target_submitted_at.is_some());

    let target = engine.approve_target(&ben(), target.id).await.unwrap();
    assert_eq!(status(&target), TargetStatus::Approved);
    assert!(target.target_reviewed_at.is_some());

    let target = engine
        .submit_accomplishment(&ana(), target.id, report("80", "90", "70"))
        .await
        .unwrap();
    assert_eq!(target.self_average, Some(dec("80.00")));
    assert!(target.accomplishment_submitted_at.is_some());

    let target = engine
        .review_accomplishment(&ben(), target.id, Dimensions::new(dec("90"), dec("85"), dec("95")))
        .await
        .unwrap();
    assert_eq!(target.supervisor_average, Some(dec("90.00")));
    // Self columns survive the supervisor's review.
    assert_eq!(target.self_average, Some(dec("80.00")));
    assert_eq!(target.self_quality, Some(dec("80")));
}

#[tokio::test]
async fn only_the_supervisor_reviews() {
    let engine = engine();
    let target = engine.submit_target(&ana(), 1, "Close 200 tickets").await.unwrap();
    let before = engine.storage().state().await;

    // Fe is a division chief, but not Ana's.
    assert_eq!(
        engine.approve_target(&fe(), target.id).await.unwrap_err(),
        WorkflowError::Authorization
    );
    // Employees never review.
    assert_eq!(
        engine.approve_target(&eli(), target.id).await.unwrap_err(),
        WorkflowError::Authorization
    );
    assert_eq!(engine.storage().state().await, before);
}

#[tokio::test]
async fn resubmitting_reopens_a_rejected_target() {
    let engine = engine();
    let target = engine.submit_target(&ana(), 2, "99% uptime").await.unwrap();
    let rejected = engine.reject_target(&ben(), target.id).await.unwrap();
    assert_eq!(status(&rejected), TargetStatus::Rejected);

    let again = engine.submit_target(&ana(), 2, "99.5% uptime").await.unwrap();
    assert_eq!(again.id, target.id);
    assert_eq!(again.target_text, "99.5% uptime");
    assert_eq!(status(&again), TargetStatus::Submitted);
}

#[tokio::test]
async fn drafts_cannot_overwrite_a_submitted_target() {
    let engine = engine();
    let draft = engine.draft_target(&ana(), 3, "Draft ICT plan").await.unwrap();
    assert_eq!(status(&draft), TargetStatus::Draft);
    assert_eq!(draft.target_submitted_at, None);

    engine.submit_target(&ana(), 3, "Draft ICT plan").await.unwrap();
    let err = engine.draft_target(&ana(), 3, "Changed my mind").await.unwrap_err();
    assert!(matches!(err, WorkflowError::State { .. }), "{err:?}");
}

#[tokio::test]
async fn accomplishment_needs_an_approved_target() {
    let engine = engine();
    let target = engine.submit_target(&ana(), 1, "Close 200 tickets").await.unwrap();
    let err = engine
        .submit_accomplishment(&ana(), target.id, report("80", "90", "70"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State { .. }), "{err:?}");

    engine.approve_target(&ben(), target.id).await.unwrap();
    // Someone else's target.
    assert_eq!(
        engine
            .submit_accomplishment(&eli(), target.id, report("80", "90", "70"))
            .await
            .unwrap_err(),
        WorkflowError::Authorization
    );
}

#[tokio::test]
async fn ratings_are_checked_against_the_scale() {
    let engine = engine();
    let target = engine.submit_target(&ana(), 1, "Close 200 tickets").await.unwrap();
    engine.approve_target(&ben(), target.id).await.unwrap();

    let mut bad = report("101", "90", "70");
    bad.ratings.timeliness = None;
    bad.mov_link = Some("not a link".to_string());
    match engine.submit_accomplishment(&ana(), target.id, bad).await {
        Err(WorkflowError::Validation(fields)) => {
            let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(names, ["mov_link", "self_quality", "self_timeliness"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_plan_is_a_validation_error() {
    let engine = engine();
    let err = engine.submit_target(&ana(), 99, "Whatever").await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "{err:?}");
}

#[tokio::test]
async fn pending_targets_lists_subordinates_only() {
    let engine = engine();
    engine.submit_target(&ana(), 1, "Close 200 tickets").await.unwrap();
    engine.draft_target(&ana(), 2, "Uptime").await.unwrap();
    engine.submit_target(&eli(), 4, "Inventory").await.unwrap();

    let pending = engine.pending_targets(&ben()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].employee_id, 1);
    assert_eq!(pending[0].plan_id, 1);

    let pending = engine.pending_targets(&fe()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].employee_id, 5);
}

#[tokio::test]
async fn pending_accomplishments_wait_for_the_supervisor_rating() {
    let engine = engine();
    let reported = engine.submit_target(&ana(), 1, "Close 200 tickets").await.unwrap();
    let quiet = engine.submit_target(&ana(), 2, "Uptime").await.unwrap();
    engine.submit_target(&ana(), 3, "ICT plan").await.unwrap();
    for id in [reported.id, quiet.id] {
        engine.approve_target(&ben(), id).await.unwrap();
    }
    engine
        .submit_accomplishment(&ana(), reported.id, report("80", "90", "70"))
        .await
        .unwrap();

    let pending = engine.pending_accomplishments(&ben()).await.unwrap();
    assert_eq!(pending.iter().map(|t| t.id).collect::<Vec<_>>(), vec![reported.id]);
    assert!(engine.pending_accomplishments(&fe()).await.unwrap().is_empty());
    assert_eq!(
        engine.pending_accomplishments(&ana()).await.unwrap_err(),
        WorkflowError::Authorization
    );

    engine
        .review_accomplishment(
            &ben(),
            reported.id,
            Dimensions::new(dec("90"), dec("85"), dec("95")),
        )
        .await
        .unwrap();
    assert!(engine.pending_accomplishments(&ben()).await.unwrap().is_empty());
}

#[tokio::test]
async fn targets_lists_only_the_callers_own() {
    let engine = engine();
    engine.submit_target(&ana(), 1, "Close 200 tickets").await.unwrap();
    engine.draft_target(&ana(), 2, "Uptime").await.unwrap();
    engine.submit_target(&eli(), 4, "Inventory").await.unwrap();

    let mine = engine.targets(&ana()).await.unwrap();
    assert_eq!(mine.iter().map(|t| t.plan_id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(status(&mine[1]), TargetStatus::Draft);

    let theirs = engine.targets(&eli()).await.unwrap();
    assert_eq!(theirs.len(), 1);
    assert_eq!(theirs[0].plan_id, 4);
    assert!(engine.targets(&dan()).await.unwrap().is_empty());
}

#[tokio::test]
async fn targets_are_limited_to_assigned_personnel() {
    let engine = engine();
    // Plan 1 is assigned to Ana only.
    match engine.submit_target(&eli(), 1, "Close tickets").await.unwrap_err() {
        WorkflowError::Validation(fields) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "plan_id");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(engine.storage().state().await.targets.is_empty());
}
