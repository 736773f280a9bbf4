//! Ticket workflow integration tests against the in-memory backend.

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use officeflow_engine::{
    Decision, EngineConfig, MisUpdate, TicketScope, TicketStatus, WorkflowError,
};
use officeflow_storage::WorkflowStorage;
use support::*;
use time::macros::datetime;

fn status(ticket: &officeflow_storage::TicketRecord) -> TicketStatus {
    ticket.status.parse().unwrap()
}

async fn event_count(engine: &TestEngine, ticket_id: i64) -> usize {
    engine
        .ticket_history(&carla(), ticket_id)
        .await
        .unwrap()
        .events
        .len()
}

async fn in_progress(engine: &TestEngine) -> i64 {
    let ticket = engine.create_ticket(&ana(), printer_request()).await.unwrap();
    engine
        .division_chief_action(&ben(), ticket.id, Decision::Approve)
        .await
        .unwrap();
    engine
        .ocd_action(&dan(), ticket.id, Decision::Approve)
        .await
        .unwrap();
    ticket.id
}

#[tokio::test]
async fn full_walk_writes_one_event_per_step() {
    let engine = engine();
    let ticket = engine.create_ticket(&ana(), printer_request()).await.unwrap();
    assert_eq!(ticket.ticket_no, "2025-09-0001");
    assert_eq!(status(&ticket), TicketStatus::PendingDivisionChiefApproval);

    let t = engine
        .division_chief_action(&ben(), ticket.id, Decision::Approve)
        .await
        .unwrap();
    assert_eq!(status(&t), TicketStatus::PendingOcdApproval);
    assert!(t.dc_approval_date.is_some());

    let t = engine.ocd_action(&dan(), ticket.id, Decision::Approve).await.unwrap();
    assert_eq!(status(&t), TicketStatus::InProgress);
    assert!(t.ocd_approval_date.is_some());

    let t = engine
        .mis_update(
            &carla(),
            ticket.id,
            MisUpdate {
                assessment: "Worn pickup roller".to_string(),
                expected_completion: Some("2025-09-20".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(status(&t), TicketStatus::MisAssessed);
    assert_eq!(t.attended_by.as_deref(), Some("Carla Diaz"));

    let t = engine
        .mis_update(
            &carla(),
            ticket.id,
            MisUpdate {
                assessment: "Worn pickup roller".to_string(),
                action_taken: Some("Replaced roller".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(status(&t), TicketStatus::ActedByMis);
    assert_eq!(t.expected_completion_date.as_deref(), Some("2025-09-20"));

    let t = engine.complete_ticket(&carla(), ticket.id).await.unwrap();
    assert_eq!(status(&t), TicketStatus::Completed);
    assert!(t.completed_at.is_some());

    let history = engine.ticket_history(&ana(), ticket.id).await.unwrap();
    let labels: Vec<_> = history.events.iter().map(|e| e.status_label.as_str()).collect();
    assert_eq!(
        labels,
        [
            "Submitted IT Job Request",
            "Division Chief Approved",
            "OCD Approved",
            "MIS Assessed the Request",
            "Acted by MIS",
            "Completed",
        ]
    );
    assert!(history.events[3].remarks.starts_with("Assessment: Worn pickup roller\n"));
}

#[tokio::test]
async fn numbers_are_sequential_and_restart_each_month() {
    let clock = ManualClock::at(datetime!(2025-09-30 12:00 UTC));
    let engine = engine_with(EngineConfig::default(), clock.clone());

    let a = engine.create_ticket(&ana(), printer_request()).await.unwrap();
    let b = engine.create_ticket(&eli(), printer_request()).await.unwrap();
    assert_eq!(a.ticket_no, "2025-09-0001");
    assert_eq!(b.ticket_no, "2025-09-0002");

    // 16:00 UTC is already October at UTC+8.
    clock.set(datetime!(2025-09-30 16:00 UTC));
    let c = engine.create_ticket(&ana(), printer_request()).await.unwrap();
    assert_eq!(c.ticket_no, "2025-10-0001");
}

#[tokio::test]
async fn illegal_transition_changes_nothing() {
    let engine = engine();
    let ticket = engine.create_ticket(&ana(), printer_request()).await.unwrap();

    let err = engine.complete_ticket(&carla(), ticket.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::State { .. }), "{err:?}");
    let err = engine
        .ocd_action(&dan(), ticket.id, Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State { .. }), "{err:?}");

    let stored = engine.storage().get_ticket(ticket.id).await.unwrap();
    assert_eq!(stored, ticket);
    assert_eq!(event_count(&engine, ticket.id).await, 1);
}

#[tokio::test]
async fn rejections_are_terminal() {
    let engine = engine();
    let ticket = engine.create_ticket(&ana(), printer_request()).await.unwrap();
    let t = engine
        .division_chief_action(&ben(), ticket.id, Decision::Reject)
        .await
        .unwrap();
    assert_eq!(status(&t), TicketStatus::RejectedByDivisionChief);

    let err = engine
        .division_chief_action(&ben(), ticket.id, Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State { .. }));
    assert_eq!(event_count(&engine, ticket.id).await, 2);
}

#[tokio::test]
async fn unauthorized_calls_mutate_nothing() {
    let engine = engine();
    let ticket = engine.create_ticket(&ana(), printer_request()).await.unwrap();
    let before = engine.storage().state().await;

    // Wrong role.
    let err = engine
        .division_chief_action(&ana(), ticket.id, Decision::Approve)
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::Authorization);
    // Right role, not the named chief.
    let err = engine
        .division_chief_action(&fe(), ticket.id, Decision::Approve)
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::Authorization);
    let err = engine.complete_ticket(&dan(), ticket.id).await.unwrap_err();
    assert_eq!(err, WorkflowError::Authorization);
    let err = engine
        .mis_update(
            &ben(),
            ticket.id,
            MisUpdate {
                assessment: "x".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::Authorization);

    assert_eq!(engine.storage().state().await, before);
}

#[tokio::test]
async fn mis_status_follows_action_or_completion() {
    let engine = engine();
    let id = in_progress(&engine).await;
    let t = engine
        .mis_update(
            &carla(),
            id,
            MisUpdate {
                assessment: "Replace unit".to_string(),
                completed_at: Some("2025-09-16".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(status(&t), TicketStatus::ActedByMis);
    assert_eq!(t.completed_at.as_deref(), Some("2025-09-16"));

    // Acted never falls back to assessed.
    let err = engine
        .mis_update(
            &carla(),
            id,
            MisUpdate {
                assessment: "Re-assessed".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State { .. }));

    // Closing out keeps the date MIS recorded.
    let t = engine.complete_ticket(&carla(), id).await.unwrap();
    assert_eq!(status(&t), TicketStatus::Completed);
    assert_eq!(t.completed_at.as_deref(), Some("2025-09-16"));
}

#[tokio::test]
async fn invalid_request_reports_every_field() {
    let engine = engine();
    let mut request = printer_request();
    request.title = "t".repeat(256);
    request.category = " ".to_string();
    match engine.create_ticket(&ana(), request).await {
        Err(WorkflowError::Validation(fields)) => {
            let names: BTreeSet<_> = fields.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(names, BTreeSet::from(["category", "title"]));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(engine.storage().state().await.tickets.is_empty());
}

#[tokio::test]
async fn listing_and_queues() {
    let engine = engine();
    let mine = engine.create_ticket(&ana(), printer_request()).await.unwrap();
    let mut other = printer_request();
    other.division_chief_name = "Fe Lim".to_string();
    engine.create_ticket(&eli(), other).await.unwrap();

    let own = engine.list_tickets(&ana(), TicketScope::Own).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].id, mine.id);
    assert_eq!(
        engine.list_tickets(&ana(), TicketScope::All).await.unwrap_err(),
        WorkflowError::Authorization
    );
    assert_eq!(engine.list_tickets(&carla(), TicketScope::All).await.unwrap().len(), 2);

    let queue = engine.pending_division_chief(&ben()).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, mine.id);
    assert!(engine.pending_ocd(&dan()).await.unwrap().is_empty());

    engine
        .division_chief_action(&ben(), mine.id, Decision::Approve)
        .await
        .unwrap();
    assert_eq!(engine.pending_ocd(&dan()).await.unwrap().len(), 1);

    // Only involved parties see the trail.
    assert_eq!(
        engine.ticket_history(&eli(), mine.id).await.unwrap_err(),
        WorkflowError::Authorization
    );
    assert_eq!(
        engine.ticket_history(&fe(), mine.id).await.unwrap_err(),
        WorkflowError::Authorization
    );
    assert!(engine.ticket_history(&ben(), mine.id).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_distinct_numbers() {
    const RACERS: u32 = 8;
    let config = EngineConfig {
        allocation_retries: RACERS,
        ..Default::default()
    };
    let engine = Arc::new(engine_with(
        config,
        ManualClock::at(datetime!(2025-09-15 10:00 UTC)),
    ));

    let mut handles = Vec::new();
    for _ in 0..RACERS {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.create_ticket(&ana(), printer_request()).await
        }));
    }
    let mut numbers = BTreeSet::new();
    for handle in handles {
        let ticket = handle.await.unwrap().unwrap();
        assert!(numbers.insert(ticket.ticket_no));
    }
    let expected: BTreeSet<_> = (1..=RACERS).map(|n| format!("2025-09-{n:04}")).collect();
    assert_eq!(numbers, expected);
}
