//! Replayable workflow requests and their replies.
//!
//! A requests file is a JSON array of objects tagged by `op`, each naming the
//! actor that performs it:
//!
//! ```json
//! [{"op": "create_ticket", "actor": {"id": 1, "name": "Ana", "role": "employee"},
//!   "category": "Hardware", "title": "...", "description": "...",
//!   "division_chief_name": "Ben", "assigned_to": "MIS"}]
//! ```

use std::fmt::Write as _;

use officeflow_engine::{
    AccomplishmentReport, Actor, AssociationMode, Decision, Dimensions, Directory, DocumentRequest,
    DocumentScope, DocumentScore, Engine, MisUpdate, RatingEntry, TicketHistory, TicketRequest,
    TicketScope, WorkflowError,
};
use officeflow_storage::{
    AssociationRecord, DocumentRecord, Rater, TargetRecord, TicketRecord, WorkflowStorage,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Request {
    // Tickets
    CreateTicket {
        actor: Actor,
        #[serde(flatten)]
        ticket: TicketRequest,
    },
    ListTickets {
        actor: Actor,
        #[serde(default = "own_tickets")]
        scope: TicketScope,
    },
    DivisionChiefAction {
        actor: Actor,
        ticket_id: i64,
        decision: Decision,
    },
    OcdAction {
        actor: Actor,
        ticket_id: i64,
        decision: Decision,
    },
    MisUpdate {
        actor: Actor,
        ticket_id: i64,
        #[serde(flatten)]
        update: MisUpdate,
    },
    CompleteTicket {
        actor: Actor,
        ticket_id: i64,
    },
    TicketHistory {
        actor: Actor,
        ticket_id: i64,
    },
    PendingDivisionChief {
        actor: Actor,
    },
    PendingOcd {
        actor: Actor,
    },

    // Direct targets
    SubmitTarget {
        actor: Actor,
        plan_id: i64,
        text: String,
    },
    DraftTarget {
        actor: Actor,
        plan_id: i64,
        text: String,
    },
    ApproveTarget {
        actor: Actor,
        target_id: i64,
    },
    RejectTarget {
        actor: Actor,
        target_id: i64,
    },
    SubmitAccomplishment {
        actor: Actor,
        target_id: i64,
        #[serde(flatten)]
        report: AccomplishmentReport,
    },
    ReviewAccomplishment {
        actor: Actor,
        target_id: i64,
        #[serde(flatten)]
        ratings: Dimensions,
    },
    PendingTargets {
        actor: Actor,
    },
    PendingAccomplishments {
        actor: Actor,
    },
    Targets {
        actor: Actor,
    },

    // Performance documents
    CreateDocument {
        actor: Actor,
        #[serde(flatten)]
        document: DocumentRequest,
    },
    SubmitForReview {
        actor: Actor,
        document_id: i64,
    },
    ApproveTargets {
        actor: Actor,
        document_id: i64,
    },
    SubmitForRating {
        actor: Actor,
        document_id: i64,
    },
    SaveRatings {
        actor: Actor,
        document_id: i64,
    },
    SaveComments {
        actor: Actor,
        document_id: i64,
        #[serde(default)]
        remarks: Option<String>,
    },
    Documents {
        actor: Actor,
        #[serde(default = "own_documents")]
        scope: DocumentScope,
    },
    AssociatePlans {
        actor: Actor,
        document_id: i64,
        plan_ids: Vec<i64>,
        #[serde(default = "add_mode")]
        mode: AssociationMode,
    },
    Associations {
        actor: Actor,
        document_id: i64,
    },
    RateDimension {
        actor: Actor,
        document_id: i64,
        plan_id: i64,
        rater: Rater,
        #[serde(flatten)]
        entry: RatingEntry,
    },
    DocumentScore {
        actor: Actor,
        document_id: i64,
    },
}

fn own_tickets() -> TicketScope {
    TicketScope::Own
}

fn own_documents() -> DocumentScope {
    DocumentScope::Own
}

fn add_mode() -> AssociationMode {
    AssociationMode::Add
}

impl Request {
    /// The `op` tag, for reporting.
    pub(crate) fn op(&self) -> &'static str {
        match self {
            Request::CreateTicket { .. } => "create_ticket",
            Request::ListTickets { .. } => "list_tickets",
            Request::DivisionChiefAction { .. } => "division_chief_action",
            Request::OcdAction { .. } => "ocd_action",
            Request::MisUpdate { .. } => "mis_update",
            Request::CompleteTicket { .. } => "complete_ticket",
            Request::TicketHistory { .. } => "ticket_history",
            Request::PendingDivisionChief { .. } => "pending_division_chief",
            Request::PendingOcd { .. } => "pending_ocd",
            Request::SubmitTarget { .. } => "submit_target",
            Request::DraftTarget { .. } => "draft_target",
            Request::ApproveTarget { .. } => "approve_target",
            Request::RejectTarget { .. } => "reject_target",
            Request::SubmitAccomplishment { .. } => "submit_accomplishment",
            Request::ReviewAccomplishment { .. } => "review_accomplishment",
            Request::PendingTargets { .. } => "pending_targets",
            Request::PendingAccomplishments { .. } => "pending_accomplishments",
            Request::Targets { .. } => "targets",
            Request::CreateDocument { .. } => "create_document",
            Request::SubmitForReview { .. } => "submit_for_review",
            Request::ApproveTargets { .. } => "approve_targets",
            Request::SubmitForRating { .. } => "submit_for_rating",
            Request::SaveRatings { .. } => "save_ratings",
            Request::SaveComments { .. } => "save_comments",
            Request::Documents { .. } => "documents",
            Request::AssociatePlans { .. } => "associate_plans",
            Request::Associations { .. } => "associations",
            Request::RateDimension { .. } => "rate_dimension",
            Request::DocumentScore { .. } => "document_score",
        }
    }

    pub(crate) async fn execute<S, D>(self, engine: &Engine<S, D>) -> Result<Reply, WorkflowError>
    where
        S: WorkflowStorage,
        D: Directory,
    {
        Ok(match self {
            Request::CreateTicket { actor, ticket } => {
                Reply::Ticket(engine.create_ticket(&actor, ticket).await?)
            }
            Request::ListTickets { actor, scope } => {
                Reply::Tickets(engine.list_tickets(&actor, scope).await?)
            }
            Request::DivisionChiefAction {
                actor,
                ticket_id,
                decision,
            } => Reply::Ticket(
                engine
                    .division_chief_action(&actor, ticket_id, decision)
                    .await?,
            ),
            Request::OcdAction {
                actor,
                ticket_id,
                decision,
            } => Reply::Ticket(engine.ocd_action(&actor, ticket_id, decision).await?),
            Request::MisUpdate {
                actor,
                ticket_id,
                update,
            } => Reply::Ticket(engine.mis_update(&actor, ticket_id, update).await?),
            Request::CompleteTicket { actor, ticket_id } => {
                Reply::Ticket(engine.complete_ticket(&actor, ticket_id).await?)
            }
            Request::TicketHistory { actor, ticket_id } => {
                Reply::History(engine.ticket_history(&actor, ticket_id).await?)
            }
            Request::PendingDivisionChief { actor } => {
                Reply::Tickets(engine.pending_division_chief(&actor).await?)
            }
            Request::PendingOcd { actor } => Reply::Tickets(engine.pending_ocd(&actor).await?),
            Request::SubmitTarget {
                actor,
                plan_id,
                text,
            } => Reply::Target(engine.submit_target(&actor, plan_id, &text).await?),
            Request::DraftTarget {
                actor,
                plan_id,
                text,
            } => Reply::Target(engine.draft_target(&actor, plan_id, &text).await?),
            Request::ApproveTarget { actor, target_id } => {
                Reply::Target(engine.approve_target(&actor, target_id).await?)
            }
            Request::RejectTarget { actor, target_id } => {
                Reply::Target(engine.reject_target(&actor, target_id).await?)
            }
            Request::SubmitAccomplishment {
                actor,
                target_id,
                report,
            } => Reply::Target(
                engine
                    .submit_accomplishment(&actor, target_id, report)
                    .await?,
            ),
            Request::ReviewAccomplishment {
                actor,
                target_id,
                ratings,
            } => Reply::Target(
                engine
                    .review_accomplishment(&actor, target_id, ratings)
                    .await?,
            ),
            Request::PendingTargets { actor } => {
                Reply::Targets(engine.pending_targets(&actor).await?)
            }
            Request::PendingAccomplishments { actor } => {
                Reply::Targets(engine.pending_accomplishments(&actor).await?)
            }
            Request::Targets { actor } => Reply::Targets(engine.targets(&actor).await?),
            Request::CreateDocument { actor, document } => {
                Reply::Document(engine.create_document(&actor, document).await?)
            }
            Request::SubmitForReview { actor, document_id } => {
                Reply::Document(engine.submit_for_review(&actor, document_id).await?)
            }
            Request::ApproveTargets { actor, document_id } => {
                Reply::Document(engine.approve_targets(&actor, document_id).await?)
            }
            Request::SubmitForRating { actor, document_id } => {
                Reply::Document(engine.submit_for_rating(&actor, document_id).await?)
            }
            Request::SaveRatings { actor, document_id } => {
                Reply::Document(engine.save_ratings(&actor, document_id).await?)
            }
            Request::SaveComments {
                actor,
                document_id,
                remarks,
            } => Reply::Document(engine.save_comments(&actor, document_id, remarks).await?),
            Request::Documents { actor, scope } => {
                Reply::Documents(engine.documents(&actor, scope).await?)
            }
            Request::AssociatePlans {
                actor,
                document_id,
                plan_ids,
                mode,
            } => Reply::Associations(
                engine
                    .associate_plans(&actor, document_id, &plan_ids, mode)
                    .await?,
            ),
            Request::Associations { actor, document_id } => {
                Reply::Associations(engine.associations(&actor, document_id).await?)
            }
            Request::RateDimension {
                actor,
                document_id,
                plan_id,
                rater,
                entry,
            } => Reply::Association(
                engine
                    .rate_dimension(&actor, document_id, plan_id, rater, entry)
                    .await?,
            ),
            Request::DocumentScore { actor, document_id } => {
                Reply::Score(engine.document_score(&actor, document_id).await?)
            }
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub(crate) enum Reply {
    Ticket(TicketRecord),
    Tickets(Vec<TicketRecord>),
    History(TicketHistory),
    Target(TargetRecord),
    Targets(Vec<TargetRecord>),
    Document(DocumentRecord),
    Documents(Vec<DocumentRecord>),
    Association(AssociationRecord),
    Associations(Vec<AssociationRecord>),
    Score(DocumentScore),
}

fn opt(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn ticket_line(t: &TicketRecord) -> String {
    format!("ticket {} (#{}) {}: {}", t.ticket_no, t.id, t.title, t.status)
}

fn target_line(t: &TargetRecord) -> String {
    format!(
        "target #{} employee {} plan {}: {} (self {}, supervisor {})",
        t.id,
        t.employee_id,
        t.plan_id,
        t.status,
        opt(t.self_average),
        opt(t.supervisor_average)
    )
}

fn document_line(d: &DocumentRecord) -> String {
    format!(
        "document #{} employee {} {} [{}]: {}",
        d.id, d.employee_id, d.title, d.rating_period, d.status
    )
}

fn association_line(a: &AssociationRecord) -> String {
    format!(
        "document #{} plan {}: self {}, supervisor {}",
        a.document_id,
        a.plan_id,
        opt(a.self_average),
        opt(a.sup_average)
    )
}

fn lines<T>(out: &mut String, items: &[T], line: fn(&T) -> String) {
    let _ = write!(out, "{} found", items.len());
    for item in items {
        let _ = write!(out, "\n  {}", line(item));
    }
}

impl Reply {
    /// Human-readable rendering for `--output text`.
    pub(crate) fn text(&self) -> String {
        let mut out = String::new();
        match self {
            Reply::Ticket(t) => out.push_str(&ticket_line(t)),
            Reply::Tickets(ts) => lines(&mut out, ts, ticket_line),
            Reply::History(h) => {
                out.push_str(&ticket_line(&h.ticket));
                for e in &h.events {
                    let _ = write!(
                        out,
                        "\n  {} {}: {}",
                        e.created_at,
                        e.status_label,
                        e.remarks.replace('\n', "; ")
                    );
                }
            }
            Reply::Target(t) => out.push_str(&target_line(t)),
            Reply::Targets(ts) => lines(&mut out, ts, target_line),
            Reply::Document(d) => out.push_str(&document_line(d)),
            Reply::Documents(ds) => lines(&mut out, ds, document_line),
            Reply::Association(a) => out.push_str(&association_line(a)),
            Reply::Associations(all) => lines(&mut out, all, association_line),
            Reply::Score(s) => {
                let _ = write!(out, "document #{} score {}", s.document_id, opt(s.final_score));
                for (function, mean) in &s.by_function {
                    let _ = write!(out, "\n  {function:?}: {mean}");
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_read_flat_fields() {
        let requests: Vec<Request> = serde_json::from_str(
            r#"[
                {"op": "rate_dimension",
                 "actor": {"id": 2, "name": "Ben", "role": "division_chief"},
                 "document_id": 1, "plan_id": 3, "rater": "supervisor",
                 "quality": 5, "efficiency": "4.5"},
                {"op": "associate_plans",
                 "actor": {"id": 1, "name": "Ana", "role": "employee"},
                 "document_id": 1, "plan_ids": [1, 2]}
            ]"#,
        )
        .unwrap();
        match &requests[0] {
            Request::RateDimension { rater, entry, .. } => {
                assert_eq!(*rater, Rater::Supervisor);
                assert_eq!(entry.ratings.quality, Some(Decimal::from(5)));
                assert_eq!(entry.ratings.efficiency, Some(Decimal::new(45, 1)));
                assert_eq!(entry.ratings.timeliness, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &requests[1] {
            Request::AssociatePlans { mode, .. } => assert_eq!(*mode, AssociationMode::Add),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_op_is_rejected() {
        let parsed: Result<Request, _> = serde_json::from_str(
            r#"{"op": "delete_everything", "actor": {"id": 1, "name": "A", "role": "employee"}}"#,
        );
        assert!(parsed.is_err());
    }
}
