//! IT job request tickets.
//!
//! ```text
//! PendingDivisionChiefApproval ──approve──▶ PendingOcdApproval ──approve──▶ InProgress
//!          │ reject                               │ reject                    │ mis update
//!          ▼                                      ▼                           ▼
//!   RejectedByDivisionChief                 RejectedByOcd          MisAssessed ⇄ ActedByMis
//!                                                                  (only toward ActedByMis)
//!                                                                        │ complete
//!                                                                        ▼
//!                                                                    Completed
//! ```
//!
//! Every successful operation writes the ticket and exactly one audit event
//! in the same snapshot.

use std::fmt;
use std::str::FromStr;

use officeflow_storage::{
    NewTicket, NewTicketEvent, TicketEventRecord, TicketFilter, TicketRecord, WorkflowStorage,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tracing::{debug, info};

use crate::actor::{Actor, Role};
use crate::directory::Directory;
use crate::error::{Violations, WorkflowError};
use crate::identifier::{allocate, Period};
use crate::policy::{authorize, require, Action};
use crate::service::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    PendingDivisionChiefApproval,
    PendingOcdApproval,
    RejectedByDivisionChief,
    InProgress,
    RejectedByOcd,
    MisAssessed,
    ActedByMis,
    Completed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 8] = [
        TicketStatus::PendingDivisionChiefApproval,
        TicketStatus::PendingOcdApproval,
        TicketStatus::RejectedByDivisionChief,
        TicketStatus::InProgress,
        TicketStatus::RejectedByOcd,
        TicketStatus::MisAssessed,
        TicketStatus::ActedByMis,
        TicketStatus::Completed,
    ];

    /// The stored form.
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::PendingDivisionChiefApproval => "Pending Division Chief Approval",
            TicketStatus::PendingOcdApproval => "Pending OCD Approval",
            TicketStatus::RejectedByDivisionChief => "Rejected by Division Chief",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::RejectedByOcd => "Rejected by OCD",
            TicketStatus::MisAssessed => "MIS Assessed the Request",
            TicketStatus::ActedByMis => "Acted by MIS",
            TicketStatus::Completed => "Completed",
        }
    }

    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (PendingDivisionChiefApproval, PendingOcdApproval)
                | (PendingDivisionChiefApproval, RejectedByDivisionChief)
                | (PendingOcdApproval, InProgress)
                | (PendingOcdApproval, RejectedByOcd)
                | (InProgress, MisAssessed)
                | (InProgress, ActedByMis)
                | (MisAssessed, MisAssessed)
                | (MisAssessed, ActedByMis)
                | (ActedByMis, ActedByMis)
                | (MisAssessed, Completed)
                | (ActedByMis, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        !Self::ALL.iter().any(|next| self.can_transition_to(*next))
    }

    fn of(record: &TicketRecord) -> Result<Self, WorkflowError> {
        record.status.parse().map_err(|_| {
            WorkflowError::Storage(format!(
                "ticket {} has unknown status '{}'",
                record.ticket_no, record.status
            ))
        })
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown ticket status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Fields a requester fills in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRequest {
    pub category: String,
    pub title: String,
    pub description: String,
    pub division_chief_name: String,
    pub assigned_to: String,
}

impl TicketRequest {
    fn validate(&self) -> Result<(), WorkflowError> {
        let mut v = Violations::new();
        v.required_text("category", &self.category, 255);
        v.required_text("title", &self.title, 255);
        v.required_text("description", &self.description, 65_535);
        v.required_text("division_chief_name", &self.division_chief_name, 255);
        v.required_text("assigned_to", &self.assigned_to, 255);
        v.into_result()
    }
}

/// An MIS assessment. Absent and empty optional fields are treated alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisUpdate {
    pub assessment: String,
    #[serde(default)]
    pub expected_completion: Option<String>,
    #[serde(default)]
    pub action_taken: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn is_date(value: &str) -> bool {
    time::Date::parse(value, format_description!("[year]-[month]-[day]")).is_ok()
        || time::OffsetDateTime::parse(value, &Rfc3339).is_ok()
}

impl MisUpdate {
    /// MIS has only assessed unless it reports an action or a completion.
    pub fn resulting_status(&self) -> TicketStatus {
        if present(&self.action_taken).is_none() && present(&self.completed_at).is_none() {
            TicketStatus::MisAssessed
        } else {
            TicketStatus::ActedByMis
        }
    }

    pub fn remarks(&self) -> String {
        format!(
            "Assessment: {}\nExpected Completion: {}\nAction Taken: {}\nCompleted At: {}",
            self.assessment.trim(),
            present(&self.expected_completion).unwrap_or(""),
            present(&self.action_taken).unwrap_or(""),
            present(&self.completed_at).unwrap_or(""),
        )
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        let mut v = Violations::new();
        v.required_text("assessment", &self.assessment, 65_535);
        for (field, value) in [
            ("expected_completion", &self.expected_completion),
            ("completed_at", &self.completed_at),
        ] {
            if let Some(text) = present(value) {
                if !is_date(text) {
                    v.add(field, "must be a date (YYYY-MM-DD or RFC 3339)");
                }
            }
        }
        v.into_result()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketScope {
    Own,
    All,
}

/// A ticket with its audit trail in causal order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketHistory {
    pub ticket: TicketRecord,
    pub events: Vec<TicketEventRecord>,
}

/// What a guarded transition writes besides the row itself.
struct Step {
    to: TicketStatus,
    label: &'static str,
    remarks: String,
}

impl<S: WorkflowStorage, D: Directory> Engine<S, D> {
    /// Create a ticket in the current period.
    ///
    /// A ticket number taken by a concurrent commit is retried with a fresh
    /// snapshot, up to `allocation_retries` extra attempts.
    pub async fn create_ticket(
        &self,
        actor: &Actor,
        request: TicketRequest,
    ) -> Result<TicketRecord, WorkflowError> {
        authorize(actor, Action::SubmitTicket)?;
        request.validate()?;

        let retries = self.config.allocation_retries;
        let mut attempt = 0;
        loop {
            let mut snapshot = self.begin().await?;
            let outcome = self.insert_ticket(&mut snapshot, actor, &request).await;
            match self.finish(snapshot, outcome).await {
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    debug!(attempt, error = %e, "ticket number taken, retrying");
                }
                Ok(ticket) => {
                    info!(
                        ticket_no = %ticket.ticket_no,
                        id = ticket.id,
                        requester = actor.id,
                        "ticket submitted"
                    );
                    return Ok(ticket);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn insert_ticket(
        &self,
        snapshot: &mut S::Snapshot,
        actor: &Actor,
        request: &TicketRequest,
    ) -> Result<TicketRecord, WorkflowError> {
        let now = self.now();
        let period = Period::at(now, self.config.utc_offset_hours);
        let ticket_no = allocate(&self.storage, snapshot, period).await?;
        let created_at = self.timestamp();
        let ticket = self
            .storage
            .insert_ticket(
                snapshot,
                NewTicket {
                    ticket_no: ticket_no.to_string(),
                    requester_id: actor.id,
                    category: request.category.trim().to_string(),
                    title: request.title.trim().to_string(),
                    description: request.description.clone(),
                    status: TicketStatus::PendingDivisionChiefApproval.as_str().to_string(),
                    division_chief_name: request.division_chief_name.trim().to_string(),
                    assigned_to: request.assigned_to.trim().to_string(),
                    created_at: created_at.clone(),
                },
            )
            .await?;
        self.storage
            .insert_ticket_event(
                snapshot,
                NewTicketEvent {
                    ticket_id: ticket.id,
                    status_label: "Submitted IT Job Request".to_string(),
                    remarks: "Request submitted by user.".to_string(),
                    actor_id: actor.id,
                    created_at,
                },
            )
            .await?;
        Ok(ticket)
    }

    pub async fn division_chief_action(
        &self,
        actor: &Actor,
        ticket_id: i64,
        decision: Decision,
    ) -> Result<TicketRecord, WorkflowError> {
        authorize(actor, Action::DivisionChiefDecision)?;
        let now = self.timestamp();
        self.transition(actor, ticket_id, Action::DivisionChiefDecision, |ticket| {
            require(
                ticket.division_chief_name == actor.name,
                actor,
                Action::DivisionChiefDecision,
                "named division chief",
            )?;
            Ok(match decision {
                Decision::Approve => {
                    ticket.dc_approval_date = Some(now);
                    Step {
                        to: TicketStatus::PendingOcdApproval,
                        label: "Division Chief Approved",
                        remarks: "Approved by Division Chief.".to_string(),
                    }
                }
                Decision::Reject => Step {
                    to: TicketStatus::RejectedByDivisionChief,
                    label: "Division Chief Rejected",
                    remarks: "Rejected by Division Chief.".to_string(),
                },
            })
        })
        .await
    }

    pub async fn ocd_action(
        &self,
        actor: &Actor,
        ticket_id: i64,
        decision: Decision,
    ) -> Result<TicketRecord, WorkflowError> {
        authorize(actor, Action::OcdDecision)?;
        let now = self.timestamp();
        self.transition(actor, ticket_id, Action::OcdDecision, |ticket| {
            Ok(match decision {
                Decision::Approve => {
                    ticket.ocd_approval_date = Some(now);
                    Step {
                        to: TicketStatus::InProgress,
                        label: "OCD Approved",
                        remarks: "Request Approved by OCD.".to_string(),
                    }
                }
                Decision::Reject => Step {
                    to: TicketStatus::RejectedByOcd,
                    label: "OCD Rejected",
                    remarks: "Rejected by OCD.".to_string(),
                },
            })
        })
        .await
    }

    /// Record an MIS assessment. Optional fields overwrite only when given.
    pub async fn mis_update(
        &self,
        actor: &Actor,
        ticket_id: i64,
        update: MisUpdate,
    ) -> Result<TicketRecord, WorkflowError> {
        authorize(actor, Action::MisUpdate)?;
        update.validate()?;
        let to = update.resulting_status();
        self.transition(actor, ticket_id, Action::MisUpdate, |ticket| {
            ticket.mis_assessment = Some(update.assessment.trim().to_string());
            if let Some(v) = present(&update.expected_completion) {
                ticket.expected_completion_date = Some(v.to_string());
            }
            if let Some(v) = present(&update.action_taken) {
                ticket.action_taken = Some(v.to_string());
            }
            if let Some(v) = present(&update.completed_at) {
                ticket.completed_at = Some(v.to_string());
            }
            ticket.attended_by = Some(actor.name.clone());
            Ok(Step {
                to,
                label: to.as_str(),
                remarks: update.remarks(),
            })
        })
        .await
    }

    pub async fn complete_ticket(
        &self,
        actor: &Actor,
        ticket_id: i64,
    ) -> Result<TicketRecord, WorkflowError> {
        authorize(actor, Action::CompleteTicket)?;
        let now = self.timestamp();
        self.transition(actor, ticket_id, Action::CompleteTicket, |ticket| {
            // A completion date recorded by MIS wins over the close-out time.
            ticket.completed_at.get_or_insert(now);
            Ok(Step {
                to: TicketStatus::Completed,
                label: "Completed",
                remarks: "Request completed successfully.".to_string(),
            })
        })
        .await
    }

    /// Shared body of every ticket transition: lock the row, let `apply`
    /// check relationships and set fields, check the status graph, then write
    /// the row and its event.
    async fn transition<F>(
        &self,
        actor: &Actor,
        ticket_id: i64,
        action: Action,
        apply: F,
    ) -> Result<TicketRecord, WorkflowError>
    where
        F: FnOnce(&mut TicketRecord) -> Result<Step, WorkflowError> + Send,
    {
        let mut snapshot = self.begin().await?;
        let outcome = self
            .apply_transition(&mut snapshot, actor, ticket_id, action, apply)
            .await;
        let ticket = self.finish(snapshot, outcome).await?;
        info!(
            ticket_no = %ticket.ticket_no,
            id = ticket.id,
            actor = actor.id,
            %action,
            status = %ticket.status,
            "ticket transition committed"
        );
        Ok(ticket)
    }

    async fn apply_transition<F>(
        &self,
        snapshot: &mut S::Snapshot,
        actor: &Actor,
        ticket_id: i64,
        action: Action,
        apply: F,
    ) -> Result<TicketRecord, WorkflowError>
    where
        F: FnOnce(&mut TicketRecord) -> Result<Step, WorkflowError> + Send,
    {
        let mut ticket = self.storage.get_ticket_for_update(snapshot, ticket_id).await?;
        let from = TicketStatus::of(&ticket)?;
        let expected_version = ticket.version;

        let step = apply(&mut ticket)?;
        if !from.can_transition_to(step.to) {
            debug!(ticket_id, %from, to = %step.to, %action, "illegal ticket transition");
            return Err(WorkflowError::state(from, &action.to_string()));
        }

        let now = self.timestamp();
        ticket.status = step.to.as_str().to_string();
        ticket.updated_at = now.clone();
        let version = self
            .storage
            .update_ticket(snapshot, expected_version, ticket.clone())
            .await?;
        ticket.version = version;
        self.storage
            .insert_ticket_event(
                snapshot,
                NewTicketEvent {
                    ticket_id,
                    status_label: step.label.to_string(),
                    remarks: step.remarks,
                    actor_id: actor.id,
                    created_at: now,
                },
            )
            .await?;
        Ok(ticket)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub async fn list_tickets(
        &self,
        actor: &Actor,
        scope: TicketScope,
    ) -> Result<Vec<TicketRecord>, WorkflowError> {
        let filter = match scope {
            TicketScope::Own => TicketFilter {
                requester_id: Some(actor.id),
                ..Default::default()
            },
            TicketScope::All => {
                authorize(actor, Action::ListAllTickets)?;
                TicketFilter::default()
            }
        };
        Ok(self.storage.list_tickets(&filter).await?)
    }

    /// A ticket and its events. Visible to the requester, the named division
    /// chief, OCD and administrators.
    pub async fn ticket_history(
        &self,
        actor: &Actor,
        ticket_id: i64,
    ) -> Result<TicketHistory, WorkflowError> {
        authorize(actor, Action::ViewTicket)?;
        let ticket = self.storage.get_ticket(ticket_id).await?;
        let visible = ticket.requester_id == actor.id
            || matches!(actor.role, Role::Administrator | Role::Ocd)
            || (actor.role == Role::DivisionChief && ticket.division_chief_name == actor.name);
        require(visible, actor, Action::ViewTicket, "requester or approver")?;
        let events = self.storage.list_ticket_events(ticket_id).await?;
        Ok(TicketHistory { ticket, events })
    }

    /// Tickets waiting for this division chief.
    pub async fn pending_division_chief(
        &self,
        actor: &Actor,
    ) -> Result<Vec<TicketRecord>, WorkflowError> {
        authorize(actor, Action::DivisionChiefDecision)?;
        Ok(self
            .storage
            .list_tickets(&TicketFilter {
                status: Some(TicketStatus::PendingDivisionChiefApproval.as_str().to_string()),
                division_chief_name: Some(actor.name.clone()),
                ..Default::default()
            })
            .await?)
    }

    pub async fn pending_ocd(&self, actor: &Actor) -> Result<Vec<TicketRecord>, WorkflowError> {
        authorize(actor, Action::OcdDecision)?;
        Ok(self
            .storage
            .list_tickets(&TicketFilter {
                status: Some(TicketStatus::PendingOcdApproval.as_str().to_string()),
                ..Default::default()
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketStatus::*;

    #[test]
    fn stored_strings_round_trip() {
        for status in TicketStatus::ALL {
            assert_eq!(status.as_str().parse::<TicketStatus>(), Ok(status));
        }
        assert!("Pending".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn approval_chain_is_linear() {
        assert!(PendingDivisionChiefApproval.can_transition_to(PendingOcdApproval));
        assert!(PendingOcdApproval.can_transition_to(InProgress));
        assert!(!PendingDivisionChiefApproval.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Completed));
    }

    #[test]
    fn mis_statuses_only_move_toward_action() {
        assert!(MisAssessed.can_transition_to(MisAssessed));
        assert!(MisAssessed.can_transition_to(ActedByMis));
        assert!(ActedByMis.can_transition_to(ActedByMis));
        assert!(!ActedByMis.can_transition_to(MisAssessed));
    }

    #[test]
    fn terminal_states() {
        let terminal: Vec<_> = TicketStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, [RejectedByDivisionChief, RejectedByOcd, Completed]);
    }

    #[test]
    fn mis_status_depends_on_action_or_completion() {
        let assessed = MisUpdate {
            assessment: "Needs new toner".to_string(),
            expected_completion: Some("2025-09-10".to_string()),
            ..Default::default()
        };
        assert_eq!(assessed.resulting_status(), MisAssessed);

        let blank = MisUpdate {
            action_taken: Some("   ".to_string()),
            completed_at: Some(String::new()),
            ..assessed.clone()
        };
        assert_eq!(blank.resulting_status(), MisAssessed);

        let acted = MisUpdate {
            action_taken: Some("Replaced toner".to_string()),
            ..assessed.clone()
        };
        assert_eq!(acted.resulting_status(), ActedByMis);

        let finished = MisUpdate {
            completed_at: Some("2025-09-09".to_string()),
            ..assessed
        };
        assert_eq!(finished.resulting_status(), ActedByMis);
    }

    #[test]
    fn mis_remarks_list_all_four_fields() {
        let update = MisUpdate {
            assessment: "Needs new toner".to_string(),
            expected_completion: Some("2025-09-10".to_string()),
            action_taken: None,
            completed_at: None,
        };
        assert_eq!(
            update.remarks(),
            "Assessment: Needs new toner\nExpected Completion: 2025-09-10\nAction Taken: \nCompleted At: "
        );
    }

    #[test]
    fn mis_dates_are_checked() {
        let bad = MisUpdate {
            assessment: "ok".to_string(),
            expected_completion: Some("next week".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(WorkflowError::Validation(_))));

        let good = MisUpdate {
            assessment: "ok".to_string(),
            completed_at: Some("2025-09-09T10:00:00+08:00".to_string()),
            ..Default::default()
        };
        assert!(good.validate().is_ok());
    }
}
