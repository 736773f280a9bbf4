//! Role gate for every engine operation.
//!
//! The table below is the only place that says which roles may attempt an
//! operation. Relationship checks (owner, supervisor, named division chief)
//! run after it, inside the workflows.

use std::fmt;

use tracing::warn;

use crate::actor::{Actor, Role};
use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SubmitTicket,
    ViewTicket,
    ListAllTickets,
    DivisionChiefDecision,
    OcdDecision,
    MisUpdate,
    CompleteTicket,
    SubmitTarget,
    ReviewTarget,
    SubmitAccomplishment,
    ReviewAccomplishment,
    ManageDocument,
    ReviewDocument,
    AssociatePlans,
    RateSelf,
    RateSupervisor,
    ViewScore,
}

use Role::*;

const EVERYONE: &[Role] = &Role::ALL;
const REVIEWERS: &[Role] = &[Supervisor, DivisionChief, Ocd, Administrator];

/// Roles allowed to attempt `action`.
pub fn allowed_roles(action: Action) -> &'static [Role] {
    match action {
        Action::SubmitTicket | Action::ViewTicket => EVERYONE,
        Action::ListAllTickets | Action::MisUpdate | Action::CompleteTicket => &[Administrator],
        Action::DivisionChiefDecision => &[DivisionChief],
        Action::OcdDecision => &[Ocd],
        Action::SubmitTarget
        | Action::SubmitAccomplishment
        | Action::ManageDocument
        | Action::AssociatePlans
        | Action::RateSelf
        | Action::ViewScore => EVERYONE,
        Action::ReviewTarget
        | Action::ReviewAccomplishment
        | Action::ReviewDocument
        | Action::RateSupervisor => REVIEWERS,
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Check the role table.
pub fn authorize(actor: &Actor, action: Action) -> Result<(), WorkflowError> {
    if allowed_roles(action).contains(&actor.role) {
        Ok(())
    } else {
        warn!(actor = actor.id, role = %actor.role, %action, "role not allowed");
        Err(WorkflowError::Authorization)
    }
}

/// Fail with a logged authorization error unless `holds`.
pub(crate) fn require(
    holds: bool,
    actor: &Actor,
    action: Action,
    check: &'static str,
) -> Result<(), WorkflowError> {
    if holds {
        Ok(())
    } else {
        warn!(actor = actor.id, %action, check, "relationship check failed");
        Err(WorkflowError::Authorization)
    }
}
