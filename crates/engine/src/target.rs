//! Direct performance targets: one per (employee, plan).
//!
//! An employee drafts or submits a target, the supervisor approves or
//! rejects it, the employee reports and self-rates the accomplishment, and
//! the supervisor rates it. Re-submitting re-opens a target from any status.

use std::fmt;
use std::str::FromStr;

use officeflow_storage::{NewTarget, TargetFilter, TargetRecord, WorkflowStorage};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actor::Actor;
use crate::aggregate::average;
use crate::directory::Directory;
use crate::error::{Violations, WorkflowError};
use crate::policy::{authorize, require, Action};
use crate::rating::Dimensions;
use crate::service::Engine;

pub const TARGET_TEXT_MAX: usize = 1000;
pub const ACCOMPLISHMENT_TEXT_MAX: usize = 2000;
pub const MOV_LINK_MAX: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl TargetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetStatus::Draft => "draft",
            TargetStatus::Submitted => "submitted",
            TargetStatus::Approved => "approved",
            TargetStatus::Rejected => "rejected",
        }
    }

    fn of(record: &TargetRecord) -> Result<Self, WorkflowError> {
        record.status.parse().map_err(|_| {
            WorkflowError::Storage(format!(
                "target {} has unknown status '{}'",
                record.id, record.status
            ))
        })
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TargetStatus::Draft),
            "submitted" => Ok(TargetStatus::Submitted),
            "approved" => Ok(TargetStatus::Approved),
            "rejected" => Ok(TargetStatus::Rejected),
            other => Err(format!("unknown target status '{other}'")),
        }
    }
}

/// An employee's accomplishment report with self ratings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccomplishmentReport {
    pub accomplishment: String,
    #[serde(default)]
    pub mov_link: Option<String>,
    #[serde(flatten)]
    pub ratings: Dimensions,
}

impl<S: WorkflowStorage, D: Directory> Engine<S, D> {
    /// Create or overwrite the actor's target for `plan_id` and submit it.
    pub async fn submit_target(
        &self,
        actor: &Actor,
        plan_id: i64,
        text: &str,
    ) -> Result<TargetRecord, WorkflowError> {
        self.upsert_target(actor, plan_id, text, TargetStatus::Submitted)
            .await
    }

    /// Save a target without submitting it. Only while it is new, a draft,
    /// or rejected.
    pub async fn draft_target(
        &self,
        actor: &Actor,
        plan_id: i64,
        text: &str,
    ) -> Result<TargetRecord, WorkflowError> {
        self.upsert_target(actor, plan_id, text, TargetStatus::Draft)
            .await
    }

    async fn upsert_target(
        &self,
        actor: &Actor,
        plan_id: i64,
        text: &str,
        status: TargetStatus,
    ) -> Result<TargetRecord, WorkflowError> {
        authorize(actor, Action::SubmitTarget)?;
        let mut v = Violations::new();
        v.required_text("target", text, TARGET_TEXT_MAX);
        match self.directory.plan(plan_id) {
            None => v.add("plan_id", format!("unknown plan {plan_id}")),
            // An empty roster leaves the plan open to everyone.
            Some(plan) if !plan.personnel.is_empty() && !plan.personnel.contains(&actor.id) => {
                v.add("plan_id", format!("not assigned to plan {plan_id}"))
            }
            Some(_) => {}
        }
        v.into_result()?;

        let mut snapshot = self.begin().await?;
        let outcome = self
            .write_target(&mut snapshot, actor, plan_id, text, status)
            .await;
        let target = self.finish(snapshot, outcome).await?;
        info!(
            target = target.id,
            employee = actor.id,
            plan = plan_id,
            status = %target.status,
            "target saved"
        );
        Ok(target)
    }

    async fn write_target(
        &self,
        snapshot: &mut S::Snapshot,
        actor: &Actor,
        plan_id: i64,
        text: &str,
        status: TargetStatus,
    ) -> Result<TargetRecord, WorkflowError> {
        let now = self.timestamp();
        let submitted_at = (status == TargetStatus::Submitted).then(|| now.clone());
        let existing = self
            .storage
            .find_target_for_update(snapshot, actor.id, plan_id)
            .await?;
        match existing {
            None => Ok(self
                .storage
                .insert_target(
                    snapshot,
                    NewTarget {
                        employee_id: actor.id,
                        plan_id,
                        target_text: text.to_string(),
                        status: status.as_str().to_string(),
                        target_submitted_at: submitted_at,
                    },
                )
                .await?),
            Some(mut target) => {
                let current = TargetStatus::of(&target)?;
                if status == TargetStatus::Draft
                    && matches!(current, TargetStatus::Submitted | TargetStatus::Approved)
                {
                    return Err(WorkflowError::state(current, "save target as draft"));
                }
                let expected = target.version;
                target.target_text = text.to_string();
                target.status = status.as_str().to_string();
                if submitted_at.is_some() {
                    target.target_submitted_at = submitted_at;
                }
                target.version = self
                    .storage
                    .update_target(snapshot, expected, target.clone())
                    .await?;
                Ok(target)
            }
        }
    }

    pub async fn approve_target(
        &self,
        actor: &Actor,
        target_id: i64,
    ) -> Result<TargetRecord, WorkflowError> {
        self.review_target(actor, target_id, TargetStatus::Approved)
            .await
    }

    pub async fn reject_target(
        &self,
        actor: &Actor,
        target_id: i64,
    ) -> Result<TargetRecord, WorkflowError> {
        self.review_target(actor, target_id, TargetStatus::Rejected)
            .await
    }

    async fn review_target(
        &self,
        actor: &Actor,
        target_id: i64,
        verdict: TargetStatus,
    ) -> Result<TargetRecord, WorkflowError> {
        authorize(actor, Action::ReviewTarget)?;
        let now = self.timestamp();
        let attempted = if verdict == TargetStatus::Approved {
            "approve target"
        } else {
            "reject target"
        };
        self.mutate_target(actor, target_id, Action::ReviewTarget, |target| {
            require(
                self.supervises(actor.id, target.employee_id),
                actor,
                Action::ReviewTarget,
                "supervisor of owner",
            )?;
            let current = TargetStatus::of(target)?;
            if current != TargetStatus::Submitted {
                return Err(WorkflowError::state(current, attempted));
            }
            target.status = verdict.as_str().to_string();
            target.target_reviewed_at = Some(now);
            Ok(())
        })
        .await
    }

    /// Report the accomplishment of an approved target with self ratings.
    /// All three dimensions are required here.
    pub async fn submit_accomplishment(
        &self,
        actor: &Actor,
        target_id: i64,
        report: AccomplishmentReport,
    ) -> Result<TargetRecord, WorkflowError> {
        authorize(actor, Action::SubmitAccomplishment)?;
        let mut v = Violations::new();
        v.required_text("accomplishment", &report.accomplishment, ACCOMPLISHMENT_TEXT_MAX);
        if let Some(link) = report.mov_link.as_deref().filter(|l| !l.trim().is_empty()) {
            v.url("mov_link", link.trim(), MOV_LINK_MAX);
        }
        report
            .ratings
            .validate(self.config.rating_scale, "self", true, &mut v);
        v.into_result()?;

        let now = self.timestamp();
        self.mutate_target(actor, target_id, Action::SubmitAccomplishment, |target| {
            require(
                target.employee_id == actor.id,
                actor,
                Action::SubmitAccomplishment,
                "owner",
            )?;
            let current = TargetStatus::of(target)?;
            if current != TargetStatus::Approved {
                return Err(WorkflowError::state(current, "submit accomplishment"));
            }
            let r = report.ratings;
            target.accomplishment = Some(report.accomplishment.trim().to_string());
            target.mov_link = report
                .mov_link
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            target.self_quality = r.quality;
            target.self_efficiency = r.efficiency;
            target.self_timeliness = r.timeliness;
            target.self_average = average(&r.as_array());
            target.accomplishment_submitted_at = Some(now);
            Ok(())
        })
        .await
    }

    /// Supervisor ratings for an approved target. Touches only the
    /// supervisor columns.
    pub async fn review_accomplishment(
        &self,
        actor: &Actor,
        target_id: i64,
        ratings: Dimensions,
    ) -> Result<TargetRecord, WorkflowError> {
        authorize(actor, Action::ReviewAccomplishment)?;
        let mut v = Violations::new();
        ratings.validate(self.config.rating_scale, "sup", true, &mut v);
        v.into_result()?;

        let now = self.timestamp();
        self.mutate_target(actor, target_id, Action::ReviewAccomplishment, |target| {
            require(
                self.supervises(actor.id, target.employee_id),
                actor,
                Action::ReviewAccomplishment,
                "supervisor of owner",
            )?;
            let current = TargetStatus::of(target)?;
            if current != TargetStatus::Approved {
                return Err(WorkflowError::state(current, "review accomplishment"));
            }
            target.supervisor_quality = ratings.quality;
            target.supervisor_efficiency = ratings.efficiency;
            target.supervisor_timeliness = ratings.timeliness;
            target.supervisor_average = average(&ratings.as_array());
            target.accomplishment_reviewed_at = Some(now);
            Ok(())
        })
        .await
    }

    /// Submitted targets of everyone the actor supervises.
    pub async fn pending_targets(&self, actor: &Actor) -> Result<Vec<TargetRecord>, WorkflowError> {
        authorize(actor, Action::ReviewTarget)?;
        Ok(self
            .storage
            .list_targets(&TargetFilter {
                employee_ids: Some(self.directory.subordinates_of(actor.id)),
                status: Some(TargetStatus::Submitted.as_str().to_string()),
            })
            .await?)
    }

    /// Approved targets of the actor's subordinates whose accomplishment is
    /// reported but not yet rated by the supervisor.
    pub async fn pending_accomplishments(
        &self,
        actor: &Actor,
    ) -> Result<Vec<TargetRecord>, WorkflowError> {
        authorize(actor, Action::ReviewAccomplishment)?;
        let approved = self
            .storage
            .list_targets(&TargetFilter {
                employee_ids: Some(self.directory.subordinates_of(actor.id)),
                status: Some(TargetStatus::Approved.as_str().to_string()),
            })
            .await?;
        Ok(approved
            .into_iter()
            .filter(|t| t.accomplishment.is_some() && t.supervisor_average.is_none())
            .collect())
    }

    /// The actor's own targets, in every status.
    pub async fn targets(&self, actor: &Actor) -> Result<Vec<TargetRecord>, WorkflowError> {
        authorize(actor, Action::SubmitTarget)?;
        Ok(self
            .storage
            .list_targets(&TargetFilter {
                employee_ids: Some(vec![actor.id]),
                status: None,
            })
            .await?)
    }

    async fn mutate_target<F>(
        &self,
        actor: &Actor,
        target_id: i64,
        action: Action,
        apply: F,
    ) -> Result<TargetRecord, WorkflowError>
    where
        F: FnOnce(&mut TargetRecord) -> Result<(), WorkflowError> + Send,
    {
        let mut snapshot = self.begin().await?;
        let outcome = async {
            let mut target = self
                .storage
                .get_target_for_update(&mut snapshot, target_id)
                .await?;
            let expected = target.version;
            apply(&mut target)?;
            target.version = self
                .storage
                .update_target(&mut snapshot, expected, target.clone())
                .await?;
            Ok::<_, WorkflowError>(target)
        }
        .await;
        let target = self.finish(snapshot, outcome).await?;
        info!(
            target = target.id,
            actor = actor.id,
            %action,
            status = %target.status,
            "target updated"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_round_trip() {
        for s in [
            TargetStatus::Draft,
            TargetStatus::Submitted,
            TargetStatus::Approved,
            TargetStatus::Rejected,
        ] {
            assert_eq!(s.as_str().parse::<TargetStatus>(), Ok(s));
        }
    }

    #[test]
    fn report_reads_flat_rating_fields() {
        let report: AccomplishmentReport = serde_json::from_str(
            r#"{"accomplishment": "Closed 40 tickets", "quality": "4", "efficiency": 5}"#,
        )
        .unwrap();
        assert_eq!(report.ratings.quality, Some(rust_decimal::Decimal::from(4)));
        assert_eq!(report.ratings.efficiency, Some(rust_decimal::Decimal::from(5)));
        assert_eq!(report.ratings.timeliness, None);
        assert_eq!(report.mov_link, None);
    }
}
