//! Plan associations of a performance document and the two-sided ratings
//! they carry.
//!
//! The employee and the supervisor rate the same association row, each
//! through their own column group. Rating writes are column-scoped patches,
//! so the two never overwrite each other regardless of ordering.

use std::collections::BTreeSet;

use officeflow_storage::{AssociationRecord, Rater, RatingColumns, RatingPatch, WorkflowStorage};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actor::Actor;
use crate::aggregate::average;
use crate::directory::Directory;
use crate::document::{DocumentStatus, Party};
use crate::error::{Violations, WorkflowError};
use crate::policy::{authorize, Action};
use crate::rating::Dimensions;
use crate::service::Engine;

pub const ASSOCIATION_TEXT_MAX: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationMode {
    /// Attach the plans that are not attached yet.
    Add,
    /// Make the attached set exactly the given plans.
    Replace,
}

/// One rater's input for one association. Absent dimensions are stored as
/// absent; absent shared fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEntry {
    #[serde(default)]
    pub accomplishment: Option<String>,
    #[serde(default)]
    pub mov_link: Option<String>,
    #[serde(flatten)]
    pub ratings: Dimensions,
}

fn supplied(text: &Option<String>) -> Option<String> {
    text.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

impl<S: WorkflowStorage, D: Directory> Engine<S, D> {
    /// Attach performance plans to the actor's document.
    ///
    /// Returns the document's associations after the change.
    pub async fn associate_plans(
        &self,
        actor: &Actor,
        document_id: i64,
        plan_ids: &[i64],
        mode: AssociationMode,
    ) -> Result<Vec<AssociationRecord>, WorkflowError> {
        authorize(actor, Action::AssociatePlans)?;
        let wanted: BTreeSet<i64> = plan_ids.iter().copied().collect();
        let mut v = Violations::new();
        if wanted.is_empty() {
            v.add("plan_ids", "at least one plan is required");
        }
        for id in &wanted {
            if self.directory.plan(*id).is_none() {
                v.add("plan_ids", format!("unknown plan {id}"));
            }
        }
        v.into_result()?;

        let now = self.timestamp();
        let mut snapshot = self.begin().await?;
        let outcome = async {
            let doc = self
                .storage
                .get_document_for_update(&mut snapshot, document_id)
                .await?;
            self.check_party(actor, doc.employee_id, Party::Owner, Action::AssociatePlans)?;
            let status = DocumentStatus::of(&doc)?;
            if !status.accepts_plans() {
                return Err(WorkflowError::state(status, "change attached plans"));
            }
            // Bumping the document serializes association edits: a competing
            // edit fails its version check instead of deleting a vanished row.
            let expected = doc.version;
            self.storage
                .update_document(&mut snapshot, expected, doc)
                .await?;

            let existing: BTreeSet<i64> = self
                .storage
                .list_associations_for_update(&mut snapshot, document_id)
                .await?
                .iter()
                .map(|a| a.plan_id)
                .collect();
            if mode == AssociationMode::Replace {
                for plan_id in existing.difference(&wanted) {
                    self.storage
                        .delete_association(&mut snapshot, document_id, *plan_id)
                        .await?;
                }
            }
            for plan_id in wanted.difference(&existing) {
                self.storage
                    .insert_association(&mut snapshot, document_id, *plan_id, &now)
                    .await?;
            }
            Ok::<_, WorkflowError>(
                self.storage
                    .list_associations_for_update(&mut snapshot, document_id)
                    .await?,
            )
        }
        .await;
        let associations = self.finish(snapshot, outcome).await?;
        info!(
            document = document_id,
            actor = actor.id,
            ?mode,
            plans = associations.len(),
            "plans associated"
        );
        Ok(associations)
    }

    /// Record one rater's dimensions for a (document, plan) association.
    pub async fn rate_dimension(
        &self,
        actor: &Actor,
        document_id: i64,
        plan_id: i64,
        rater: Rater,
        entry: RatingEntry,
    ) -> Result<AssociationRecord, WorkflowError> {
        let (action, party, prefix) = match rater {
            Rater::Employee => (Action::RateSelf, Party::Owner, "self"),
            Rater::Supervisor => (Action::RateSupervisor, Party::Supervisor, "sup"),
        };
        authorize(actor, action)?;
        let accomplishment = supplied(&entry.accomplishment);
        let mov_link = supplied(&entry.mov_link);
        let mut v = Violations::new();
        if let Some(text) = &accomplishment {
            v.max_len("accomplishment", text, ASSOCIATION_TEXT_MAX);
        }
        if let Some(link) = &mov_link {
            v.url("mov_link", link, ASSOCIATION_TEXT_MAX);
        }
        entry
            .ratings
            .validate(self.config.rating_scale, prefix, false, &mut v);
        v.into_result()?;

        let patch = RatingPatch {
            rater,
            columns: RatingColumns {
                quality: entry.ratings.quality,
                efficiency: entry.ratings.efficiency,
                timeliness: entry.ratings.timeliness,
                average: average(&entry.ratings.as_array()),
            },
            accomplishment,
            mov_link,
            updated_at: self.timestamp(),
        };
        let mut snapshot = self.begin().await?;
        let outcome = async {
            let doc = self
                .storage
                .get_document_for_update(&mut snapshot, document_id)
                .await?;
            self.check_party(actor, doc.employee_id, party, action)?;
            let status = DocumentStatus::of(&doc)?;
            if !status.accepts_ratings() {
                return Err(WorkflowError::state(status, "rate"));
            }
            // The rating window must still be open at commit.
            self.storage
                .assert_document_version(&mut snapshot, document_id, doc.version)
                .await?;
            Ok::<_, WorkflowError>(
                self.storage
                    .patch_rating(&mut snapshot, document_id, plan_id, patch)
                    .await?,
            )
        }
        .await;
        let row = self.finish(snapshot, outcome).await?;
        info!(
            document = document_id,
            plan = plan_id,
            actor = actor.id,
            ?rater,
            "rating saved"
        );
        Ok(row)
    }

    /// A document's associations, for its owner, supervisor or an administrator.
    pub async fn associations(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> Result<Vec<AssociationRecord>, WorkflowError> {
        authorize(actor, Action::ViewScore)?;
        let doc = self.storage.get_document(document_id).await?;
        self.check_reader(actor, doc.employee_id, Action::ViewScore)?;
        Ok(self.storage.list_associations(document_id).await?)
    }
}
