//! Performance documents (one per employee and rating period).
//!
//! ```text
//! New Target ─owner─▶ For Review ─supervisor─▶ Targets Approved
//!     ─owner─▶ Submitted for Rating ─supervisor─▶ Rated & For PMT Review
//! ```
//!
//! Each step stamps its milestone. None can be skipped.

use std::fmt;
use std::str::FromStr;

use officeflow_storage::{DocumentFilter, DocumentRecord, NewDocument, WorkflowStorage};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actor::{Actor, Role};
use crate::directory::Directory;
use crate::error::{Violations, WorkflowError};
use crate::policy::{authorize, require, Action};
use crate::service::Engine;

pub const COMMENTS_MAX: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    NewTarget,
    ForReview,
    TargetsApproved,
    SubmittedForRating,
    RatedForPmtReview,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::NewTarget,
        DocumentStatus::ForReview,
        DocumentStatus::TargetsApproved,
        DocumentStatus::SubmittedForRating,
        DocumentStatus::RatedForPmtReview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::NewTarget => "New Target",
            DocumentStatus::ForReview => "For Review",
            DocumentStatus::TargetsApproved => "Targets Approved",
            DocumentStatus::SubmittedForRating => "Submitted for Rating",
            DocumentStatus::RatedForPmtReview => "Rated & For PMT Review",
        }
    }

    /// The single status this one may advance to.
    pub fn next(self) -> Option<DocumentStatus> {
        match self {
            DocumentStatus::NewTarget => Some(DocumentStatus::ForReview),
            DocumentStatus::ForReview => Some(DocumentStatus::TargetsApproved),
            DocumentStatus::TargetsApproved => Some(DocumentStatus::SubmittedForRating),
            DocumentStatus::SubmittedForRating => Some(DocumentStatus::RatedForPmtReview),
            DocumentStatus::RatedForPmtReview => None,
        }
    }

    /// Plans can be attached while targets are still being drafted.
    pub fn accepts_plans(self) -> bool {
        matches!(self, DocumentStatus::NewTarget | DocumentStatus::ForReview)
    }

    /// Ratings are open once targets are approved and until the supervisor
    /// closes the rating.
    pub fn accepts_ratings(self) -> bool {
        matches!(
            self,
            DocumentStatus::TargetsApproved | DocumentStatus::SubmittedForRating
        )
    }

    pub(crate) fn of(record: &DocumentRecord) -> Result<Self, WorkflowError> {
        record.status.parse().map_err(|_| {
            WorkflowError::Storage(format!(
                "document {} has unknown status '{}'",
                record.id, record.status
            ))
        })
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown document status '{s}'"))
    }
}

/// Who must be acting on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Party {
    Owner,
    Supervisor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub rating_period: String,
    pub title: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentScope {
    Own,
    Supervised,
}

impl<S: WorkflowStorage, D: Directory> Engine<S, D> {
    pub(crate) fn check_party(
        &self,
        actor: &Actor,
        owner_id: i64,
        party: Party,
        action: Action,
    ) -> Result<(), WorkflowError> {
        match party {
            Party::Owner => require(owner_id == actor.id, actor, action, "owner"),
            Party::Supervisor => require(
                self.supervises(actor.id, owner_id),
                actor,
                action,
                "supervisor of owner",
            ),
        }
    }

    /// Owner, supervisor and administrators may read a document.
    pub(crate) fn check_reader(
        &self,
        actor: &Actor,
        owner_id: i64,
        action: Action,
    ) -> Result<(), WorkflowError> {
        let allowed = owner_id == actor.id
            || actor.role == Role::Administrator
            || self.supervises(actor.id, owner_id);
        require(allowed, actor, action, "owner, supervisor or administrator")
    }

    pub async fn create_document(
        &self,
        actor: &Actor,
        request: DocumentRequest,
    ) -> Result<DocumentRecord, WorkflowError> {
        authorize(actor, Action::ManageDocument)?;
        let mut v = Violations::new();
        v.required_text("rating_period", &request.rating_period, 255);
        v.required_text("title", &request.title, 255);
        if let Some(remarks) = &request.remarks {
            v.max_len("remarks", remarks, COMMENTS_MAX);
        }
        v.into_result()?;

        let mut snapshot = self.begin().await?;
        let outcome = self
            .storage
            .insert_document(
                &mut snapshot,
                NewDocument {
                    employee_id: actor.id,
                    rating_period: request.rating_period.trim().to_string(),
                    title: request.title.trim().to_string(),
                    status: DocumentStatus::NewTarget.as_str().to_string(),
                    remarks: request.remarks,
                    created_at: self.timestamp(),
                },
            )
            .await
            .map_err(WorkflowError::from);
        let document = self.finish(snapshot, outcome).await?;
        info!(document = document.id, employee = actor.id, "document created");
        Ok(document)
    }

    pub async fn submit_for_review(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> Result<DocumentRecord, WorkflowError> {
        authorize(actor, Action::ManageDocument)?;
        self.advance_document(
            actor,
            document_id,
            Action::ManageDocument,
            Party::Owner,
            DocumentStatus::NewTarget,
        )
            .await
    }

    pub async fn approve_targets(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> Result<DocumentRecord, WorkflowError> {
        authorize(actor, Action::ReviewDocument)?;
        self.advance_document(
            actor,
            document_id,
            Action::ReviewDocument,
            Party::Supervisor,
            DocumentStatus::ForReview,
        )
            .await
    }

    pub async fn submit_for_rating(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> Result<DocumentRecord, WorkflowError> {
        authorize(actor, Action::ManageDocument)?;
        self.advance_document(
            actor,
            document_id,
            Action::ManageDocument,
            Party::Owner,
            DocumentStatus::TargetsApproved,
        )
            .await
    }

    /// Close the rating and hand the document to the PMT.
    pub async fn save_ratings(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> Result<DocumentRecord, WorkflowError> {
        authorize(actor, Action::ReviewDocument)?;
        self.advance_document(
            actor,
            document_id,
            Action::ReviewDocument,
            Party::Supervisor,
            DocumentStatus::SubmittedForRating,
        )
            .await
    }

    /// Replace the supervisor's comments. Allowed in any status.
    pub async fn save_comments(
        &self,
        actor: &Actor,
        document_id: i64,
        remarks: Option<String>,
    ) -> Result<DocumentRecord, WorkflowError> {
        authorize(actor, Action::ReviewDocument)?;
        let remarks = remarks.filter(|r| !r.trim().is_empty());
        if let Some(text) = &remarks {
            let mut v = Violations::new();
            v.max_len("remarks", text, COMMENTS_MAX);
            v.into_result()?;
        }
        self.mutate_document(actor, document_id, Action::ReviewDocument, |doc| {
            self.check_party(actor, doc.employee_id, Party::Supervisor, Action::ReviewDocument)?;
            doc.remarks = remarks;
            Ok(())
        })
        .await
    }

    pub async fn documents(
        &self,
        actor: &Actor,
        scope: DocumentScope,
    ) -> Result<Vec<DocumentRecord>, WorkflowError> {
        let employee_ids = match scope {
            DocumentScope::Own => vec![actor.id],
            DocumentScope::Supervised => {
                authorize(actor, Action::ReviewDocument)?;
                self.directory.subordinates_of(actor.id)
            }
        };
        Ok(self
            .storage
            .list_documents(&DocumentFilter {
                employee_ids: Some(employee_ids),
                status: None,
            })
            .await?)
    }

    /// Move a document one step along its graph, from `expected` only.
    async fn advance_document(
        &self,
        actor: &Actor,
        document_id: i64,
        action: Action,
        party: Party,
        expected: DocumentStatus,
    ) -> Result<DocumentRecord, WorkflowError> {
        let now = self.timestamp();
        self.mutate_document(actor, document_id, action, |doc| {
            self.check_party(actor, doc.employee_id, party, action)?;
            let current = DocumentStatus::of(doc)?;
            let next = match expected.next() {
                Some(next) if current == expected => next,
                _ => {
                    return Err(WorkflowError::state(
                        current,
                        &format!("move document from '{expected}'"),
                    ))
                }
            };
            let stamp = match next {
                DocumentStatus::ForReview => &mut doc.submitted_for_review_at,
                DocumentStatus::TargetsApproved => &mut doc.target_approved_at,
                DocumentStatus::SubmittedForRating => &mut doc.submitted_for_rating_at,
                DocumentStatus::RatedForPmtReview => &mut doc.submitted_rating_at,
                DocumentStatus::NewTarget => {
                    return Err(WorkflowError::state(current, "reopen document"))
                }
            };
            *stamp = Some(now);
            doc.status = next.as_str().to_string();
            Ok(())
        })
        .await
    }

    async fn mutate_document<F>(
        &self,
        actor: &Actor,
        document_id: i64,
        action: Action,
        apply: F,
    ) -> Result<DocumentRecord, WorkflowError>
    where
        F: FnOnce(&mut DocumentRecord) -> Result<(), WorkflowError> + Send,
    {
        let mut snapshot = self.begin().await?;
        let outcome = async {
            let mut doc = self
                .storage
                .get_document_for_update(&mut snapshot, document_id)
                .await?;
            let expected = doc.version;
            apply(&mut doc)?;
            doc.version = self
                .storage
                .update_document(&mut snapshot, expected, doc.clone())
                .await?;
            Ok::<_, WorkflowError>(doc)
        }
        .await;
        let doc = self.finish(snapshot, outcome).await?;
        info!(
            document = doc.id,
            actor = actor.id,
            %action,
            status = %doc.status,
            "document updated"
        );
        Ok(doc)
    }
}
