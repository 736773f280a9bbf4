use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A service ticket row as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: i64,
    /// `YYYY-MM-NNNN`, unique across the table.
    pub ticket_no: String,
    pub requester_id: i64,
    pub category: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub division_chief_name: String,
    pub assigned_to: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub dc_approval_date: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub ocd_approval_date: Option<String>,
    pub mis_assessment: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    pub expected_completion_date: Option<String>,
    pub action_taken: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub completed_at: Option<String>,
    pub attended_by: Option<String>,
    pub feedback: i32,
    pub created_at: String,
    pub updated_at: String,
    pub version: i64,
}

/// Column values for a ticket that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub ticket_no: String,
    pub requester_id: i64,
    pub category: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub division_chief_name: String,
    pub assigned_to: String,
    pub created_at: String,
}

/// One row of a ticket's audit trail. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketEventRecord {
    pub id: i64,
    pub ticket_id: i64,
    pub status_label: String,
    pub remarks: String,
    pub actor_id: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// Store-wide insertion order; breaks ties between equal `created_at`.
    pub sequence: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicketEvent {
    pub ticket_id: i64,
    pub status_label: String,
    pub remarks: String,
    pub actor_id: i64,
    pub created_at: String,
}

/// A direct performance target, unique per (employee_id, plan_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: i64,
    pub employee_id: i64,
    pub plan_id: i64,
    pub target_text: String,
    pub status: String,
    pub accomplishment: Option<String>,
    pub mov_link: Option<String>,
    pub self_quality: Option<Decimal>,
    pub self_efficiency: Option<Decimal>,
    pub self_timeliness: Option<Decimal>,
    pub self_average: Option<Decimal>,
    pub supervisor_quality: Option<Decimal>,
    pub supervisor_efficiency: Option<Decimal>,
    pub supervisor_timeliness: Option<Decimal>,
    pub supervisor_average: Option<Decimal>,
    pub target_submitted_at: Option<String>,
    pub target_reviewed_at: Option<String>,
    pub accomplishment_submitted_at: Option<String>,
    pub accomplishment_reviewed_at: Option<String>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTarget {
    pub employee_id: i64,
    pub plan_id: i64,
    pub target_text: String,
    pub status: String,
    pub target_submitted_at: Option<String>,
}

/// A performance document (one employee, one rating period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub employee_id: i64,
    pub rating_period: String,
    pub title: String,
    pub status: String,
    pub remarks: Option<String>,
    pub submitted_for_review_at: Option<String>,
    pub target_approved_at: Option<String>,
    pub submitted_for_rating_at: Option<String>,
    pub submitted_rating_at: Option<String>,
    pub created_at: String,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub employee_id: i64,
    pub rating_period: String,
    pub title: String,
    pub status: String,
    pub remarks: Option<String>,
    pub created_at: String,
}

/// Which party a rating patch belongs to. Each side owns a disjoint
/// column group of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rater {
    #[serde(rename = "self")]
    Employee,
    Supervisor,
}

/// The four columns owned by one rater.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingColumns {
    pub quality: Option<Decimal>,
    pub efficiency: Option<Decimal>,
    pub timeliness: Option<Decimal>,
    pub average: Option<Decimal>,
}

/// A (document, plan) association carrying both raters' payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRecord {
    pub id: i64,
    pub document_id: i64,
    pub plan_id: i64,
    pub accomplishment: Option<String>,
    pub mov_link: Option<String>,
    pub self_quality: Option<Decimal>,
    pub self_efficiency: Option<Decimal>,
    pub self_timeliness: Option<Decimal>,
    pub self_average: Option<Decimal>,
    pub sup_quality: Option<Decimal>,
    pub sup_efficiency: Option<Decimal>,
    pub sup_timeliness: Option<Decimal>,
    pub sup_average: Option<Decimal>,
    pub created_at: String,
    pub updated_at: String,
}

impl AssociationRecord {
    pub fn new(id: i64, document_id: i64, plan_id: i64, created_at: &str) -> Self {
        Self {
            id,
            document_id,
            plan_id,
            accomplishment: None,
            mov_link: None,
            self_quality: None,
            self_efficiency: None,
            self_timeliness: None,
            self_average: None,
            sup_quality: None,
            sup_efficiency: None,
            sup_timeliness: None,
            sup_average: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    /// Read the column group owned by `rater`.
    pub fn columns(&self, rater: Rater) -> RatingColumns {
        match rater {
            Rater::Employee => RatingColumns {
                quality: self.self_quality,
                efficiency: self.self_efficiency,
                timeliness: self.self_timeliness,
                average: self.self_average,
            },
            Rater::Supervisor => RatingColumns {
                quality: self.sup_quality,
                efficiency: self.sup_efficiency,
                timeliness: self.sup_timeliness,
                average: self.sup_average,
            },
        }
    }

    /// Apply a patch, touching only the patch owner's columns and the shared
    /// fields the patch actually carries.
    pub fn apply_patch(&mut self, patch: &RatingPatch) {
        let c = &patch.columns;
        match patch.rater {
            Rater::Employee => {
                self.self_quality = c.quality;
                self.self_efficiency = c.efficiency;
                self.self_timeliness = c.timeliness;
                self.self_average = c.average;
            }
            Rater::Supervisor => {
                self.sup_quality = c.quality;
                self.sup_efficiency = c.efficiency;
                self.sup_timeliness = c.timeliness;
                self.sup_average = c.average;
            }
        }
        if let Some(text) = &patch.accomplishment {
            self.accomplishment = Some(text.clone());
        }
        if let Some(link) = &patch.mov_link {
            self.mov_link = Some(link.clone());
        }
        self.updated_at = patch.updated_at.clone();
    }
}

/// A column-scoped partial update of one association.
///
/// Backends must apply it against the latest committed row rather than
/// writing back a full row read earlier, so that the two raters never
/// overwrite each other's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPatch {
    pub rater: Rater,
    pub columns: RatingColumns,
    /// `None` leaves the stored value unchanged.
    pub accomplishment: Option<String>,
    /// `None` leaves the stored value unchanged.
    pub mov_link: Option<String>,
    pub updated_at: String,
}

/// Filters for [`crate::WorkflowStorage::list_tickets`]. `None` matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub requester_id: Option<i64>,
    pub status: Option<String>,
    pub division_chief_name: Option<String>,
}

/// Filters for [`crate::WorkflowStorage::list_targets`]. `None` matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    pub employee_ids: Option<Vec<i64>>,
    pub status: Option<String>,
}

/// Filters for [`crate::WorkflowStorage::list_documents`]. `None` matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub employee_ids: Option<Vec<i64>>,
    pub status: Option<String>,
}
