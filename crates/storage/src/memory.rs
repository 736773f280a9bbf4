//! In-process `WorkflowStorage` backend.
//!
//! Committed state lives behind a single async mutex. A snapshot is a private
//! working copy of that state plus the log of mutations staged against it.
//! Reads inside a snapshot see the working copy (own writes included); reads
//! outside see only committed state. `commit_snapshot` replays the log against
//! the *current* committed state, re-checking uniqueness and version
//! constraints, and swaps the result in only if every mutation applies.
//!
//! Rating patches replay as column-scoped updates, so two snapshots that
//! patch different raters of the same association both land.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{
    AssociationRecord, DocumentFilter, DocumentRecord, NewDocument, NewTarget, NewTicket,
    NewTicketEvent, RatingPatch, TargetFilter, TargetRecord, TicketEventRecord, TicketFilter,
    TicketRecord,
};
use crate::traits::WorkflowStorage;

/// The full contents of a [`MemoryStorage`]. Serializable so callers can
/// persist it between processes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    #[serde(default)]
    pub tickets: BTreeMap<i64, TicketRecord>,
    #[serde(default)]
    pub ticket_events: Vec<TicketEventRecord>,
    #[serde(default)]
    pub targets: BTreeMap<i64, TargetRecord>,
    #[serde(default)]
    pub documents: BTreeMap<i64, DocumentRecord>,
    #[serde(default)]
    pub associations: BTreeMap<i64, AssociationRecord>,
}

#[derive(Debug, Clone)]
enum Mutation {
    InsertTicket(TicketRecord),
    UpdateTicket {
        expected_version: i64,
        record: TicketRecord,
    },
    InsertEvent(TicketEventRecord),
    InsertTarget(TargetRecord),
    UpdateTarget {
        expected_version: i64,
        record: TargetRecord,
    },
    InsertDocument(DocumentRecord),
    UpdateDocument {
        expected_version: i64,
        record: DocumentRecord,
    },
    AssertDocumentVersion {
        id: i64,
        expected_version: i64,
    },
    InsertAssociation(AssociationRecord),
    DeleteAssociation {
        document_id: i64,
        plan_id: i64,
    },
    PatchRating {
        document_id: i64,
        plan_id: i64,
        patch: RatingPatch,
    },
}

fn conflict(table: &str, id: i64, expected_version: i64) -> StorageError {
    StorageError::ConcurrentConflict {
        table: table.to_string(),
        id,
        expected_version,
    }
}

fn pair_key(document_id: i64, plan_id: i64) -> String {
    format!("{document_id}/{plan_id}")
}

impl MemoryState {
    fn association_mut(
        &mut self,
        document_id: i64,
        plan_id: i64,
    ) -> Option<&mut AssociationRecord> {
        self.associations
            .values_mut()
            .find(|a| a.document_id == document_id && a.plan_id == plan_id)
    }

    fn association(&self, document_id: i64, plan_id: i64) -> Option<&AssociationRecord> {
        self.associations
            .values()
            .find(|a| a.document_id == document_id && a.plan_id == plan_id)
    }

    fn associations_of(&self, document_id: i64) -> Vec<AssociationRecord> {
        let mut rows: Vec<AssociationRecord> = self
            .associations
            .values()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.plan_id);
        rows
    }

    fn max_ticket_sequence(&self, prefix: &str) -> Option<u32> {
        self.tickets
            .values()
            .filter_map(|t| t.ticket_no.strip_prefix(prefix))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .max()
    }

    fn find_target(&self, employee_id: i64, plan_id: i64) -> Option<&TargetRecord> {
        self.targets
            .values()
            .find(|t| t.employee_id == employee_id && t.plan_id == plan_id)
    }

    /// Apply one mutation, enforcing every constraint the trait documents.
    fn apply(&mut self, mutation: &Mutation) -> Result<(), StorageError> {
        match mutation {
            Mutation::InsertTicket(record) => {
                if self.tickets.values().any(|t| t.ticket_no == record.ticket_no) {
                    return Err(StorageError::DuplicateTicketNo {
                        ticket_no: record.ticket_no.clone(),
                    });
                }
                self.tickets.insert(record.id, record.clone());
            }
            Mutation::UpdateTicket {
                expected_version,
                record,
            } => {
                let stored = self
                    .tickets
                    .get_mut(&record.id)
                    .ok_or_else(|| StorageError::not_found("ticket", record.id))?;
                if stored.version != *expected_version {
                    return Err(conflict("ticket", record.id, *expected_version));
                }
                *stored = TicketRecord {
                    version: expected_version + 1,
                    ..record.clone()
                };
            }
            Mutation::InsertEvent(event) => {
                if !self.tickets.contains_key(&event.ticket_id) {
                    return Err(StorageError::not_found("ticket", event.ticket_id));
                }
                self.ticket_events.push(event.clone());
            }
            Mutation::InsertTarget(record) => {
                if self.find_target(record.employee_id, record.plan_id).is_some() {
                    return Err(StorageError::DuplicateTarget {
                        employee_id: record.employee_id,
                        plan_id: record.plan_id,
                    });
                }
                self.targets.insert(record.id, record.clone());
            }
            Mutation::UpdateTarget {
                expected_version,
                record,
            } => {
                let stored = self
                    .targets
                    .get_mut(&record.id)
                    .ok_or_else(|| StorageError::not_found("target", record.id))?;
                if stored.version != *expected_version {
                    return Err(conflict("target", record.id, *expected_version));
                }
                *stored = TargetRecord {
                    version: expected_version + 1,
                    ..record.clone()
                };
            }
            Mutation::InsertDocument(record) => {
                self.documents.insert(record.id, record.clone());
            }
            Mutation::UpdateDocument {
                expected_version,
                record,
            } => {
                let stored = self
                    .documents
                    .get_mut(&record.id)
                    .ok_or_else(|| StorageError::not_found("document", record.id))?;
                if stored.version != *expected_version {
                    return Err(conflict("document", record.id, *expected_version));
                }
                *stored = DocumentRecord {
                    version: expected_version + 1,
                    ..record.clone()
                };
            }
            Mutation::AssertDocumentVersion {
                id,
                expected_version,
            } => {
                let stored = self
                    .documents
                    .get(id)
                    .ok_or_else(|| StorageError::not_found("document", *id))?;
                if stored.version != *expected_version {
                    return Err(conflict("document", *id, *expected_version));
                }
            }
            Mutation::InsertAssociation(record) => {
                if !self.documents.contains_key(&record.document_id) {
                    return Err(StorageError::not_found("document", record.document_id));
                }
                if self.association(record.document_id, record.plan_id).is_some() {
                    return Err(StorageError::DuplicateAssociation {
                        document_id: record.document_id,
                        plan_id: record.plan_id,
                    });
                }
                self.associations.insert(record.id, record.clone());
            }
            Mutation::DeleteAssociation {
                document_id,
                plan_id,
            } => {
                let id = self
                    .association(*document_id, *plan_id)
                    .map(|a| a.id)
                    .ok_or_else(|| {
                        StorageError::not_found("association", pair_key(*document_id, *plan_id))
                    })?;
                self.associations.remove(&id);
            }
            Mutation::PatchRating {
                document_id,
                plan_id,
                patch,
            } => {
                let row = self.association_mut(*document_id, *plan_id).ok_or_else(|| {
                    StorageError::not_found("association", pair_key(*document_id, *plan_id))
                })?;
                row.apply_patch(patch);
            }
        }
        Ok(())
    }
}

/// Id generators. Like database sequences they are not transactional:
/// an aborted snapshot leaves a gap.
#[derive(Debug, Default)]
struct Sequences {
    ticket: AtomicI64,
    event: AtomicI64,
    target: AtomicI64,
    document: AtomicI64,
    association: AtomicI64,
}

impl Sequences {
    fn seeded(state: &MemoryState) -> Self {
        let max_key = |keys: Option<&i64>| keys.copied().unwrap_or(0);
        Self {
            ticket: AtomicI64::new(max_key(state.tickets.keys().next_back())),
            event: AtomicI64::new(state.ticket_events.iter().map(|e| e.id).max().unwrap_or(0)),
            target: AtomicI64::new(max_key(state.targets.keys().next_back())),
            document: AtomicI64::new(max_key(state.documents.keys().next_back())),
            association: AtomicI64::new(max_key(state.associations.keys().next_back())),
        }
    }

    fn next(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// A snapshot of [`MemoryStorage`]: a working copy plus staged mutations.
#[derive(Debug)]
pub struct MemorySnapshot {
    working: MemoryState,
    log: Vec<Mutation>,
}

impl MemorySnapshot {
    fn stage(&mut self, mutation: Mutation) -> Result<(), StorageError> {
        self.working.apply(&mutation)?;
        self.log.push(mutation);
        Ok(())
    }
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    committed: Mutex<MemoryState>,
    sequences: Sequences,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a storage holding previously exported state.
    pub fn from_state(state: MemoryState) -> Self {
        let sequences = Sequences::seeded(&state);
        Self {
            committed: Mutex::new(state),
            sequences,
        }
    }

    /// A copy of the committed state.
    pub async fn state(&self) -> MemoryState {
        self.committed.lock().await.clone()
    }
}

#[async_trait]
impl WorkflowStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        let working = self.committed.lock().await.clone();
        Ok(MemorySnapshot {
            working,
            log: Vec::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        if snapshot.log.is_empty() {
            return Ok(());
        }
        let mut committed = self.committed.lock().await;
        let mut next = committed.clone();
        for mutation in &snapshot.log {
            next.apply(mutation)?;
        }
        *committed = next;
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        // Nothing was published; dropping the working copy is the rollback.
        Ok(())
    }

    async fn max_ticket_sequence(
        &self,
        snapshot: &mut MemorySnapshot,
        prefix: &str,
    ) -> Result<Option<u32>, StorageError> {
        Ok(snapshot.working.max_ticket_sequence(prefix))
    }

    async fn insert_ticket(
        &self,
        snapshot: &mut MemorySnapshot,
        ticket: NewTicket,
    ) -> Result<TicketRecord, StorageError> {
        let record = TicketRecord {
            id: Sequences::next(&self.sequences.ticket),
            ticket_no: ticket.ticket_no,
            requester_id: ticket.requester_id,
            category: ticket.category,
            title: ticket.title,
            description: ticket.description,
            status: ticket.status,
            division_chief_name: ticket.division_chief_name,
            assigned_to: ticket.assigned_to,
            dc_approval_date: None,
            ocd_approval_date: None,
            mis_assessment: None,
            expected_completion_date: None,
            action_taken: None,
            completed_at: None,
            attended_by: None,
            feedback: 0,
            updated_at: ticket.created_at.clone(),
            created_at: ticket.created_at,
            version: 0,
        };
        snapshot.stage(Mutation::InsertTicket(record.clone()))?;
        Ok(record)
    }

    async fn get_ticket_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: i64,
    ) -> Result<TicketRecord, StorageError> {
        snapshot
            .working
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("ticket", id))
    }

    async fn update_ticket(
        &self,
        snapshot: &mut MemorySnapshot,
        expected_version: i64,
        ticket: TicketRecord,
    ) -> Result<i64, StorageError> {
        snapshot.stage(Mutation::UpdateTicket {
            expected_version,
            record: ticket,
        })?;
        Ok(expected_version + 1)
    }

    async fn insert_ticket_event(
        &self,
        snapshot: &mut MemorySnapshot,
        event: NewTicketEvent,
    ) -> Result<TicketEventRecord, StorageError> {
        let id = Sequences::next(&self.sequences.event);
        let record = TicketEventRecord {
            id,
            ticket_id: event.ticket_id,
            status_label: event.status_label,
            remarks: event.remarks,
            actor_id: event.actor_id,
            created_at: event.created_at,
            sequence: id,
        };
        snapshot.stage(Mutation::InsertEvent(record.clone()))?;
        Ok(record)
    }

    async fn find_target_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        employee_id: i64,
        plan_id: i64,
    ) -> Result<Option<TargetRecord>, StorageError> {
        Ok(snapshot.working.find_target(employee_id, plan_id).cloned())
    }

    async fn get_target_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: i64,
    ) -> Result<TargetRecord, StorageError> {
        snapshot
            .working
            .targets
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("target", id))
    }

    async fn insert_target(
        &self,
        snapshot: &mut MemorySnapshot,
        target: NewTarget,
    ) -> Result<TargetRecord, StorageError> {
        let record = TargetRecord {
            id: Sequences::next(&self.sequences.target),
            employee_id: target.employee_id,
            plan_id: target.plan_id,
            target_text: target.target_text,
            status: target.status,
            accomplishment: None,
            mov_link: None,
            self_quality: None,
            self_efficiency: None,
            self_timeliness: None,
            self_average: None,
            supervisor_quality: None,
            supervisor_efficiency: None,
            supervisor_timeliness: None,
            supervisor_average: None,
            target_submitted_at: target.target_submitted_at,
            target_reviewed_at: None,
            accomplishment_submitted_at: None,
            accomplishment_reviewed_at: None,
            version: 0,
        };
        snapshot.stage(Mutation::InsertTarget(record.clone()))?;
        Ok(record)
    }

    async fn update_target(
        &self,
        snapshot: &mut MemorySnapshot,
        expected_version: i64,
        target: TargetRecord,
    ) -> Result<i64, StorageError> {
        snapshot.stage(Mutation::UpdateTarget {
            expected_version,
            record: target,
        })?;
        Ok(expected_version + 1)
    }

    async fn insert_document(
        &self,
        snapshot: &mut MemorySnapshot,
        document: NewDocument,
    ) -> Result<DocumentRecord, StorageError> {
        let record = DocumentRecord {
            id: Sequences::next(&self.sequences.document),
            employee_id: document.employee_id,
            rating_period: document.rating_period,
            title: document.title,
            status: document.status,
            remarks: document.remarks,
            submitted_for_review_at: None,
            target_approved_at: None,
            submitted_for_rating_at: None,
            submitted_rating_at: None,
            created_at: document.created_at,
            version: 0,
        };
        snapshot.stage(Mutation::InsertDocument(record.clone()))?;
        Ok(record)
    }

    async fn get_document_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: i64,
    ) -> Result<DocumentRecord, StorageError> {
        snapshot
            .working
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("document", id))
    }

    async fn update_document(
        &self,
        snapshot: &mut MemorySnapshot,
        expected_version: i64,
        document: DocumentRecord,
    ) -> Result<i64, StorageError> {
        snapshot.stage(Mutation::UpdateDocument {
            expected_version,
            record: document,
        })?;
        Ok(expected_version + 1)
    }

    async fn assert_document_version(
        &self,
        snapshot: &mut MemorySnapshot,
        id: i64,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        snapshot.stage(Mutation::AssertDocumentVersion {
            id,
            expected_version,
        })
    }

    async fn list_associations_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        document_id: i64,
    ) -> Result<Vec<AssociationRecord>, StorageError> {
        Ok(snapshot.working.associations_of(document_id))
    }

    async fn insert_association(
        &self,
        snapshot: &mut MemorySnapshot,
        document_id: i64,
        plan_id: i64,
        created_at: &str,
    ) -> Result<AssociationRecord, StorageError> {
        let record = AssociationRecord::new(
            Sequences::next(&self.sequences.association),
            document_id,
            plan_id,
            created_at,
        );
        snapshot.stage(Mutation::InsertAssociation(record.clone()))?;
        Ok(record)
    }

    async fn delete_association(
        &self,
        snapshot: &mut MemorySnapshot,
        document_id: i64,
        plan_id: i64,
    ) -> Result<(), StorageError> {
        snapshot.stage(Mutation::DeleteAssociation {
            document_id,
            plan_id,
        })
    }

    async fn patch_rating(
        &self,
        snapshot: &mut MemorySnapshot,
        document_id: i64,
        plan_id: i64,
        patch: RatingPatch,
    ) -> Result<AssociationRecord, StorageError> {
        snapshot.stage(Mutation::PatchRating {
            document_id,
            plan_id,
            patch,
        })?;
        snapshot
            .working
            .association(document_id, plan_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("association", pair_key(document_id, plan_id)))
    }

    async fn get_ticket(&self, id: i64) -> Result<TicketRecord, StorageError> {
        self.committed
            .lock()
            .await
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("ticket", id))
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>, StorageError> {
        let state = self.committed.lock().await;
        Ok(state
            .tickets
            .values()
            .rev()
            .filter(|t| filter.requester_id.map_or(true, |r| t.requester_id == r))
            .filter(|t| filter.status.as_deref().map_or(true, |s| t.status == s))
            .filter(|t| {
                filter
                    .division_chief_name
                    .as_deref()
                    .map_or(true, |n| t.division_chief_name == n)
            })
            .cloned()
            .collect())
    }

    async fn list_ticket_events(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<TicketEventRecord>, StorageError> {
        let state = self.committed.lock().await;
        let mut events: Vec<TicketEventRecord> = state
            .ticket_events
            .iter()
            .filter(|e| e.ticket_id == ticket_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        Ok(events)
    }

    async fn get_target(&self, id: i64) -> Result<TargetRecord, StorageError> {
        self.committed
            .lock()
            .await
            .targets
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("target", id))
    }

    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<TargetRecord>, StorageError> {
        let state = self.committed.lock().await;
        Ok(state
            .targets
            .values()
            .filter(|t| {
                filter
                    .employee_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&t.employee_id))
            })
            .filter(|t| filter.status.as_deref().map_or(true, |s| t.status == s))
            .cloned()
            .collect())
    }

    async fn get_document(&self, id: i64) -> Result<DocumentRecord, StorageError> {
        self.committed
            .lock()
            .await
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("document", id))
    }

    async fn list_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        let state = self.committed.lock().await;
        Ok(state
            .documents
            .values()
            .rev()
            .filter(|d| {
                filter
                    .employee_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&d.employee_id))
            })
            .filter(|d| filter.status.as_deref().map_or(true, |s| d.status == s))
            .cloned()
            .collect())
    }

    async fn get_association(
        &self,
        document_id: i64,
        plan_id: i64,
    ) -> Result<AssociationRecord, StorageError> {
        self.committed
            .lock()
            .await
            .association(document_id, plan_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("association", pair_key(document_id, plan_id)))
    }

    async fn list_associations(
        &self,
        document_id: i64,
    ) -> Result<Vec<AssociationRecord>, StorageError> {
        Ok(self.committed.lock().await.associations_of(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;

    #[tokio::test]
    async fn memory_storage_passes_conformance_suite() {
        let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
        assert!(report.failed == 0, "{report}");
        assert!(report.total > 0);
    }

    #[tokio::test]
    async fn exported_state_round_trips_through_json() {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        let ticket = storage
            .insert_ticket(
                &mut snap,
                NewTicket {
                    ticket_no: "2025-09-0001".to_string(),
                    requester_id: 7,
                    category: "Network".to_string(),
                    title: "No uplink".to_string(),
                    description: "Lab 2 switch is down".to_string(),
                    status: "Pending Division Chief Approval".to_string(),
                    division_chief_name: "Dana Reyes".to_string(),
                    assigned_to: "MIS".to_string(),
                    created_at: "2025-09-01T08:00:00Z".to_string(),
                },
            )
            .await
            .unwrap();
        storage.commit_snapshot(snap).await.unwrap();

        let json = serde_json::to_string(&storage.state().await).unwrap();
        let state: MemoryState = serde_json::from_str(&json).unwrap();
        let restored = MemoryStorage::from_state(state);

        assert_eq!(restored.get_ticket(ticket.id).await.unwrap(), ticket);

        // Sequences resume after the highest restored id.
        let mut snap = restored.begin_snapshot().await.unwrap();
        let doc = restored
            .insert_document(
                &mut snap,
                NewDocument {
                    employee_id: 7,
                    rating_period: "Jan-Jun 2025".to_string(),
                    title: "IPCR".to_string(),
                    status: "New Target".to_string(),
                    remarks: None,
                    created_at: "2025-09-01T08:00:00Z".to_string(),
                },
            )
            .await
            .unwrap();
        let mut again = restored.begin_snapshot().await.unwrap();
        let second = restored
            .insert_ticket(
                &mut again,
                NewTicket {
                    ticket_no: "2025-09-0002".to_string(),
                    requester_id: 7,
                    category: "Network".to_string(),
                    title: "Still no uplink".to_string(),
                    description: "-".to_string(),
                    status: "Pending Division Chief Approval".to_string(),
                    division_chief_name: "Dana Reyes".to_string(),
                    assigned_to: "MIS".to_string(),
                    created_at: "2025-09-02T08:00:00Z".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(doc.id, 1);
        assert_eq!(second.id, ticket.id + 1);
    }
}
