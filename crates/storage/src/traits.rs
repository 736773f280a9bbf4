use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{
    AssociationRecord, DocumentFilter, DocumentRecord, NewDocument, NewTarget, NewTicket,
    NewTicketEvent, RatingPatch, TargetFilter, TargetRecord, TicketEventRecord, TicketFilter,
    TicketRecord,
};

/// The storage trait for officeflow workflow backends.
///
/// A `WorkflowStorage` implementation provides durable, transactional storage
/// for tickets and their audit trail, direct performance targets,
/// performance documents and their rating associations.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()`: start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)`: commit and consume the transaction
///    OR `abort_snapshot(snapshot)`: roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, the underlying transaction
/// MUST be rolled back.
///
/// ## Constraints
///
/// - `ticket_no` is unique. A commit that would duplicate it fails with
///   `StorageError::DuplicateTicketNo`.
/// - Targets are unique per (employee_id, plan_id); associations per
///   (document_id, plan_id).
/// - `update_*` methods are optimistic: `UPDATE ... WHERE version = expected`.
///   A mismatch yields `StorageError::ConcurrentConflict`, either immediately
///   or at commit.
/// - `patch_rating` is a column-scoped partial update, never a full-row write.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// across async task boundaries.
#[async_trait]
pub trait WorkflowStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Tickets (within snapshot) ─────────────────────────────────────────────

    /// Highest numeric suffix among ticket numbers starting with `prefix`
    /// (e.g. `"2025-09-"`), or `None` when no such ticket exists.
    async fn max_ticket_sequence(
        &self,
        snapshot: &mut Self::Snapshot,
        prefix: &str,
    ) -> Result<Option<u32>, StorageError>;

    /// Insert a ticket at version 0. The backend assigns the id.
    async fn insert_ticket(
        &self,
        snapshot: &mut Self::Snapshot,
        ticket: NewTicket,
    ) -> Result<TicketRecord, StorageError>;

    /// Read a ticket, locking it for the rest of the snapshot.
    async fn get_ticket_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        id: i64,
    ) -> Result<TicketRecord, StorageError>;

    /// Replace a ticket row if its stored version is `expected_version`.
    ///
    /// Returns the new version number on success.
    async fn update_ticket(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_version: i64,
        ticket: TicketRecord,
    ) -> Result<i64, StorageError>;

    /// Append one audit event.
    ///
    /// Must be inserted in the SAME snapshot as the ticket change it records.
    async fn insert_ticket_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: NewTicketEvent,
    ) -> Result<TicketEventRecord, StorageError>;

    // ── Targets (within snapshot) ─────────────────────────────────────────────

    /// Look up the target for (employee, plan), locking it if present.
    async fn find_target_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        employee_id: i64,
        plan_id: i64,
    ) -> Result<Option<TargetRecord>, StorageError>;

    async fn get_target_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        id: i64,
    ) -> Result<TargetRecord, StorageError>;

    async fn insert_target(
        &self,
        snapshot: &mut Self::Snapshot,
        target: NewTarget,
    ) -> Result<TargetRecord, StorageError>;

    async fn update_target(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_version: i64,
        target: TargetRecord,
    ) -> Result<i64, StorageError>;

    // ── Documents (within snapshot) ───────────────────────────────────────────

    async fn insert_document(
        &self,
        snapshot: &mut Self::Snapshot,
        document: NewDocument,
    ) -> Result<DocumentRecord, StorageError>;

    async fn get_document_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        id: i64,
    ) -> Result<DocumentRecord, StorageError>;

    async fn update_document(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_version: i64,
        document: DocumentRecord,
    ) -> Result<i64, StorageError>;

    /// Require the document to still be at `expected_version` when the
    /// snapshot commits, without bumping it. Fails with `ConcurrentConflict`
    /// at commit if another snapshot updated the document first.
    async fn assert_document_version(
        &self,
        snapshot: &mut Self::Snapshot,
        id: i64,
        expected_version: i64,
    ) -> Result<(), StorageError>;

    // ── Rating associations (within snapshot) ─────────────────────────────────

    /// All associations of a document as seen by this snapshot, ordered by plan id.
    async fn list_associations_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        document_id: i64,
    ) -> Result<Vec<AssociationRecord>, StorageError>;

    /// Create an empty association. Fails with `DuplicateAssociation` if the
    /// pair already exists.
    async fn insert_association(
        &self,
        snapshot: &mut Self::Snapshot,
        document_id: i64,
        plan_id: i64,
        created_at: &str,
    ) -> Result<AssociationRecord, StorageError>;

    /// Remove an association. Fails with `NotFound` if it does not exist.
    async fn delete_association(
        &self,
        snapshot: &mut Self::Snapshot,
        document_id: i64,
        plan_id: i64,
    ) -> Result<(), StorageError>;

    /// Apply a column-scoped rating patch. Returns the row as seen by the
    /// snapshot after the patch.
    async fn patch_rating(
        &self,
        snapshot: &mut Self::Snapshot,
        document_id: i64,
        plan_id: i64,
        patch: RatingPatch,
    ) -> Result<AssociationRecord, StorageError>;

    // ── Query operations (outside snapshot) ───────────────────────────────────

    async fn get_ticket(&self, id: i64) -> Result<TicketRecord, StorageError>;

    /// Tickets matching `filter`, newest first.
    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>, StorageError>;

    /// A ticket's events in causal order (created_at, then sequence).
    async fn list_ticket_events(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<TicketEventRecord>, StorageError>;

    async fn get_target(&self, id: i64) -> Result<TargetRecord, StorageError>;

    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<TargetRecord>, StorageError>;

    async fn get_document(&self, id: i64) -> Result<DocumentRecord, StorageError>;

    async fn list_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<DocumentRecord>, StorageError>;

    async fn get_association(
        &self,
        document_id: i64,
        plan_id: i64,
    ) -> Result<AssociationRecord, StorageError>;

    /// Associations of a document, ordered by plan id.
    async fn list_associations(
        &self,
        document_id: i64,
    ) -> Result<Vec<AssociationRecord>, StorageError>;
}
