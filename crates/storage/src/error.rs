/// All errors that can be returned by a WorkflowStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another snapshot modified
    /// the row concurrently, so the expected version was not found.
    #[error("concurrent conflict on {table} {id}: expected version {expected_version}")]
    ConcurrentConflict {
        table: String,
        id: i64,
        expected_version: i64,
    },

    /// No row with the given key.
    #[error("{table} not found: {key}")]
    NotFound { table: String, key: String },

    /// A ticket with this number was already committed.
    #[error("duplicate ticket number: {ticket_no}")]
    DuplicateTicketNo { ticket_no: String },

    /// A target already exists for this (employee, plan) pair.
    #[error("target already exists for employee {employee_id} and plan {plan_id}")]
    DuplicateTarget { employee_id: i64, plan_id: i64 },

    /// An association already exists for this (document, plan) pair.
    #[error("plan {plan_id} already associated with document {document_id}")]
    DuplicateAssociation { document_id: i64, plan_id: i64 },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn not_found(table: &str, key: impl ToString) -> Self {
        StorageError::NotFound {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    /// Whether retrying the whole snapshot may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::ConcurrentConflict { .. }
                | StorageError::DuplicateTicketNo { .. }
                | StorageError::DuplicateTarget { .. }
                | StorageError::DuplicateAssociation { .. }
        )
    }
}
