pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryState, MemoryStorage};
pub use record::{
    AssociationRecord, DocumentFilter, DocumentRecord, NewDocument, NewTarget, NewTicket,
    NewTicketEvent, Rater, RatingColumns, RatingPatch, TargetFilter, TargetRecord,
    TicketEventRecord, TicketFilter, TicketRecord,
};
pub use traits::WorkflowStorage;
