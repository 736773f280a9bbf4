//! officeflow workflow engine -- IT service tickets, direct performance
//! targets and performance documents with two-sided ratings.
//!
//! Every operation takes an explicit [`Actor`], checks the role table in
//! [`policy`], validates its input, and then runs its guards and writes in
//! one storage snapshot that is committed or aborted as a whole.

pub mod actor;
pub mod aggregate;
pub mod clock;
pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod identifier;
pub mod pivot;
pub mod policy;
pub mod rating;
pub mod scoring;
pub mod service;
pub mod target;
pub mod ticket;

pub use actor::{Actor, Role};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use directory::{
    Directory, DirectoryData, DirectoryError, FunctionType, PerformancePlan, StaticDirectory,
    WeightDistribution,
};
pub use document::{DocumentRequest, DocumentScope, DocumentStatus};
pub use error::{FieldError, WorkflowError};
pub use identifier::{Period, TicketNo};
pub use pivot::{AssociationMode, RatingEntry};
pub use policy::Action;
pub use rating::{Dimensions, RatingScale};
pub use scoring::DocumentScore;
pub use service::Engine;
pub use target::{AccomplishmentReport, TargetStatus};
pub use ticket::{Decision, MisUpdate, TicketHistory, TicketRequest, TicketScope, TicketStatus};
