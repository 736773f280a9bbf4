use std::fmt;

use officeflow_storage::StorageError;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by every workflow operation.
///
/// Any error means the operation's snapshot was aborted: entity state and
/// the audit trail are exactly as they were before the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid input: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// Deliberately carries no detail. The failed check is logged instead.
    #[error("not permitted")]
    Authorization,

    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("cannot {attempted} while {current}")]
    State { current: String, attempted: String },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl WorkflowError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        WorkflowError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub fn state(current: impl fmt::Display, attempted: &str) -> Self {
        WorkflowError::State {
            current: current.to_string(),
            attempted: attempted.to_string(),
        }
    }

    /// Conflicts clear up on a fresh attempt; nothing else does.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Conflict(_))
    }
}

impl From<StorageError> for WorkflowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { table, key } => {
                WorkflowError::NotFound { kind: table, id: key }
            }
            StorageError::Backend(msg) => WorkflowError::Storage(msg),
            other if other.is_conflict() => WorkflowError::Conflict(other.to_string()),
            other => WorkflowError::Storage(other.to_string()),
        }
    }
}

/// Collects field errors so one response reports every bad field.
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<FieldError>);

impl Violations {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub(crate) fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    /// Required, non-blank, at most `max` characters.
    pub(crate) fn required_text(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.add(field, "is required");
        } else {
            self.max_len(field, value, max);
        }
    }

    pub(crate) fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("must be at most {max} characters"));
        }
    }

    /// An absolute http(s) URL of at most `max` characters.
    pub(crate) fn url(&mut self, field: &str, value: &str, max: usize) {
        let rest = value
            .strip_prefix("https://")
            .or_else(|| value.strip_prefix("http://"));
        let host = rest.and_then(|r| r.split(|c: char| matches!(c, '/' | '?' | '#')).next());
        let well_formed = matches!(host, Some(h) if !h.is_empty())
            && !value.chars().any(char::is_whitespace);
        if !well_formed {
            self.add(field, "must be an http or https URL");
        } else {
            self.max_len(field, value, max);
        }
    }

    pub(crate) fn into_result(self) -> Result<(), WorkflowError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation(self.0))
        }
    }
}
