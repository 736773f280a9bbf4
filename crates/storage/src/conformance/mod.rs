//! Behavioral checks shared by every `WorkflowStorage` backend.
//!
//! Each check gets a fresh store from the caller's factory and returns a
//! [`TestResult`]; nothing panics, so one broken guarantee does not hide the
//! rest. Categories:
//!
//! - `init`: id sequences and the uniqueness rules on insert
//! - `snapshot`: a snapshot's writes stay private until commit
//! - `commit`: a commit lands every write or none of them
//! - `version`: stale `expected_version` updates are refused
//! - `audit`: ticket events commit with the ticket and list in order
//! - `rating`: rating patches touch only their own columns
//! - `concurrent`: the same guarantees under real task races
//! - `error`: missing rows and bad versions map to the right variant
//!
//! ```ignore
//! let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
//! assert_eq!(report.failed, 0, "{report}");
//! ```

mod audit;
mod commit;
mod concurrent;
mod error;
mod init;
mod rating;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use rust_decimal::Decimal;

use crate::record::{
    DocumentRecord, NewDocument, NewTarget, NewTicket, NewTicketEvent, Rater, RatingColumns,
    RatingPatch, TicketRecord,
};
use crate::WorkflowStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "insert_ticket_starts_at_version_0").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(audit::run_audit_tests(&factory).await);
    results.extend(rating::run_rating_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Fixture rows ────────────────────────────────────────────────────────────

fn make_ticket(ticket_no: &str) -> NewTicket {
    NewTicket {
        ticket_no: ticket_no.to_string(),
        requester_id: 100,
        category: "Hardware".to_string(),
        title: "Printer jam".to_string(),
        description: "Room 204 printer jams on every page".to_string(),
        status: "Pending Division Chief Approval".to_string(),
        division_chief_name: "Chief".to_string(),
        assigned_to: "MIS".to_string(),
        created_at: "2025-09-01T00:00:00Z".to_string(),
    }
}

fn make_event(ticket_id: i64, label: &str, created_at: &str) -> NewTicketEvent {
    NewTicketEvent {
        ticket_id,
        status_label: label.to_string(),
        remarks: format!("{label} remarks"),
        actor_id: 100,
        created_at: created_at.to_string(),
    }
}

fn make_target(employee_id: i64, plan_id: i64) -> NewTarget {
    NewTarget {
        employee_id,
        plan_id,
        target_text: "Resolve 95% of tickets within 3 days".to_string(),
        status: "submitted".to_string(),
        target_submitted_at: Some("2025-09-01T00:00:00Z".to_string()),
    }
}

fn make_document(employee_id: i64) -> NewDocument {
    NewDocument {
        employee_id,
        rating_period: "July-December 2025".to_string(),
        title: "IPCR".to_string(),
        status: "New Target".to_string(),
        remarks: None,
        created_at: "2025-09-01T00:00:00Z".to_string(),
    }
}

fn make_patch(rater: Rater, q: i64, e: i64, t: i64, avg: Decimal) -> RatingPatch {
    RatingPatch {
        rater,
        columns: RatingColumns {
            quality: Some(Decimal::from(q)),
            efficiency: Some(Decimal::from(e)),
            timeliness: Some(Decimal::from(t)),
            average: Some(avg),
        },
        accomplishment: None,
        mov_link: None,
        updated_at: "2025-09-02T00:00:00Z".to_string(),
    }
}

/// Insert and commit one ticket.
async fn seed_ticket<S: WorkflowStorage>(s: &S, ticket_no: &str) -> Result<TicketRecord, String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let ticket = s
        .insert_ticket(&mut snap, make_ticket(ticket_no))
        .await
        .map_err(|e| format!("insert ticket: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit ticket: {e}"))?;
    Ok(ticket)
}

/// Insert and commit one document associated with `plan_ids`.
async fn seed_document<S: WorkflowStorage>(
    s: &S,
    employee_id: i64,
    plan_ids: &[i64],
) -> Result<DocumentRecord, String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let doc = s
        .insert_document(&mut snap, make_document(employee_id))
        .await
        .map_err(|e| format!("insert document: {e}"))?;
    for plan_id in plan_ids {
        s.insert_association(&mut snap, doc.id, *plan_id, "2025-09-01T00:00:00Z")
            .await
            .map_err(|e| format!("insert association {plan_id}: {e}"))?;
    }
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit document: {e}"))?;
    Ok(doc)
}
