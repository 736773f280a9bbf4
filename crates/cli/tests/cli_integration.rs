//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `officeflow` binary against request,
//! directory and state files in a temporary directory.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const DIRECTORY: &str = r#"{
    "employees": [
        {"id": 1, "name": "Ana Reyes", "division": "MIS"},
        {"id": 2, "name": "Ben Cruz", "division": "MIS"},
        {"id": 3, "name": "Carla Diaz", "division": "MIS"},
        {"id": 4, "name": "Dan Uy"}
    ],
    "divisions": [
        {"name": "MIS", "chief_id": 2,
         "weights": {"strategic": 20, "core": 70, "support": 10}}
    ],
    "plans": [
        {"id": 1, "success_indicator": "Helpdesk tickets closed", "function_type": "core"},
        {"id": 2, "success_indicator": "ICT plan drafted", "function_type": "strategic"}
    ]
}"#;

const ANA: &str = r#"{"id": 1, "name": "Ana Reyes", "role": "employee"}"#;
const BEN: &str = r#"{"id": 2, "name": "Ben Cruz", "role": "division_chief"}"#;
const DAN: &str = r#"{"id": 4, "name": "Dan Uy", "role": "ocd"}"#;

/// Helper: create a Command for the `officeflow` binary with logging quiet.
fn officeflow() -> Command {
    let mut cmd = cargo_bin_cmd!("officeflow");
    cmd.env_remove("OFFICEFLOW_LOG")
        .env_remove("OFFICEFLOW_RATING_SCALE")
        .env_remove("OFFICEFLOW_ALLOCATION_RETRIES")
        .env_remove("OFFICEFLOW_UTC_OFFSET_HOURS");
    cmd
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("directory.json"), DIRECTORY).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_requests(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn run(&self, requests: &PathBuf) -> Command {
        let mut cmd = officeflow();
        cmd.arg("run")
            .arg(requests)
            .arg("--state")
            .arg(self.path("state.json"))
            .arg("--directory")
            .arg(self.path("directory.json"))
            .args(["--now", "2025-09-15T10:00:00Z"]);
        cmd
    }
}

fn ticket_walk() -> String {
    format!(
        r#"[
        {{"op": "create_ticket", "actor": {ANA}, "category": "Hardware",
          "title": "Printer jams", "description": "Duplex jobs jam.",
          "division_chief_name": "Ben Cruz", "assigned_to": "MIS"}},
        {{"op": "division_chief_action", "actor": {BEN}, "ticket_id": 1, "decision": "approve"}},
        {{"op": "ocd_action", "actor": {DAN}, "ticket_id": 1, "decision": "approve"}}
    ]"#
    )
}

// ──────────────────────────────────────────────
// 1. Help and config
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    officeflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("IT tickets and performance reviews"));
}

#[test]
fn config_prints_defaults() {
    officeflow()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"rating_scale = "percent""#))
        .stdout(predicate::str::contains("allocation_retries = 3"));
}

#[test]
fn config_applies_environment_overrides() {
    officeflow()
        .args(["config", "--output", "json"])
        .env("OFFICEFLOW_RATING_SCALE", "five_point")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""rating_scale": "five_point""#));
}

#[test]
fn config_rejects_bad_environment_value() {
    officeflow()
        .arg("config")
        .env("OFFICEFLOW_UTC_OFFSET_HOURS", "eight")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("OFFICEFLOW_UTC_OFFSET_HOURS"));
}

// ──────────────────────────────────────────────
// 2. Run subcommand
// ──────────────────────────────────────────────

#[test]
fn run_replays_requests_and_saves_state() {
    let ws = Workspace::new();
    let requests = ws.write_requests("walk.json", &ticket_walk());
    ws.run(&requests)
        .assert()
        .success()
        .stdout(predicate::str::contains("[0] create_ticket: ticket 2025-09-0001 (#1)"))
        .stdout(predicate::str::contains(
            "[2] ocd_action: ticket 2025-09-0001 (#1) Printer jams: In Progress",
        ));

    let saved = fs::read_to_string(ws.path("state.json")).unwrap();
    assert!(saved.contains("2025-09-0001"));
}

#[test]
fn state_carries_over_between_runs() {
    let ws = Workspace::new();
    let requests = ws.write_requests("walk.json", &ticket_walk());
    ws.run(&requests).assert().success();

    let create_only = format!(
        r#"[{{"op": "create_ticket", "actor": {ANA}, "category": "Software",
             "title": "Mail client", "description": "Cannot sync.",
             "division_chief_name": "Ben Cruz", "assigned_to": "MIS"}}]"#
    );
    let second = ws.write_requests("second.json", &create_only);
    ws.run(&second)
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-09-0002"));
}

#[test]
fn json_output_reports_each_request() {
    let ws = Workspace::new();
    let requests = ws.write_requests("walk.json", &ticket_walk());
    let assert = ws.run(&requests).args(["--output", "json"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["ok"], true);
    assert_eq!(lines[0]["result"]["ticket_no"], "2025-09-0001");
    assert_eq!(lines[2]["result"]["status"], "In Progress");
}

#[test]
fn failed_request_exits_1_and_keeps_earlier_work() {
    let ws = Workspace::new();
    let body = format!(
        r#"[
        {{"op": "create_ticket", "actor": {ANA}, "category": "Hardware",
          "title": "Printer jams", "description": "Duplex jobs jam.",
          "division_chief_name": "Ben Cruz", "assigned_to": "MIS"}},
        {{"op": "complete_ticket", "actor": {ANA}, "ticket_id": 1}}
    ]"#
    );
    let requests = ws.write_requests("bad.json", &body);
    let assert = ws
        .run(&requests)
        .args(["--output", "json"])
        .assert()
        .failure()
        .code(1);
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let last: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["ok"], false);
    assert_eq!(last["kind"], "authorization");
    assert_eq!(last["error"], "not permitted");

    let saved = fs::read_to_string(ws.path("state.json")).unwrap();
    assert!(saved.contains("2025-09-0001"));
}

#[test]
fn validation_errors_list_fields() {
    let ws = Workspace::new();
    let body = format!(
        r#"[{{"op": "create_document", "actor": {ANA}, "rating_period": "", "title": ""}}]"#
    );
    let requests = ws.write_requests("doc.json", &body);
    ws.run(&requests)
        .args(["--output", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""kind":"validation""#))
        .stdout(predicate::str::contains(r#""field":"rating_period""#));
}

#[test]
fn performance_review_round_trip() {
    let ws = Workspace::new();
    let body = format!(
        r#"[
        {{"op": "create_document", "actor": {ANA}, "rating_period": "Jan-Jun 2025", "title": "IPCR"}},
        {{"op": "associate_plans", "actor": {ANA}, "document_id": 1, "plan_ids": [1, 2]}},
        {{"op": "submit_for_review", "actor": {ANA}, "document_id": 1}},
        {{"op": "approve_targets", "actor": {BEN}, "document_id": 1}},
        {{"op": "rate_dimension", "actor": {ANA}, "document_id": 1, "plan_id": 1,
          "rater": "self", "quality": 3, "efficiency": 4, "timeliness": 5}},
        {{"op": "rate_dimension", "actor": {BEN}, "document_id": 1, "plan_id": 1,
          "rater": "supervisor", "quality": 5, "efficiency": 4, "timeliness": 3}},
        {{"op": "document_score", "actor": {ANA}, "document_id": 1}}
    ]"#
    );
    let requests = ws.write_requests("review.json", &body);
    ws.run(&requests)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[5] rate_dimension: document #1 plan 1: self 4.00, supervisor 4.00",
        ))
        .stdout(predicate::str::contains("[6] document_score: document #1 score 4.00"));
}

#[test]
fn invalid_requests_file_exits_1() {
    let ws = Workspace::new();
    let requests = ws.write_requests("broken.json", r#"[{"op": "nope"}]"#);
    ws.run(&requests)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid requests"));
}

#[test]
fn missing_directory_exits_1() {
    let ws = Workspace::new();
    let requests = ws.write_requests("walk.json", &ticket_walk());
    officeflow()
        .arg("run")
        .arg(&requests)
        .arg("--directory")
        .arg(ws.path("nowhere.json"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nowhere.json"));
}

// ──────────────────────────────────────────────
// 3. History subcommand
// ──────────────────────────────────────────────

#[test]
fn history_prints_the_trail() {
    let ws = Workspace::new();
    let requests = ws.write_requests("walk.json", &ticket_walk());
    ws.run(&requests).assert().success();

    officeflow()
        .args(["history", "1", "--state"])
        .arg(ws.path("state.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Submitted IT Job Request"))
        .stdout(predicate::str::contains("Division Chief Approved"))
        .stdout(predicate::str::contains("OCD Approved"));
}

#[test]
fn history_of_unknown_ticket_exits_1() {
    let ws = Workspace::new();
    officeflow()
        .args(["history", "42", "--state"])
        .arg(ws.path("state.json"))
        .assert()
        .failure()
        .code(1);
}

#[test]
fn target_queues_follow_the_accomplishment() {
    let ws = Workspace::new();
    let body = format!(
        r#"[
        {{"op": "submit_target", "actor": {ANA}, "plan_id": 1, "text": "Close 200 tickets"}},
        {{"op": "approve_target", "actor": {BEN}, "target_id": 1}},
        {{"op": "submit_accomplishment", "actor": {ANA}, "target_id": 1,
          "accomplishment": "Closed 212 tickets", "quality": 80, "efficiency": 90, "timeliness": 70}},
        {{"op": "pending_accomplishments", "actor": {BEN}}},
        {{"op": "targets", "actor": {ANA}}}
    ]"#
    );
    let requests = ws.write_requests("targets.json", &body);
    ws.run(&requests)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[3] pending_accomplishments: 1 found\n  target #1 employee 1 plan 1: approved (self 80.00, supervisor -)",
        ))
        .stdout(predicate::str::contains("[4] targets: 1 found"));
}
