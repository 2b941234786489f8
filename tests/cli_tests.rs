//! CLI and basic command tests

mod common;

use common::{bodyshop, run_for_id, setup_data_dir};
use predicates::prelude::*;
use tempfile::TempDir;

fn run(tmp: &TempDir, args: &[&str]) -> assert_cmd::assert::Assert {
    bodyshop().current_dir(tmp.path()).args(args).assert()
}

/// Estimate with every gate satisfied and a drop date long past
fn create_ready_opportunity(tmp: &TempDir, id: &str) {
    run(
        tmp,
        &[
            "opp", "new", id, "--make", "Honda", "--model", "Civic", "--owner", "Dana Ruiz",
            "--drop-date", "2020-01-06",
        ],
    )
    .success()
    .stdout(predicate::str::contains("Created opportunity"));
    run(
        tmp,
        &["opp", "update", id, "--approved", "true", "--voil", "true", "--four-corners", "true"],
    )
    .success();
    run(tmp, &["opp", "status", id, "estimate"]).success();
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    bodyshop()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("gated lifecycle"));
}

#[test]
fn test_short_help_displays() {
    bodyshop()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Repair-order lifecycle"));
}

#[test]
fn test_version_displays() {
    bodyshop()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bodyshop"));
}

#[test]
fn test_unknown_command_fails() {
    bodyshop()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[test]
fn test_init_creates_data_dir() {
    let tmp = TempDir::new().unwrap();

    run(&tmp, &["init"])
        .success()
        .stdout(predicate::str::contains("Initialized"));

    assert!(tmp.path().join(".bodyshop/config.yaml").is_file());
    assert!(tmp.path().join("opportunities").is_dir());
    assert!(tmp.path().join("workfiles").is_dir());
    assert!(tmp.path().join("tasks").is_dir());
}

#[test]
fn test_init_twice_reports_existing() {
    let tmp = setup_data_dir();
    run(&tmp, &["init"])
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn test_commands_outside_data_dir_fail() {
    let tmp = TempDir::new().unwrap();
    run(&tmp, &["opp", "list"])
        .failure()
        .stderr(predicate::str::contains("not a bodyshop data directory"));
}

#[test]
fn test_data_dir_flag() {
    let tmp = setup_data_dir();
    let elsewhere = TempDir::new().unwrap();
    bodyshop()
        .current_dir(elsewhere.path())
        .arg("--data-dir")
        .arg(tmp.path())
        .args(["opp", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No opportunities found").or(predicate::str::is_empty()));
}

// ============================================================================
// Opportunity Commands
// ============================================================================

#[test]
fn test_opp_new_writes_yaml() {
    let tmp = setup_data_dir();
    create_ready_opportunity(&tmp, "OPP-1");

    let yaml = std::fs::read_to_string(tmp.path().join("opportunities/OPP-1.yaml")).unwrap();
    assert!(yaml.contains("status: estimate"));
    assert!(yaml.contains("upload_deadline"));

    run(&tmp, &["opp", "ready"])
        .success()
        .stdout(predicate::str::contains("OPP-1"));
}

#[test]
fn test_opp_status_rejects_upcoming() {
    let tmp = setup_data_dir();
    run(&tmp, &["opp", "new", "OPP-1"]).success();
    run(&tmp, &["opp", "status", "OPP-1", "upcoming"])
        .failure()
        .stderr(predicate::str::contains("cannot be set"));
}

#[test]
fn test_convert_blocked_until_inspections_done() {
    let tmp = setup_data_dir();
    run(&tmp, &["opp", "new", "OPP-1", "--drop-date", "2020-01-06"]).success();
    run(&tmp, &["opp", "status", "OPP-1", "estimate"]).success();

    run(&tmp, &["opp", "convert", "OPP-1"])
        .failure()
        .stderr(predicate::str::contains("VOIL"));
}

#[test]
fn test_archive_from_stdin() {
    let tmp = setup_data_dir();
    run(&tmp, &["opp", "new", "OPP-1"]).success();
    run(&tmp, &["opp", "new", "OPP-2"]).success();

    bodyshop()
        .current_dir(tmp.path())
        .args(["opp", "archive"])
        .write_stdin("OPP-1\nOPP-2\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Archived OPP-2"));

    run(&tmp, &["opp", "list", "-s", "archived", "-o", "id"])
        .success()
        .stdout(predicate::str::contains("OPP-1").and(predicate::str::contains("OPP-2")));
}

#[test]
fn test_deadline_closed_for_old_drop() {
    let tmp = setup_data_dir();
    run(&tmp, &["opp", "new", "OPP-1", "--drop-date", "2020-01-06"]).success();
    run(&tmp, &["opp", "deadline", "OPP-1"])
        .success()
        .stdout(predicate::str::contains("closed"));
}

// ============================================================================
// Workfile Commands
// ============================================================================

#[test]
fn test_workfile_full_cycle() {
    let tmp = setup_data_dir();
    create_ready_opportunity(&tmp, "OPP-1");

    let wf = run_for_id(&tmp, &["opp", "convert", "OPP-1"]);
    assert!(wf.starts_with("WF-"), "unexpected id: {}", wf);

    run(&tmp, &["wf", "assign", &wf, "--tech", "TECH-A", "--name", "Alex"])
        .success()
        .stdout(predicate::str::contains("Alex"));
    run(&tmp, &["wf", "start", &wf])
        .success()
        .stdout(predicate::str::contains("in_progress"));

    run(&tmp, &["wf", "qc", &wf])
        .failure()
        .stderr(predicate::str::contains("pre-scan"));

    run(&tmp, &["wf", "check", &wf, "pre_scan"]).success();
    run(&tmp, &["wf", "check", &wf, "post_scan"]).success();
    run(&tmp, &["wf", "qc", &wf]).success();
    run(&tmp, &["wf", "check", &wf, "qc"]).success();
    run(&tmp, &["wf", "ready", &wf])
        .success()
        .stdout(predicate::str::contains("ready_for_pickup"));
    run(&tmp, &["wf", "archive", &wf, "--yes"])
        .success()
        .stdout(predicate::str::contains("Cycle time"));

    run(&tmp, &["wf", "list", "-s", "archived", "-o", "id"])
        .success()
        .stdout(predicate::str::contains(wf.as_str()));
}

#[test]
fn test_start_without_technicians_fails() {
    let tmp = setup_data_dir();
    create_ready_opportunity(&tmp, "OPP-1");
    let wf = run_for_id(&tmp, &["opp", "convert", "OPP-1"]);

    run(&tmp, &["wf", "start", &wf])
        .failure()
        .stderr(predicate::str::contains("no technician available"));
}

#[test]
fn test_workload_lists_assigned_technicians() {
    let tmp = setup_data_dir();
    create_ready_opportunity(&tmp, "OPP-1");
    let wf = run_for_id(&tmp, &["opp", "convert", "OPP-1"]);
    run(&tmp, &["task", "new", "Replace quarter panel", "--wf", &wf, "--hours", "6.5"]).success();
    run(&tmp, &["wf", "assign", &wf, "--tech", "TECH-A", "--name", "Alex"]).success();

    run(&tmp, &["tech", "workload", "-o", "json"])
        .success()
        .stdout(predicate::str::contains("TECH-A").and(predicate::str::contains("6.5")));
}

// ============================================================================
// Task Commands
// ============================================================================

#[test]
fn test_total_loss_marks_tasks_urgent() {
    let tmp = setup_data_dir();
    run(&tmp, &["opp", "new", "OPP-1"]).success();
    run(&tmp, &["task", "new", "Call adjuster", "--opp", "OPP-1", "-p", "low"]).success();

    run(&tmp, &["opp", "status", "OPP-1", "total_loss"])
        .success()
        .stdout(predicate::str::contains("escalated"));

    run(&tmp, &["task", "list", "--opp", "OPP-1", "-o", "json"])
        .success()
        .stdout(predicate::str::contains("urgent").and(predicate::str::contains("total loss")));
}

#[test]
fn test_task_new_requires_existing_target() {
    let tmp = setup_data_dir();
    run(&tmp, &["task", "new", "Orphan", "--wf", "WF-NOPE"])
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_task_done_and_remove() {
    let tmp = setup_data_dir();
    let id = run_for_id(&tmp, &["task", "new", "Wash car"]);

    run(&tmp, &["task", "done", &id])
        .success()
        .stdout(predicate::str::contains("completed"));
    run(&tmp, &["task", "list", "-o", "id"])
        .success()
        .stdout(predicate::str::contains(id.as_str()).not());
    run(&tmp, &["task", "remove", &id, "--yes"]).success();
    run(&tmp, &["task", "show", &id]).failure();
}

// ============================================================================
// Metrics and completions
// ============================================================================

#[test]
fn test_metrics_summary_json() {
    let tmp = setup_data_dir();
    run(&tmp, &["opp", "new", "OPP-1"]).success();
    run(&tmp, &["metrics", "summary", "-o", "json"])
        .success()
        .stdout(predicate::str::contains("parts_return_rate"));
}

#[test]
fn test_archived_workfile_rejects_update() {
    let tmp = setup_data_dir();
    create_ready_opportunity(&tmp, "OPP-1");
    let wf = run_for_id(&tmp, &["opp", "convert", "OPP-1"]);
    run(&tmp, &["wf", "assign", &wf, "--tech", "TECH-A"]).success();
    run(&tmp, &["wf", "start", &wf]).success();
    for checkpoint in ["pre_scan", "post_scan"] {
        run(&tmp, &["wf", "check", &wf, checkpoint]).success();
    }
    run(&tmp, &["wf", "qc", &wf]).success();
    run(&tmp, &["wf", "check", &wf, "qc"]).success();
    run(&tmp, &["wf", "ready", &wf]).success();
    run(&tmp, &["wf", "archive", &wf, "--yes"]).success();

    run(&tmp, &["wf", "update", &wf, "--notes", "reopen"])
        .failure()
        .stderr(predicate::str::contains("archived"));
}

#[test]
fn test_paint_risk_after_forecast_update() {
    let tmp = setup_data_dir();
    create_ready_opportunity(&tmp, "OPP-1");
    let wf = run_for_id(&tmp, &["opp", "convert", "OPP-1"]);

    run(&tmp, &["metrics", "paint-risks", "-o", "id"])
        .success()
        .stdout(predicate::str::contains(wf.as_str()).not());

    run(
        &tmp,
        &["wf", "update", &wf, "--paint", "true", "--paint-weather", "true", "--forecast", "rain"],
    )
    .success();
    run(&tmp, &["metrics", "paint-risks", "-o", "id"])
        .success()
        .stdout(predicate::str::contains(wf.as_str()));
}

#[test]
fn test_completions_bash() {
    bodyshop()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bodyshop"));
}
