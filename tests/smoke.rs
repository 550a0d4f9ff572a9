//! Smoke tests -- verify the binary runs and key subcommands exist.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("batchwarden")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "Single-instance periodic batch scheduler",
        ));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("batchwarden")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("batchwarden"));
}

#[test]
fn test_run_subcommand_exists() {
    Command::cargo_bin("batchwarden")
        .unwrap()
        .args(["run", "--help"])
        .assert()
        .success();
}

#[test]
fn test_history_subcommand_exists() {
    Command::cargo_bin("batchwarden")
        .unwrap()
        .args(["history", "--help"])
        .assert()
        .success();
}

#[test]
fn test_check_previews_fire_instants() {
    Command::cargo_bin("batchwarden")
        .unwrap()
        .args(["check", "--schedule", "30m", "--count", "3"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Next 3 fire instants"));
}

#[test]
fn test_check_rejects_invalid_schedule() {
    Command::cargo_bin("batchwarden")
        .unwrap()
        .args(["check", "--schedule", "not a schedule"])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_once_runs_job_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("records.db");
    Command::cargo_bin("batchwarden")
        .unwrap()
        .args(["once", "--db", db.to_str().unwrap(), "--"])
        .args(["/bin/sh", "-c", "echo done"])
        .assert()
        .success();
}

#[cfg(unix)]
#[test]
fn test_once_propagates_job_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("records.db");
    Command::cargo_bin("batchwarden")
        .unwrap()
        .args(["once", "--db", db.to_str().unwrap(), "--"])
        .args(["/bin/sh", "-c", "exit 7"])
        .assert()
        .code(7);
}

#[cfg(unix)]
#[test]
fn test_history_shows_recorded_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("records.db");
    let db = db.to_str().unwrap();

    Command::cargo_bin("batchwarden")
        .unwrap()
        .args(["once", "--db", db, "--"])
        .args(["/bin/sh", "-c", "true"])
        .assert()
        .success();

    Command::cargo_bin("batchwarden")
        .unwrap()
        .args(["history", "--db", db])
        .assert()
        .success()
        .stdout(predicates::str::contains("success"));
}
