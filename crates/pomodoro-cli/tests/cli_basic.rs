//! Basic CLI E2E tests.
//!
//! Each test points HOME at a fresh temp dir so config and database files
//! never touch the real user directory.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

fn cli(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pomodoro-cli"));
    cmd.env("HOME", home)
        .env_remove("POMODORO_ENV")
        .env_remove("RUST_LOG");
    cmd
}

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = cli(home)
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_config_list_shows_defaults() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "list"]);
    assert_eq!(code, 0);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["timer"]["work_minutes"], 25);
    assert_eq!(json["timer"]["short_break_minutes"], 5);
    assert_eq!(json["timer"]["long_break_minutes"], 15);
    assert_eq!(json["timer"]["cycles_before_long_break"], 4);
    assert_eq!(json["auto_start_next"], false);
}

#[test]
fn test_config_set_then_get() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["config", "set", "timer.work_minutes", "50"]);
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "timer.work_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "50");

    assert!(home.path().join(".config/pomodoro/config.toml").exists());
}

#[test]
fn test_config_set_rejects_zero_duration() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "timer.short_break_minutes", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "timer.short_break_minutes"]);
    assert_eq!(stdout.trim(), "5");
}

#[test]
fn test_config_get_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "timer.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_stats_today_starts_empty() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["stats", "today"]);
    assert_eq!(code, 0);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["work_sessions"], 0);
    assert_eq!(json["work_minutes"], 0);
}

#[test]
fn test_history_list_and_clear() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["history", "list", "--kind", "work"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json, serde_json::json!([]));

    let (stdout, _, code) = run_cli(home.path(), &["history", "clear"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("removed 0 sessions"));
}

#[test]
fn test_history_rejects_unknown_kind() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["history", "list", "--kind", "lunch"]);
    assert_ne!(code, 0);
}

#[test]
fn test_run_reads_commands_from_stdin() {
    let home = tempfile::tempdir().unwrap();
    let mut child = cli(home.path())
        .args(["run", "--ephemeral", "--task", "9"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"select short\nstatus\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Work 25:00 [idle]"));
    assert!(stdout.contains("\"display\":\"05:00\""));
    assert!(stdout.contains("\"linked_task_id\":9"));
    assert!(stdout.contains("stopped, 0 session(s) saved"));
}

#[test]
fn test_run_reports_bad_commands_and_keeps_going() {
    let home = tempfile::tempdir().unwrap();
    let mut child = cli(home.path())
        .args(["run", "--ephemeral", "--phase", "long-break"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"dance\nstatus\n")
        .unwrap();
    // Closing stdin ends the session like `quit`.
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("error: unknown command: dance"));
    assert!(stdout.contains("\"display\":\"15:00\""));
}

#[test]
fn test_run_rejects_phase_change_while_running() {
    let home = tempfile::tempdir().unwrap();
    let mut child = cli(home.path())
        .args(["run", "--ephemeral"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"start\nselect long\ntoday\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("error: Timer error: Cannot change phase while the timer is running"));
    assert!(stdout.contains("\"work_sessions\":0"));
}
