//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tempfile::TempDir;

struct Cli {
    dir: TempDir,
}

#[derive(Debug, Deserialize)]
struct RoutineJson {
    id: String,
    name: String,
    work_secs: u64,
    sets: u32,
    last_used: Option<String>,
}

impl Cli {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_routimer-cli"));
        cmd.args(args)
            .env("ROUTIMER_DATA_DIR", self.dir.path())
            .env("RUST_LOG", "off");
        cmd
    }

    /// Run a CLI command and return (stdout, stderr, exit code).
    fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = self.command(args).output().unwrap();
        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code().unwrap_or(-1),
        )
    }

    fn success(&self, args: &[&str]) -> String {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "{args:?} failed: {stderr}");
        stdout
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> (String, i32) {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        // The process may exit before reading everything (e.g. unknown routine).
        let _ = child.stdin.take().unwrap().write_all(input.as_bytes());
        let output = child.wait_with_output().unwrap();
        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            output.status.code().unwrap_or(-1),
        )
    }

    fn create(&self, name: &str) -> RoutineJson {
        let out = self.success(&[
            "routine", "create", "--name", name, "--prep", "10", "--work", "30", "--sets", "3",
            "--rest", "15",
        ]);
        serde_json::from_str(&out).unwrap()
    }
}

#[test]
fn routine_create_and_list() {
    let cli = Cli::new();
    let created = cli.create("Core");
    assert_eq!(created.name, "Core");
    assert_eq!(created.sets, 3);

    let list: Vec<RoutineJson> = serde_json::from_str(&cli.success(&["routine", "list"])).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, created.id);
}

#[test]
fn routine_create_rejects_zero_sets() {
    let cli = Cli::new();
    let (_, stderr, code) = cli.run(&["routine", "create", "--name", "x", "--work", "30", "--sets", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn routine_update_changes_fields() {
    let cli = Cli::new();
    let created = cli.create("Legs");
    let out = cli.success(&["routine", "update", &created.id, "--work", "45"]);
    let updated: RoutineJson = serde_json::from_str(&out).unwrap();
    assert_eq!(updated.work_secs, 45);

    let shown: RoutineJson =
        serde_json::from_str(&cli.success(&["routine", "show", &created.id])).unwrap();
    assert_eq!(shown.work_secs, 45);
}

#[test]
fn routine_delete_then_show_fails() {
    let cli = Cli::new();
    let created = cli.create("Arms");
    cli.success(&["routine", "delete", &created.id]);
    let (_, stderr, code) = cli.run(&["routine", "show", &created.id]);
    assert_eq!(code, 1);
    assert!(stderr.contains(&created.id));
}

#[test]
fn routine_steps_prints_timeline() {
    let cli = Cli::new();
    let created = cli.create("Full");
    let out = cli.success(&["routine", "steps", &created.id]);
    let steps: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
    assert_eq!(steps.len(), 6);
    assert_eq!(steps[0]["label"], "Preparation");
    assert_eq!(steps[5]["label"], "Work 3");
    assert_eq!(steps[2]["step_type"], "rest");
}

#[test]
fn config_set_and_get() {
    let cli = Cli::new();
    assert_eq!(cli.success(&["config", "get", "notifications.enabled"]).trim(), "true");
    cli.success(&["config", "set", "notifications.enabled", "false"]);
    assert_eq!(cli.success(&["config", "get", "notifications.enabled"]).trim(), "false");

    cli.success(&["config", "reset"]);
    assert_eq!(cli.success(&["config", "get", "notifications.enabled"]).trim(), "true");
}

#[test]
fn config_get_unknown_key_fails() {
    let cli = Cli::new();
    let (_, _, code) = cli.run(&["config", "get", "session.nope"]);
    assert_eq!(code, 1);
}

#[test]
fn run_unknown_routine_fails() {
    let cli = Cli::new();
    let (_, code) = cli.run_with_stdin(&["run", "missing"], "q\n");
    assert_eq!(code, 1);
}

#[test]
fn run_finish_records_usage_and_reminder() {
    let cli = Cli::new();
    let created = cli.create("Stretch");
    let (stdout, code) = cli.run_with_stdin(&["run", &created.id], "n\nf\n");
    assert_eq!(code, 0);

    let summary: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(summary["completed"], true);
    assert_eq!(summary["usage_recorded"], true);
    assert_eq!(summary["reminder_scheduled"], true);

    let history: Vec<serde_json::Value> =
        serde_json::from_str(&cli.success(&["history", "usage"])).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["routine_name"], "Stretch");

    let reminders: Vec<serde_json::Value> =
        serde_json::from_str(&cli.success(&["history", "reminders"])).unwrap();
    assert_eq!(reminders.len(), 1);
    assert!(reminders[0]["body"].as_str().unwrap().contains("Stretch"));
}

#[test]
fn run_quit_leaves_routine_unused() {
    let cli = Cli::new();
    let created = cli.create("Idle");
    let (stdout, code) = cli.run_with_stdin(&["run", &created.id], "q\n");
    assert_eq!(code, 0);

    let summary: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(summary["completed"], false);

    let shown: RoutineJson =
        serde_json::from_str(&cli.success(&["routine", "show", &created.id])).unwrap();
    assert!(shown.last_used.is_none());
}
