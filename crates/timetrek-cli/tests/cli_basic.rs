//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::path::Path;
use std::process::Command;

use mockito::Matcher;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_timetrek"))
        .args(args)
        .env("TIMETREK_DATA_DIR", dir)
        .env_remove("TIMETREK_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn create_project(dir: &Path) -> String {
    let project = run_json(
        dir,
        &["project", "create", "Website", "--start", "2024-01-01", "--end", "2024-12-31"],
    );
    project["id"].as_str().unwrap().to_string()
}

fn create_task(dir: &Path, project_id: &str, title: &str, estimate: &str) -> String {
    let task = run_json(
        dir,
        &[
            "task", "create", title, "--project-id", project_id, "--due", "2024-06-01",
            "--estimate", estimate,
        ],
    );
    task["id"].as_str().unwrap().to_string()
}

#[test]
fn test_config_roundtrip() {
    let dir = TempDir::new().unwrap();

    let (path, _, code) = run_cli(dir.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(path.trim().ends_with("config.toml"));

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "timer.tick_interval_ms", "250"]);
    assert_eq!(code, 0);
    let (value, _, _) = run_cli(dir.path(), &["config", "get", "timer.tick_interval_ms"]);
    assert_eq!(value.trim(), "250");

    let config = run_json(dir.path(), &["config", "show"]);
    assert_eq!(config["workspace"]["id"], "default");

    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "timer.nope", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));
}

#[test]
fn test_timer_commits_to_task() {
    let dir = TempDir::new().unwrap();
    let project_id = create_project(dir.path());
    let task_id = create_task(dir.path(), &project_id, "Landing page", "240");

    let events = run_json(dir.path(), &["timer", "start", &task_id]);
    assert_eq!(events[0]["type"], "TimerStarted");

    let snapshot = run_json(dir.path(), &["timer", "tick", "--seconds", "125"]);
    assert_eq!(snapshot["elapsed_secs"], 125);
    assert_eq!(snapshot["display"], "00:02:05");

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["elapsed_secs"], 125);

    let events = run_json(dir.path(), &["timer", "stop"]);
    assert_eq!(events[0]["type"], "TimerStopped");
    assert_eq!(events[1]["type"], "TimeCommitted");
    assert_eq!(events[1]["time_spent"], 2);

    let details = run_json(dir.path(), &["task", "get", &task_id]);
    assert_eq!(details["task"]["time_spent"], 2);
    assert_eq!(details["progress_percent"], 1);
}

#[test]
fn test_paused_timer_ignores_ticks() {
    let dir = TempDir::new().unwrap();
    let project_id = create_project(dir.path());
    let task_id = create_task(dir.path(), &project_id, "Copy", "60");

    run_json(dir.path(), &["timer", "start", &task_id]);
    run_json(dir.path(), &["timer", "tick", "--seconds", "10"]);
    let paused = run_json(dir.path(), &["timer", "pause"]);
    assert_eq!(paused[0]["type"], "TimerPaused");

    let snapshot = run_json(dir.path(), &["timer", "tick", "--seconds", "10"]);
    assert_eq!(snapshot["elapsed_secs"], 10);
    assert_eq!(snapshot["status"], "paused");

    // Pausing twice is a no-op.
    let again = run_json(dir.path(), &["timer", "pause"]);
    assert_eq!(again, Value::Array(Vec::new()));
}

#[test]
fn test_task_cycle_and_due() {
    let dir = TempDir::new().unwrap();
    let project_id = create_project(dir.path());
    let task_id = create_task(dir.path(), &project_id, "Cycle me", "30");

    let task = run_json(dir.path(), &["task", "cycle", &task_id]);
    assert_eq!(task["status"], "in-progress");
    let task = run_json(dir.path(), &["task", "cycle", &task_id]);
    assert_eq!(task["status"], "completed");

    let due = run_json(dir.path(), &["task", "due", "2024-06-01"]);
    assert_eq!(due.as_array().unwrap().len(), 1);
    let candidates = run_json(dir.path(), &["task", "candidates"]);
    assert_eq!(candidates.as_array().unwrap().len(), 0);

    let todo = run_json(dir.path(), &["task", "list", "--status", "todo"]);
    assert_eq!(todo.as_array().unwrap().len(), 0);
}

#[test]
fn test_project_delete_cascades() {
    let dir = TempDir::new().unwrap();
    let project_id = create_project(dir.path());
    create_task(dir.path(), &project_id, "One", "10");
    create_task(dir.path(), &project_id, "Two", "10");

    let result = run_json(dir.path(), &["project", "delete", &project_id]);
    assert_eq!(result["removed_tasks"].as_array().unwrap().len(), 2);
    let tasks = run_json(dir.path(), &["task", "list"]);
    assert_eq!(tasks, Value::Array(Vec::new()));
}

#[test]
fn test_auth_session_and_roles() {
    let dir = TempDir::new().unwrap();
    let ada = run_json(
        dir.path(),
        &[
            "auth", "register", "--name", "Ada", "--email", "ada@example.com", "--password",
            "analytical", "--workspace", "Engine Works",
        ],
    );
    assert_eq!(ada["role"], "manager");
    assert_eq!(ada["workspace_id"], "engine-works");

    let me = run_json(dir.path(), &["auth", "whoami"]);
    assert_eq!(me["email"], "ada@example.com");
    let members = run_json(dir.path(), &["member", "list"]);
    assert_eq!(members.as_array().unwrap().len(), 1);

    let bo = run_json(
        dir.path(),
        &[
            "auth", "register", "--name", "Bo", "--email", "bo@example.com", "--password",
            "difference", "--workspace", "Engine Works",
        ],
    );
    assert_eq!(bo["role"], "member");

    let (_, stderr, code) = run_cli(
        dir.path(),
        &["project", "create", "Nope", "--start", "2024-01-01", "--end", "2024-02-01"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("only workspace managers"));

    run_json(dir.path(), &["auth", "logout"]);
    let (_, stderr, code) = run_cli(dir.path(), &["auth", "whoami"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Not signed in"));

    let (_, stderr, code) = run_cli(
        dir.path(),
        &["auth", "login", "--email", "ada@example.com", "--password", "wrong"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("Invalid email or password"));
}

#[test]
fn test_register_rejects_short_password() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(
        dir.path(),
        &[
            "auth", "register", "--name", "Ada", "--email", "ada@example.com", "--password",
            "short", "--workspace", "W",
        ],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("at least 8"));
}

#[test]
fn test_reports_over_cli_data() {
    let dir = TempDir::new().unwrap();
    let project_id = create_project(dir.path());
    let task_id = create_task(dir.path(), &project_id, "Spec", "120");
    run_json(dir.path(), &["task", "update", &task_id, "--spent", "90"]);

    let summary = run_json(dir.path(), &["report", "summary"]);
    assert_eq!(summary["completion"]["total"], 1);
    assert_eq!(summary["time_display"], "1h 30m");

    let projects = run_json(dir.path(), &["report", "projects"]);
    assert_eq!(projects[0]["hours"], 1.5);

    let members = run_json(dir.path(), &["report", "members"]);
    assert_eq!(members[0]["member_id"], "local");
    assert_eq!(members[0]["time_spent"], 90);
}

#[test]
fn test_failures_exit_nonzero() {
    let dir = TempDir::new().unwrap();

    let (_, stderr, code) = run_cli(dir.path(), &["timer", "start", "missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Task not found"));

    let (_, stderr, code) = run_cli(dir.path(), &["remote", "tasks"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not configured"));
}

fn hosted_task(spent: u32) -> Value {
    json!({
        "id": "t1",
        "title": "Landing page",
        "projectid": "p1",
        "userid": "u1",
        "assignedto": ["u1"],
        "status": "in-progress",
        "duedate": "2024-06-01",
        "timeestimate": 240,
        "timespent": spent,
        "createdat": "2024-04-01"
    })
}

#[test]
fn test_timer_commits_to_hosted_backend() {
    let dir = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/rest/v1/tasks")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!([hosted_task(10)]).to_string())
        .create();
    server
        .mock("GET", Matcher::Regex("^/rest/v1/(projects|workspace_members)".into()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create();
    let commit = server
        .mock("PATCH", "/rest/v1/tasks")
        .match_query(Matcher::UrlEncoded("id".into(), "eq.t1".into()))
        .match_body(Matcher::Json(json!({ "timespent": 12 })))
        .with_status(200)
        .with_body(json!([hosted_task(12)]).to_string())
        .expect(1)
        .create();

    let url = server.url();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "backend.url", &url]);
    assert_eq!(code, 0);

    let tasks = run_json(dir.path(), &["task", "list"]);
    assert_eq!(tasks[0]["id"], "t1");

    run_json(dir.path(), &["timer", "start", "t1"]);
    run_json(dir.path(), &["timer", "tick", "--seconds", "125"]);
    let events = run_json(dir.path(), &["timer", "stop"]);
    assert_eq!(events[1]["type"], "TimeCommitted");
    assert_eq!(events[1]["time_spent"], 12);
    commit.assert();
}
