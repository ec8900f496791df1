use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

// Nothing listens on the discard port, so any request fails fast.
const OFFLINE_BACKEND: &str = "http://127.0.0.1:9";

fn meetnotes_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_meetnotes"));
    cmd.env_remove("MEETNOTES_BACKEND_URL")
        .env_remove("MEETNOTES_ANON_KEY")
        .env_remove("MEETNOTES_MEETINGS_TOKEN")
        .env_remove("RUST_LOG")
        .stdin(Stdio::null());
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    meetnotes_cmd().current_dir(dir).args(args).output().unwrap()
}

/// Run with backend credentials supplied through the environment.
fn run_configured(dir: &Path, args: &[&str]) -> Output {
    meetnotes_cmd()
        .current_dir(dir)
        .env("MEETNOTES_BACKEND_URL", OFFLINE_BACKEND)
        .env("MEETNOTES_ANON_KEY", "anon-secret")
        .args(args)
        .output()
        .unwrap()
}

fn init_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let output = run(tmp.path(), &["init"]);
    assert!(output.status.success());
    tmp
}

fn write_session(dir: &Path) {
    fs::write(
        dir.join(".meetnotes/session.json"),
        r#"{
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_at": null,
            "user": {"id": "u1", "email": "jane@example.com"}
        }"#,
    )
    .unwrap();
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_init_creates_project_directory() {
    let tmp = init_project();
    assert!(tmp.path().join(".meetnotes").is_dir());
    assert!(tmp.path().join(".meetnotes/config.yaml").exists());
}

#[test]
fn test_init_twice_fails() {
    let tmp = init_project();

    let output = run(tmp.path(), &["init"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Already initialized"));
}

#[test]
fn test_command_without_init_fails() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["notes", "list"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Not in a meetnotes project"));
}

#[test]
fn test_missing_backend_config() {
    let tmp = init_project();

    let output = run(tmp.path(), &["notes", "list"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Missing config: set backend.url"));
}

#[test]
fn test_gate_requires_session() {
    let tmp = init_project();

    for args in [
        &["notes", "list"][..],
        &["notes", "delete", "1", "--force"][..],
        &["people", "search", "ann"][..],
        &["meetings", "list"][..],
        &["meetings", "transcript", "m1"][..],
        &["whoami"][..],
        &["logout"][..],
    ] {
        let output = run_configured(tmp.path(), args);
        assert!(!output.status.success(), "{:?} should fail", args);
        assert!(
            stderr(&output).contains("Not signed in"),
            "{:?}: {}",
            args,
            stderr(&output)
        );
    }
}

#[test]
fn test_blank_note_rejected_before_any_call() {
    let tmp = init_project();

    let output = run_configured(tmp.path(), &["notes", "add", "   ", "-a", "42"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Please write a note before saving."));
}

#[test]
fn test_login_requires_password() {
    let tmp = init_project();

    let output = run_configured(
        tmp.path(),
        &["login", "--email", "jane@example.com", "--password-stdin"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Email and password are required."));
}

#[test]
fn test_login_without_tty_needs_password_stdin() {
    let tmp = init_project();

    let output = run_configured(tmp.path(), &["login", "--email", "jane@example.com"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--password-stdin"));
}

#[test]
fn test_config_json_masks_secrets() {
    let tmp = init_project();

    let output = run_configured(tmp.path(), &["config", "--json"]);
    assert!(output.status.success());

    let out = stdout(&output);
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["backend"]["url"], OFFLINE_BACKEND);
    assert_eq!(value["backend"]["anon_key"], "***");
    assert!(!out.contains("anon-secret"));
}

#[test]
fn test_config_found_from_subdirectory() {
    let tmp = init_project();
    let nested = tmp.path().join("a/b");
    fs::create_dir_all(&nested).unwrap();

    let output = run(&nested, &["config"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("create_note_function: create_note_with_attendees"));
}

#[test]
fn test_whoami_with_saved_session() {
    let tmp = init_project();
    write_session(tmp.path());

    let output = run_configured(tmp.path(), &["whoami"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "jane@example.com");
}

#[test]
fn test_logout_forgets_session_even_when_server_unreachable() {
    let tmp = init_project();
    write_session(tmp.path());

    let output = run_configured(tmp.path(), &["logout"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Signed out."));
    assert!(!tmp.path().join(".meetnotes/session.json").exists());

    let output = run_configured(tmp.path(), &["whoami"]);
    assert!(stderr(&output).contains("Not signed in"));
}

#[test]
fn test_invalid_view_is_a_usage_error() {
    let tmp = init_project();

    let output = run_configured(tmp.path(), &["notes", "list", "--view", "everything"]);
    assert_eq!(output.status.code(), Some(2));
}
