#![cfg(all(unix, feature = "cli"))]

//! End-to-end tests for the `mailsync-supervisor` binary.
//!
//! Each test runs the compiled binary in a scratch directory with a
//! clean environment, using `sh` scripts as stand-in workers.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

const REQUIRED: [(&str, &str); 6] = [
    ("SRC_HOST", "a.example"),
    ("SRC_USER", "u1"),
    ("SRC_PASSWORD", "hunter2-src"),
    ("DEST_HOST", "b.example"),
    ("DEST_USER", "u2"),
    ("DEST_PASSWORD", "hunter2-dest"),
];

/// Build a command for the supervisor binary writing its config to
/// `dir/config.yaml`, with only `PATH` and `vars` in its environment.
fn supervisor(dir: &Path, vars: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mailsync-supervisor"));
    cmd.current_dir(dir)
        .env_clear()
        .env("PATH", std::env::var_os("PATH").unwrap_or_default())
        .env("CONFIG_PATH", dir.join("config.yaml"))
        .envs(vars.iter().copied())
        .kill_on_drop(true);
    cmd
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_required_var_exits_1_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let vars: Vec<_> = REQUIRED
        .iter()
        .copied()
        .filter(|(key, _)| *key != "DEST_HOST")
        .collect();

    let output = supervisor(dir.path(), &vars).output().await.unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DEST_HOST"), "stderr: {stderr}");
    assert!(stderr.contains("ERROR"), "stderr: {stderr}");
    assert!(!dir.path().join("config.yaml").exists());
}

#[tokio::test]
async fn test_malformed_number_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = REQUIRED.to_vec();
    vars.push(("SLEEP_SECONDS", "five"));

    let output = supervisor(dir.path(), &vars).output().await.unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("SLEEP_SECONDS"));
    assert!(!dir.path().join("config.yaml").exists());
}

#[tokio::test]
async fn test_generate_only_writes_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = REQUIRED.to_vec();
    vars.push(("ON_SUCCESS_MOVE_TO", "Archive"));

    let output = supervisor(dir.path(), &vars)
        .arg("--generate-only")
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Source: a.example -> Destination: b.example"));
    assert!(!stderr.contains("hunter2"), "password leaked: {stderr}");
    assert!(
        stderr.lines().all(|line| line.starts_with("[railway] ")),
        "untagged log line in: {stderr}"
    );

    let config = mailsync_supervisor::load(dir.path().join("config.yaml")).unwrap();
    assert_eq!(
        config.src_imap.on_success.move_to_mailbox.as_deref(),
        Some("Archive")
    );
}

#[tokio::test]
async fn test_log_tag_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = REQUIRED.to_vec();
    vars.push(("LOG_TAG", "mailsync"));

    let output = supervisor(dir.path(), &vars)
        .arg("--generate-only")
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let first = stderr.lines().next().unwrap_or_default();
    assert!(first.starts_with("[mailsync] "), "stderr: {stderr}");
    assert!(first.contains("INFO"), "stderr: {stderr}");
}

#[tokio::test]
async fn test_worker_exit_is_unhealthy() {
    let dir = tempfile::tempdir().unwrap();

    let output = tokio::time::timeout(
        Duration::from_secs(10),
        supervisor(dir.path(), &REQUIRED)
            .args(["--health-interval", "1", "--worker", "sh", "--", "-c", "exit 0", "sh"])
            .output(),
    )
    .await
    .expect("supervisor did not exit")
    .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Worker is not healthy"), "stderr: {stderr}");
}

#[tokio::test]
async fn test_sigterm_exits_0() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = supervisor(dir.path(), &REQUIRED)
        .args(["--worker", "sh", "--", "-c", "exec sleep 30", "sh"])
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut lines = BufReader::new(child.stderr.take().unwrap()).lines();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line.contains("Worker started") {
                return;
            }
        }
        panic!("supervisor exited before starting the worker");
    })
    .await
    .expect("worker never started");

    let pid = child.id().unwrap().to_string();
    let killed = Command::new("kill")
        .args(["-TERM", &pid])
        .status()
        .await
        .unwrap();
    assert!(killed.success());

    // Keep draining stderr so the supervisor never blocks on a full pipe.
    let mut rest = String::new();
    let status = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            rest.push_str(&line);
            rest.push('\n');
        }
        child.wait().await.unwrap()
    })
    .await
    .expect("supervisor did not exit after SIGTERM");

    assert_eq!(status.code(), Some(0));
    assert!(rest.contains("SIGTERM"), "stderr: {rest}");
}
