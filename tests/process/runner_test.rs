//! Tests for the process runner against real child processes.

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use agent_cli_sdk::{AgentError, ProcessRunner, SpawnError, SpawnOptions};
use tokio_util::sync::CancellationToken;

use crate::support::{args, fake_cli};

#[tokio::test]
async fn captures_stdout_stderr_and_exit_code() {
    let output = ProcessRunner::new()
        .run(
            "sh",
            &args(&["-c", "printf out; printf err >&2; exit 3"]),
            SpawnOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(output.stdout, "out");
    assert_eq!(output.stderr, "err");
    assert_eq!(output.exit_code, 3);
}

#[tokio::test]
async fn env_extends_inherited_environment() {
    let output = ProcessRunner::new()
        .run(
            "sh",
            &args(&["-c", r#"printf "%s|%s" "$AGENT_SDK_TEST_VAR" "$PATH""#]),
            SpawnOptions::new().envs([("AGENT_SDK_TEST_VAR", "extra")]),
        )
        .await
        .unwrap();

    let (var, path) = output.stdout.split_once('|').unwrap();
    assert_eq!(var, "extra");
    assert!(!path.is_empty(), "inherited PATH should survive");
}

#[tokio::test]
async fn runs_in_requested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let output = ProcessRunner::new()
        .run("sh", &args(&["-c", "pwd -P"]), SpawnOptions::new().cwd(dir.path()))
        .await
        .unwrap();

    assert_eq!(
        output.stdout.trim(),
        dir.path().canonicalize().unwrap().display().to_string()
    );
}

#[tokio::test]
async fn chunks_arrive_in_order_before_settlement() {
    let chunks = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&chunks);

    let output = ProcessRunner::new()
        .run(
            "sh",
            &args(&["-c", "for i in 1 2 3 4 5; do echo line$i; sleep 0.01; done"]),
            SpawnOptions::new().on_stdout_chunk(Arc::new(move |chunk: &str| {
                sink.lock().unwrap().push(chunk.to_string());
            })),
        )
        .await
        .unwrap();

    let seen = chunks.lock().unwrap().concat();
    assert_eq!(seen, output.stdout);
    assert_eq!(seen, "line1\nline2\nline3\nline4\nline5\n");
}

#[tokio::test]
async fn stderr_callback_fires() {
    let chunks = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&chunks);

    ProcessRunner::new()
        .run(
            "sh",
            &args(&["-c", "echo warning >&2"]),
            SpawnOptions::new().on_stderr_chunk(Arc::new(move |chunk: &str| {
                sink.lock().unwrap().push_str(chunk);
            })),
        )
        .await
        .unwrap();

    assert_eq!(*chunks.lock().unwrap(), "warning\n");
}

#[tokio::test]
async fn signal_killed_exit_normalizes_to_one() {
    let output = ProcessRunner::new()
        .run("sh", &args(&["-c", "kill -9 $$"]), SpawnOptions::new())
        .await
        .unwrap();
    assert_eq!(output.exit_code, 1);
}

#[tokio::test]
async fn missing_executable_is_spawn_error() {
    let err = ProcessRunner::new()
        .run("/nonexistent/agent-cli-binary", &[], SpawnOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Spawn {
            source: SpawnError::NotFound(_),
            ..
        }
    ));
}

/// A never-exiting process is killed once and the call rejects promptly.
#[tokio::test]
async fn timeout_kills_once_and_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let trap_log = dir.path().join("signals.log");
    let script = fake_cli(
        dir.path(),
        "hang",
        &format!(
            "trap 'echo TERM >> {}' TERM\nwhile true; do sleep 0.05; done",
            trap_log.display()
        ),
    );

    let started = Instant::now();
    let err = ProcessRunner::new()
        .run(
            &script.display().to_string(),
            &[],
            SpawnOptions::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(err, AgentError::Timeout { timeout } if timeout == Duration::from_millis(50)));
    // The single signal is an uncatchable kill, so the TERM trap never ran.
    assert!(!trap_log.exists());
}

#[tokio::test]
async fn cancellation_terminates_and_reports_aborted() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = ProcessRunner::new()
        .with_terminate_timeout(Duration::from_millis(200))
        .run(
            "sh",
            &args(&["-c", "sleep 30"]),
            SpawnOptions::new().cancel_token(token),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Aborted));
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// A background descendant holding stdout open keeps the call under its deadline.
#[tokio::test]
async fn timeout_covers_descendant_holding_stdout() {
    let started = Instant::now();
    let err = ProcessRunner::new()
        .run(
            "sh",
            &args(&["-c", "sleep 3 & echo hi"]),
            SpawnOptions::new().timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn cancellation_covers_descendant_holding_stdout() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = ProcessRunner::new()
        .run(
            "sh",
            &args(&["-c", "sleep 3 & echo hi"]),
            SpawnOptions::new().cancel_token(token),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Aborted));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn output_is_complete_once_pipes_close() {
    let output = ProcessRunner::new()
        .run(
            "sh",
            &args(&["-c", "(sleep 0.2; echo late) & echo early"]),
            SpawnOptions::new().timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert_eq!(output.stdout, "early\nlate\n");
}
