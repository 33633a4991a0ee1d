//! Multi-turn sessions against stand-in CLIs.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_cli_sdk::{
    AgentError, ClaudeAdapter, Client, CodexAdapter, ExecuteOptions, SessionEvent, SessionState,
};
use futures_util::StreamExt;

use crate::support::{config_for, fake_cli};

/// A Claude stand-in that logs each invocation's args on one line and
/// reports `session_id`.
fn logging_claude(dir: &Path, session_id: &str) -> (PathBuf, PathBuf) {
    let log = dir.join("invocations.log");
    let script = fake_cli(
        dir,
        "claude",
        &format!(
            "echo \"$*\" >> {log}\n\
             echo '{{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"{id}\"}}'\n\
             echo '{{\"type\":\"result\",\"subtype\":\"success\",\"result\":\"turn done\",\"session_id\":\"{id}\"}}'",
            log = log.display(),
            id = session_id,
        ),
    );
    (script, log)
}

fn invocations(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn second_send_resumes_the_captured_session() {
    let dir = tempfile::tempdir().unwrap();
    let (script, log) = logging_claude(dir.path(), "sess-42");
    let client = Client::new(ClaudeAdapter::new(config_for(&script)));
    let session = client.create_session(None).unwrap();

    assert_eq!(session.state(), SessionState::Created);
    let first = session.send("first", None).await.unwrap();
    let second = session.send("second", None).await.unwrap();

    assert_eq!(first.session_id.as_deref(), Some("sess-42"));
    assert_eq!(second.session_id.as_deref(), Some("sess-42"));
    assert_eq!(session.id().as_deref(), Some("sess-42"));
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.message_count(), 2);

    let calls = invocations(&log);
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].contains("--resume"));
    assert!(calls[1].contains("--resume sess-42"));
}

#[tokio::test]
async fn codex_session_resumes_positionally() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("invocations.log");
    let script = fake_cli(
        dir.path(),
        "codex",
        &format!(
            "echo \"$*\" >> {}\n\
             echo '{{\"type\":\"thread.started\",\"thread_id\":\"th-7\"}}'\n\
             echo '{{\"type\":\"item.completed\",\"item\":{{\"id\":\"i0\",\"type\":\"agent_message\",\"text\":\"ok\"}}}}'",
            log.display()
        ),
    );
    let client = Client::new(CodexAdapter::new(config_for(&script)));
    let session = client.create_session(None).unwrap();

    session.send("one", None).await.unwrap();
    session.send("two", None).await.unwrap();

    let calls = invocations(&log);
    assert_eq!(calls[0], "exec --json one");
    assert_eq!(calls[1], "exec --json resume th-7 two");
}

#[tokio::test]
async fn in_band_failure_keeps_session_usable() {
    let dir = tempfile::tempdir().unwrap();
    let flag = dir.path().join("failed-once");
    let script = fake_cli(
        dir.path(),
        "claude",
        &format!(
            "if [ ! -e {flag} ]; then\n\
               touch {flag}\n\
               echo '{{\"type\":\"result\",\"is_error\":true,\"result\":\"rate limited\"}}'\n\
             else\n\
               echo '{{\"type\":\"result\",\"result\":\"fine\",\"session_id\":\"s-1\"}}'\n\
             fi",
            flag = flag.display()
        ),
    );
    let client = Client::new(ClaudeAdapter::new(config_for(&script)));
    let session = client.create_session(None).unwrap();

    let failed = session.send("try", None).await.unwrap();
    assert!(!failed.is_success());
    assert_eq!(session.state(), SessionState::Created);
    assert!(session.last_error().is_some());

    let ok = session.send("retry", None).await.unwrap();
    assert!(ok.is_success());
    assert_eq!(session.state(), SessionState::Active);
    assert!(session.last_error().is_none());
    assert_eq!(session.stats().failures, 1);
}

#[tokio::test]
async fn abort_kills_running_turn_and_closes_session() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_cli(dir.path(), "claude", "sleep 30");
    let client = Client::new(ClaudeAdapter::new(config_for(&script)));
    let session = client.create_session(None).unwrap();
    let mut events = session.events();

    let running = session.clone();
    let turn = tokio::spawn(async move { running.send("long task", None).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(session.abort().await);
    assert!(!session.abort().await);

    let result = tokio::time::timeout(Duration::from_secs(5), turn)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(AgentError::Aborted)));
    assert!(matches!(
        session.send("again", None).await,
        Err(AgentError::SessionClosed)
    ));

    let first = tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .unwrap();
    assert!(matches!(first, Some(SessionEvent::Aborted { .. })));
}

#[tokio::test]
async fn completion_notification_carries_the_response() {
    let dir = tempfile::tempdir().unwrap();
    let (script, _log) = logging_claude(dir.path(), "sess-n");
    let client = Client::new(ClaudeAdapter::new(config_for(&script)));
    let session = client.create_session(Some(ExecuteOptions::new().model("sonnet"))).unwrap();
    let mut receiver = session.subscribe();

    session.send("hello", None).await.unwrap();

    match receiver.recv().await.unwrap() {
        SessionEvent::Complete {
            session_id,
            response,
        } => {
            assert_eq!(session_id.as_deref(), Some("sess-n"));
            assert_eq!(response.data, "turn done");
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}
