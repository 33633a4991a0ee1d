//! Adapters executing stand-in CLIs end to end.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_cli_sdk::{
    Adapter, AdapterConfig, AgentError, ClaudeAdapter, CodexAdapter, ErrorCode, ExecuteOptions,
    GeminiAdapter, SpawnError,
};
use tokio_util::sync::CancellationToken;

use crate::support::{config_for, fake_cli, printing_cli};

const CLAUDE_STREAM: &[&str] = &[
    r#"{"type":"system","subtype":"init","session_id":"sess-1","tools":["Read"]}"#,
    r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Working on it. "}]},"session_id":"sess-1"}"#,
    r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"Cargo.toml"}}]},"session_id":"sess-1"}"#,
    r#"{"type":"result","subtype":"success","result":"All done.","session_id":"sess-1","usage":{"input_tokens":12,"output_tokens":8},"total_cost_usd":0.002}"#,
];

/// Wait for a file written by a detached task.
async fn wait_for(path: &Path) -> bool {
    for _ in 0..100 {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn only_run_dir(log_dir: &Path) -> PathBuf {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(log_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    entries.remove(0)
}

#[tokio::test]
async fn claude_stream_end_to_end_with_callbacks() {
    let dir = tempfile::tempdir().unwrap();
    let script = printing_cli(dir.path(), CLAUDE_STREAM, 0);

    let chunks = Arc::new(Mutex::new(String::new()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let chunk_sink = Arc::clone(&chunks);
    let event_sink = Arc::clone(&events);
    let options = ExecuteOptions::new()
        .on_output(move |chunk| chunk_sink.lock().unwrap().push_str(chunk))
        .on_event(move |event| {
            event_sink
                .lock()
                .unwrap()
                .push(event.event_type().unwrap_or_default().to_string());
        });

    let response = ClaudeAdapter::new(config_for(&script))
        .execute("Read the manifest", options)
        .await
        .unwrap();

    assert_eq!(response.data, "All done.");
    assert_eq!(response.session_id.as_deref(), Some("sess-1"));
    assert_eq!(response.metadata.tools_used, vec!["Read"]);
    assert_eq!(response.usage.total_tokens, 20);
    assert_eq!(response.events.len(), 4);
    assert_eq!(*chunks.lock().unwrap(), response.raw.stdout);
    assert_eq!(
        *events.lock().unwrap(),
        vec!["system", "assistant", "assistant", "result"]
    );
}

#[tokio::test]
async fn invocation_args_reach_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("args.txt");
    let script = fake_cli(
        dir.path(),
        "codex",
        &format!(
            "printf '%s\\n' \"$@\" > {}\necho '{{\"type\":\"item.completed\",\"item\":{{\"type\":\"agent_message\",\"text\":\"ok\"}}}}'",
            args_file.display()
        ),
    );

    let response = CodexAdapter::new(config_for(&script))
        .execute("hello world", ExecuteOptions::new().model("o3"))
        .await
        .unwrap();

    assert_eq!(response.data, "ok");
    let args = std::fs::read_to_string(&args_file).unwrap();
    assert_eq!(args, "exec\n--json\n--model\no3\nhello world\n");
}

#[tokio::test]
async fn config_env_and_call_env_both_apply() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_cli(
        dir.path(),
        "claude",
        r#"printf '{"type":"result","result":"%s-%s"}\n' "$FROM_CONFIG" "$FROM_CALL""#,
    );
    let mut config = config_for(&script);
    config.env.insert("FROM_CONFIG".into(), "cfg".into());
    config.env.insert("FROM_CALL".into(), "overridden".into());

    let response = ClaudeAdapter::new(config)
        .execute("x", ExecuteOptions::new().env("FROM_CALL", "call"))
        .await
        .unwrap();
    assert_eq!(response.data, "cfg-call");
}

#[tokio::test]
async fn config_timeout_applies() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_cli(dir.path(), "gemini", "sleep 30");
    let config = AdapterConfig {
        timeout_ms: Some(50),
        ..config_for(&script)
    };

    let err = GeminiAdapter::new(config)
        .execute("x", ExecuteOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn nonzero_exit_with_stderr_is_in_band() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_cli(dir.path(), "claude", "echo 'not logged in' >&2\nexit 1");

    let response = ClaudeAdapter::new(config_for(&script))
        .execute("x", ExecuteOptions::new())
        .await
        .unwrap();

    let error = response.error.unwrap();
    assert_eq!(error.code, ErrorCode::NoOutput);
    assert_eq!(response.raw.stderr, "not logged in\n");
    assert_eq!(error.details, Some(serde_json::json!("not logged in\n")));
}

#[tokio::test]
async fn empty_prompt_fails_before_spawning() {
    let adapter = ClaudeAdapter::new(config_for(Path::new("/nonexistent/claude")));
    let err = adapter.execute("   ", ExecuteOptions::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::Validation(_)));
}

#[tokio::test]
async fn missing_executable_is_spawn_error() {
    let adapter = ClaudeAdapter::new(config_for(Path::new("/nonexistent/claude")));
    let err = adapter.execute("hi", ExecuteOptions::new()).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Spawn {
            source: SpawnError::NotFound(_),
            ..
        }
    ));
}

#[tokio::test]
async fn codex_image_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let script = printing_cli(dir.path(), &[], 0);
    let adapter = CodexAdapter::new(config_for(&script));

    let err = adapter
        .execute("describe", ExecuteOptions::new().image(dir.path().join("missing.png")))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Validation(_)));

    let image = dir.path().join("shot.png");
    std::fs::write(&image, [0u8; 4]).unwrap();
    assert!(adapter
        .execute("describe", ExecuteOptions::new().image(&image))
        .await
        .is_ok());
}

#[tokio::test]
async fn cancel_token_aborts_the_call() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_cli(dir.path(), "claude", "sleep 30");
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = ClaudeAdapter::new(config_for(&script))
        .execute("x", ExecuteOptions::new().cancel_token(token))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Aborted));
}

#[tokio::test]
async fn execution_log_records_input_and_output() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let script = printing_cli(dir.path(), CLAUDE_STREAM, 0);

    ClaudeAdapter::new(config_for(&script))
        .execute("logged prompt", ExecuteOptions::new().log_dir(&logs))
        .await
        .unwrap();

    assert!(wait_for(&logs).await);
    let run_dir = only_run_dir(&logs);
    assert!(wait_for(&run_dir.join("output.json")).await);
    assert!(wait_for(&run_dir.join("input.json")).await);

    let input: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("input.json")).unwrap())
            .unwrap();
    assert_eq!(input["prompt"], "logged prompt");
    assert_eq!(input["adapter"], "claude");
    let output = std::fs::read_to_string(run_dir.join("output.json")).unwrap();
    assert!(output.contains("All done."));
}

#[tokio::test]
async fn execution_log_records_errors() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let config = AdapterConfig {
        log_dir: Some(logs.clone()),
        ..config_for(Path::new("/nonexistent/claude"))
    };

    let result = ClaudeAdapter::new(config)
        .execute("hi", ExecuteOptions::new())
        .await;
    assert!(result.is_err());

    assert!(wait_for(&logs).await);
    let run_dir = only_run_dir(&logs);
    assert!(wait_for(&run_dir.join("error.json")).await);
    assert!(!run_dir.join("output.json").exists());
}
