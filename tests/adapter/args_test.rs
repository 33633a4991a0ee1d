//! Argument building per backend, without spawning anything.

use agent_cli_sdk::{
    Adapter, AgentError, ClaudeAdapter, CodexAdapter, ExecuteOptions, GeminiAdapter,
    PermissionMode, SandboxMode,
};

#[test]
fn claude_new_conversation_has_no_resume_marker() {
    let args = ClaudeAdapter::default()
        .build_invocation_args("Fix the bug", &ExecuteOptions::new(), None)
        .unwrap();

    assert!(args.contains(&"-p".to_string()));
    assert!(args.contains(&"Fix the bug".to_string()));
    assert!(args.contains(&"stream-json".to_string()));
    assert!(!args.contains(&"--resume".to_string()));
}

#[test]
fn claude_resume_marker_is_a_flag() {
    let args = ClaudeAdapter::default()
        .build_invocation_args("continue", &ExecuteOptions::new(), Some("session_abc123"))
        .unwrap();

    assert!(args.contains(&"--resume".to_string()));
    assert!(args.contains(&"session_abc123".to_string()));
}

#[test]
fn claude_tool_and_prompt_options() {
    let options = ExecuteOptions::new()
        .allowed_tools(&["Read", "Write", "Bash"])
        .max_turns(5)
        .system_prompt("Custom system prompt")
        .permission_mode(PermissionMode::Plan);
    let args = ClaudeAdapter::default()
        .build_invocation_args("task", &options, None)
        .unwrap();

    assert!(args.contains(&"Read,Write,Bash".to_string()));
    assert!(args.contains(&"5".to_string()));
    assert!(args.contains(&"Custom system prompt".to_string()));
    assert!(args.contains(&"plan".to_string()));
}

#[test]
fn codex_resume_marker_is_positional() {
    let args = CodexAdapter::default()
        .build_invocation_args("continue", &ExecuteOptions::new(), Some("thread-1"))
        .unwrap();

    let resume = args.iter().position(|a| a == "resume").unwrap();
    assert_eq!(args[resume + 1], "thread-1");
    assert_eq!(args.last().map(String::as_str), Some("continue"));
    assert!(!args.contains(&"--resume".to_string()));
}

#[test]
fn codex_bypass_mode() {
    let options = ExecuteOptions::new()
        .permission_mode(PermissionMode::Bypass)
        .sandbox(SandboxMode::DangerFullAccess);
    let args = CodexAdapter::default()
        .build_invocation_args("go", &options, None)
        .unwrap();

    assert!(args.contains(&"--dangerously-bypass-approvals-and-sandbox".to_string()));
    assert!(args.contains(&"danger-full-access".to_string()));
}

#[test]
fn gemini_rejects_sessions_and_images() {
    let adapter = GeminiAdapter::default();
    assert!(matches!(
        adapter.build_invocation_args("x", &ExecuteOptions::new(), Some("s")),
        Err(AgentError::Capability { .. })
    ));
    assert!(matches!(
        adapter.build_invocation_args("x", &ExecuteOptions::new().image("a.png"), None),
        Err(AgentError::Capability { .. })
    ));
}

#[test]
fn builders_are_pure() {
    let adapter = CodexAdapter::default();
    let options = ExecuteOptions::new().model("o4-mini").cwd("/work");
    let first = adapter.build_invocation_args("same", &options, None).unwrap();
    let second = adapter.build_invocation_args("same", &options, None).unwrap();
    assert_eq!(first, second);
}
