//! Agent CLI SDK - drive command-line AI agents as typed, streaming calls.
//!
//! An [`Adapter`] turns a prompt into one invocation of a backend CLI
//! (Claude Code, Codex, Gemini). The [`ProcessRunner`] runs it, the
//! [`StreamEventParser`] reads its JSONL output, and the
//! [`ResponseAggregator`] reduces the events into one [`ExecutionResponse`].
//! [`Session`] and [`Client`] add multi-turn continuity on top.

pub mod adapter;
pub mod audit;
pub mod client;
pub mod config;
pub mod error;
pub mod process;
pub mod session;
pub mod stream;

pub use adapter::{
    create_adapter, Adapter, Capabilities, ClaudeAdapter, CodexAdapter, ExecuteOptions,
    GeminiAdapter, PermissionMode, SandboxMode,
};
pub use client::Client;
pub use config::{AdapterConfig, Backend, ConfigLoader, SdkConfig};
pub use error::{AgentError, Capability, Result, SpawnError};
pub use process::{ProcessOutput, ProcessRunner, SpawnOptions};
pub use session::{Session, SessionEvent, SessionInfo, SessionState};
pub use stream::{
    ErrorCode, Event, ExecutionResponse, JsonSchema, ResponseAggregator, ResponseData,
    ResponseFormat, ResponseStatus, StreamEventParser,
};
