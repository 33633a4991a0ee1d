//! The execution pipeline shared by all adapters.
//!
//! Merge defaults, build args, spawn, stream, parse, aggregate, log.

use std::sync::{Arc, Mutex, PoisonError};

use crate::adapter::{Adapter, EventCallback, ExecuteOptions};
use crate::audit::{ExecutionLog, InputRecord};
use crate::error::{AgentError, Result};
use crate::process::{ChunkCallback, SpawnOptions};
use crate::stream::{
    EventRules, ExecutionResponse, LineBuffer, ResponseAggregator, StreamEventParser,
};

/// Fans raw stdout chunks out to the output and event callbacks.
struct LiveStream {
    on_output: Option<ChunkCallback>,
    on_event: Option<EventCallback>,
    lines: Arc<Mutex<LineBuffer>>,
}

impl LiveStream {
    fn new(on_output: Option<ChunkCallback>, on_event: Option<EventCallback>) -> Self {
        Self {
            on_output,
            on_event,
            lines: Arc::new(Mutex::new(LineBuffer::new())),
        }
    }

    fn stdout_callback(&self) -> Option<ChunkCallback> {
        if self.on_output.is_none() && self.on_event.is_none() {
            return None;
        }
        let on_output = self.on_output.clone();
        let on_event = self.on_event.clone();
        let lines = Arc::clone(&self.lines);
        Some(Arc::new(move |chunk: &str| {
            if let Some(ref cb) = on_output {
                cb(chunk);
            }
            if let Some(ref cb) = on_event {
                let events = lines
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(chunk);
                for event in &events {
                    cb(event);
                }
            }
        }))
    }

    /// Deliver an unterminated final line.
    fn finish(&self) {
        if let Some(ref cb) = self.on_event {
            let tail = self
                .lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .finish();
            if let Some(event) = tail {
                cb(&event);
            }
        }
    }
}

fn validate_attachments(options: &ExecuteOptions) -> Result<()> {
    for image in &options.images {
        if !image.is_file() {
            return Err(AgentError::Validation(format!(
                "image attachment not found: {}",
                image.display()
            )));
        }
    }
    Ok(())
}

/// Execute `prompt` through `adapter`.
pub(crate) async fn execute_with<A: Adapter + ?Sized>(
    adapter: &A,
    prompt: &str,
    options: ExecuteOptions,
) -> Result<ExecutionResponse> {
    let options = adapter.config().apply_defaults(options);
    let args =
        adapter.build_invocation_args(prompt, &options, options.session_id.as_deref())?;
    validate_attachments(&options)?;

    tracing::info!(
        adapter = adapter.name(),
        resume = options.session_id.is_some(),
        model = ?options.model,
        "Executing agent"
    );

    let log = options.log_dir.as_ref().map(ExecutionLog::new);
    if let Some(ref log) = log {
        log.record_input(InputRecord {
            adapter: adapter.name().to_string(),
            executable: adapter.executable().to_string(),
            args: args.clone(),
            prompt: prompt.to_string(),
            cwd: options.cwd.clone(),
            model: options.model.clone(),
            session_id: options.session_id.clone(),
        });
    }

    let rules = adapter.event_rules(&options);
    let result = run_and_aggregate(adapter, &args, &options, rules.as_ref()).await;

    if let Some(log) = log {
        match &result {
            Ok(response) => log.record_output(response),
            Err(e) => log.record_error(e),
        }
    }
    result
}

async fn run_and_aggregate<A: Adapter + ?Sized>(
    adapter: &A,
    args: &[String],
    options: &ExecuteOptions,
    rules: &dyn EventRules,
) -> Result<ExecutionResponse> {
    let live = LiveStream::new(options.on_output.clone(), options.on_event.clone());

    let mut spawn = SpawnOptions::new()
        .envs(options.env.clone())
        .maybe_timeout(options.timeout);
    if let Some(ref dir) = options.cwd {
        spawn = spawn.cwd(dir);
    }
    if let Some(ref token) = options.cancel {
        spawn = spawn.cancel_token(token.clone());
    }
    if let Some(callback) = live.stdout_callback() {
        spawn = spawn.on_stdout_chunk(callback);
    }

    let output = adapter
        .runner()
        .run(adapter.executable(), args, spawn)
        .await?;
    live.finish();

    let events = StreamEventParser::parse(&output.stdout);
    ResponseAggregator::new(rules).aggregate(events, output, &options.response_format)
}
