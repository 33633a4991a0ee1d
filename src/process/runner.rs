//! Agent CLI process spawning and control.
//!
//! [`ProcessRunner::run`] spawns an executable, forwards each stdout/stderr
//! chunk to optional callbacks as it arrives, and settles exactly once: on
//! process exit, on deadline expiry, or on cancellation.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result, SpawnError};

/// Default timeout for graceful process termination after cancellation.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

const READ_BUFFER_SIZE: usize = 8192;

/// Callback receiving raw output chunks in arrival order.
pub type ChunkCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-call spawn configuration.
#[derive(Clone, Default)]
pub struct SpawnOptions {
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
    on_stdout_chunk: Option<ChunkCallback>,
    on_stderr_chunk: Option<ChunkCallback>,
    cancel: Option<CancellationToken>,
}

impl fmt::Debug for SpawnOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnOptions")
            .field("cwd", &self.cwd)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("on_stdout_chunk", &self.on_stdout_chunk.is_some())
            .field("on_stderr_chunk", &self.on_stderr_chunk.is_some())
            .finish_non_exhaustive()
    }
}

impl SpawnOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory for the child.
    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add environment variables on top of the inherited environment.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the deadline after which the child is killed.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set an optional deadline.
    #[must_use]
    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn on_stdout_chunk(mut self, callback: ChunkCallback) -> Self {
        self.on_stdout_chunk = Some(callback);
        self
    }

    #[must_use]
    pub fn on_stderr_chunk(mut self, callback: ChunkCallback) -> Self {
        self.on_stderr_chunk = Some(callback);
        self
    }

    /// Attach a cancellation token; cancelling it terminates the child.
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Get the working directory, if set.
    #[must_use]
    pub fn get_cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    /// Get the configured deadline, if any.
    #[must_use]
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Aggregate result of a completed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; a signal-terminated child reports 1.
    pub exit_code: i32,
    pub duration: Duration,
}

/// Spawns agent CLIs and collects their output.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    terminate_timeout: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }

    /// Set how long a cancelled child gets between SIGTERM and SIGKILL.
    #[must_use]
    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// Spawn `executable` with `args` and wait for it to settle.
    ///
    /// Chunk callbacks run inline on the reader tasks, before this future
    /// resolves.
    ///
    /// # Errors
    ///
    /// - `AgentError::Spawn` if the process cannot be started or has no stdio.
    /// - `AgentError::Timeout` if the deadline elapses first.
    /// - `AgentError::Aborted` if the cancellation token fires first.
    /// - `AgentError::Execution` if waiting on the child fails.
    pub async fn run(
        &self,
        executable: &str,
        args: &[String],
        options: SpawnOptions,
    ) -> Result<ProcessOutput> {
        let started = Instant::now();

        let mut cmd = Command::new(executable);
        cmd.args(args)
            .envs(&options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = options.cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!(
            executable,
            args = ?args,
            cwd = ?options.cwd,
            "Spawning agent process"
        );

        let mut child = cmd.spawn().map_err(|e| AgentError::Spawn {
            source: SpawnError::from_io(executable, e),
            stderr: String::new(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        if stdout.is_none() && stderr.is_none() {
            let _ = child.start_kill();
            return Err(AgentError::Spawn {
                source: SpawnError::NoStdio,
                stderr: String::new(),
            });
        }

        let stdout_buf = Arc::new(Mutex::new(String::new()));
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let mut stdout_task = stdout.map(|pipe| {
            spawn_reader(pipe, Arc::clone(&stdout_buf), options.on_stdout_chunk.clone())
        });
        let mut stderr_task = stderr.map(|pipe| {
            spawn_reader(pipe, Arc::clone(&stderr_buf), options.on_stderr_chunk.clone())
        });

        // The call settles only once the pipes close, so a descendant holding
        // stdout open stays under the deadline and the cancel token.
        let outcome = {
            let finished = async {
                let status = child.wait().await;
                if status.is_ok() {
                    join_reader(stdout_task.as_mut()).await;
                    join_reader(stderr_task.as_mut()).await;
                }
                status
            };
            tokio::select! {
                status = finished => Outcome::Exited(status),
                () = deadline(options.timeout) => Outcome::TimedOut,
                () = cancelled(options.cancel.as_ref()) => Outcome::Cancelled,
            }
        };

        match outcome {
            Outcome::Exited(Ok(status)) => {
                let exit_code = status.code().unwrap_or(1);
                let duration = started.elapsed();
                tracing::debug!(exit_code, ?duration, "Agent process exited");
                Ok(ProcessOutput {
                    stdout: snapshot(&stdout_buf),
                    stderr: snapshot(&stderr_buf),
                    exit_code,
                    duration,
                })
            }
            Outcome::Exited(Err(e)) => {
                let _ = child.start_kill();
                abort_reader(stdout_task);
                abort_reader(stderr_task);
                Err(AgentError::Execution {
                    message: e.to_string(),
                    exit_code: None,
                    stderr: snapshot(&stderr_buf),
                })
            }
            Outcome::TimedOut => {
                let timeout = options.timeout.unwrap_or_default();
                tracing::warn!(executable, ?timeout, "Agent process timed out, killing");
                // One SIGKILL; the reap below never signals again.
                let _ = child.start_kill();
                let _ = child.wait().await;
                abort_reader(stdout_task);
                abort_reader(stderr_task);
                Err(AgentError::Timeout { timeout })
            }
            Outcome::Cancelled => {
                tracing::info!(executable, "Agent process cancelled, terminating");
                if let Err(e) = terminate(&mut child, self.terminate_timeout).await {
                    tracing::warn!(error = %e, "Failed to terminate cancelled process");
                }
                abort_reader(stdout_task);
                abort_reader(stderr_task);
                Err(AgentError::Aborted)
            }
        }
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(t) => tokio::time::sleep(t).await,
        None => std::future::pending().await,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(t) => t.cancelled().await,
        None => std::future::pending().await,
    }
}

fn snapshot(buf: &Mutex<String>) -> String {
    buf.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

async fn join_reader(task: Option<&mut JoinHandle<()>>) {
    if let Some(task) = task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Output reader task failed");
        }
    }
}

fn abort_reader(task: Option<JoinHandle<()>>) {
    if let Some(task) = task {
        task.abort();
    }
}

fn spawn_reader<R>(
    mut pipe: R,
    sink: Arc<Mutex<String>>,
    callback: Option<ChunkCallback>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut pending = Vec::new();
        loop {
            let n = match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(error = %e, "Output pipe read failed");
                    break;
                }
            };
            let chunk = decode_chunk(&mut pending, &buf[..n]);
            if chunk.is_empty() {
                continue;
            }
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_str(&chunk);
            if let Some(ref cb) = callback {
                cb(&chunk);
            }
        }
        if !pending.is_empty() {
            let rest = String::from_utf8_lossy(&pending).into_owned();
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_str(&rest);
            if let Some(ref cb) = callback {
                cb(&rest);
            }
        }
    })
}

/// Decode bytes as UTF-8, carrying an incomplete trailing sequence over to
/// the next read.
fn decode_chunk(pending: &mut Vec<u8>, bytes: &[u8]) -> String {
    pending.extend_from_slice(bytes);
    match std::str::from_utf8(pending) {
        Ok(s) => {
            let out = s.to_string();
            pending.clear();
            out
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let out = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            out
        }
        Err(_) => {
            let out = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            out
        }
    }
}

/// Attempt graceful termination with a timeout.
///
/// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
/// On other platforms, falls back to immediate kill.
async fn terminate(child: &mut Child, timeout: Duration) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            return Ok(());
        };
        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => child.kill().await,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = timeout;
        child.kill().await
    }
}
