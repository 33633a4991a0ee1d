//! Multi-turn session handle.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use super::registry::{ActiveSessionRegistry, SessionInfo};
use super::state::{SessionState, SessionStateMachine, SessionStats};
use crate::adapter::{Adapter, ExecuteOptions};
use crate::error::{AgentError, Result};
use crate::stream::ExecutionResponse;

const EVENT_CAPACITY: usize = 64;

/// Notifications published by a [`Session`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A send finished and produced a response, possibly carrying an
    /// in-band error.
    Complete {
        session_id: Option<String>,
        response: Arc<ExecutionResponse>,
    },
    /// A send failed before producing a response.
    Error {
        session_id: Option<String>,
        message: String,
    },
    /// The session was aborted.
    Aborted { session_id: Option<String> },
}

#[derive(Debug)]
struct Snapshot {
    id: Option<String>,
    machine: SessionStateMachine,
    message_count: u64,
    started_at: DateTime<Utc>,
    last_message_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    registered: bool,
}

struct Inner {
    adapter: Arc<dyn Adapter>,
    defaults: ExecuteOptions,
    /// Held for the duration of a send; turns never overlap.
    turn: tokio::sync::Mutex<()>,
    snapshot: Mutex<Snapshot>,
    cancel: CancellationToken,
    events: broadcast::Sender<SessionEvent>,
    registry: Weak<ActiveSessionRegistry>,
}

/// Task forwarding a caller's cancellation into one turn; aborted on drop.
struct TurnLink(JoinHandle<()>);

impl Drop for TurnLink {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A conversation bound to one adapter.
///
/// The first successful send binds the backend-issued session id; every
/// later send resumes it. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("adapter", &self.inner.adapter.name())
            .field("snapshot", &*self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        adapter: Arc<dyn Adapter>,
        defaults: ExecuteOptions,
        registry: Weak<ActiveSessionRegistry>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        // A caller-provided resume id binds the session up front.
        let id = defaults.session_id.clone();
        let mut machine = SessionStateMachine::new();
        if id.is_some() {
            if let Ok(previous) = machine.begin_turn() {
                machine.complete_turn(previous, true);
            }
        }
        Self {
            inner: Arc::new(Inner {
                adapter,
                defaults,
                turn: tokio::sync::Mutex::new(()),
                snapshot: Mutex::new(Snapshot {
                    id,
                    machine,
                    message_count: 0,
                    started_at: Utc::now(),
                    last_message_at: None,
                    last_error: None,
                    registered: false,
                }),
                cancel: CancellationToken::new(),
                events,
                registry,
            }),
        }
    }

    fn snapshot(&self) -> MutexGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Send one message.
    ///
    /// `options` replaces the session's default options for this turn. The
    /// resume id and cancellation are always supplied by the session.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::SessionClosed` after [`Session::abort`],
    /// `AgentError::Aborted` if aborted while running, or any error of
    /// [`Adapter::execute`].
    pub async fn send(
        &self,
        message: &str,
        options: Option<ExecuteOptions>,
    ) -> Result<ExecutionResponse> {
        let _turn = self.inner.turn.lock().await;

        let (previous, resume_id) = {
            let mut snapshot = self.snapshot();
            let previous = snapshot.machine.begin_turn()?;
            (previous, snapshot.id.clone())
        };

        let mut options = options.unwrap_or_else(|| self.inner.defaults.clone());
        options.session_id = resume_id.clone();
        let (token, _link) = self.turn_token(options.cancel.take());
        options.cancel = Some(token);

        let result = self.inner.adapter.execute(message, options).await;
        self.settle(previous, &result).await;
        result
    }

    /// A token cancelled by [`Session::abort`] or by the caller's token.
    ///
    /// The returned link forwards the caller's cancellation until dropped.
    fn turn_token(
        &self,
        caller: Option<CancellationToken>,
    ) -> (CancellationToken, Option<TurnLink>) {
        let token = self.inner.cancel.child_token();
        let link = caller.map(|caller| {
            let linked = token.clone();
            TurnLink(tokio::spawn(async move {
                tokio::select! {
                    () = caller.cancelled() => linked.cancel(),
                    () = linked.cancelled() => {}
                }
            }))
        });
        (token, link)
    }

    async fn settle(
        &self,
        previous: SessionState,
        result: &Result<ExecutionResponse>,
    ) {
        let (event, register) = {
            let mut guard = self.snapshot();
            let snapshot = &mut *guard;
            match result {
                Ok(response) => {
                    snapshot.message_count = snapshot.message_count.saturating_add(1);
                    snapshot.last_message_at = Some(Utc::now());
                    if response.is_success() {
                        bind_id(snapshot, response.session_id.as_deref());
                        snapshot.machine.complete_turn(previous, snapshot.id.is_some());
                        snapshot.last_error = None;
                        let register = if snapshot.registered
                            || snapshot.machine.state() == SessionState::Aborted
                        {
                            None
                        } else {
                            snapshot.id.clone()
                        };
                        snapshot.registered |= register.is_some();
                        (
                            Some(SessionEvent::Complete {
                                session_id: snapshot.id.clone(),
                                response: Arc::new(response.clone()),
                            }),
                            register,
                        )
                    } else {
                        snapshot.machine.fail_turn(previous);
                        snapshot.last_error = response.error.as_ref().map(|e| e.message.clone());
                        (
                            Some(SessionEvent::Complete {
                                session_id: snapshot.id.clone(),
                                response: Arc::new(response.clone()),
                            }),
                            None,
                        )
                    }
                }
                Err(err) => {
                    snapshot.machine.fail_turn(previous);
                    snapshot.last_error = Some(err.to_string());
                    // Abort already published its own notification.
                    let event = (!matches!(err, AgentError::Aborted | AgentError::SessionClosed))
                        .then(|| SessionEvent::Error {
                            session_id: snapshot.id.clone(),
                            message: err.to_string(),
                        });
                    (event, None)
                }
            }
        };

        if let Some(id) = register {
            if let Some(registry) = self.inner.registry.upgrade() {
                registry.register(id.clone(), self.clone()).await;
                if self.state() == SessionState::Aborted {
                    registry.remove(&id).await;
                }
            }
        }
        if let Some(event) = event {
            let _ = self.inner.events.send(event);
        }
    }

    /// Abort the session: cancel any running turn, publish
    /// [`SessionEvent::Aborted`], and deregister. Safe to call repeatedly;
    /// returns true only for the call that aborted.
    pub async fn abort(&self) -> bool {
        let id = {
            let mut snapshot = self.snapshot();
            if !snapshot.machine.abort() {
                return false;
            }
            snapshot.id.clone()
        };
        tracing::debug!(session_id = ?id, "Aborting session");
        self.inner.cancel.cancel();
        if let (Some(id), Some(registry)) = (&id, self.inner.registry.upgrade()) {
            registry.remove(id).await;
        }
        let _ = self
            .inner
            .events
            .send(SessionEvent::Aborted { session_id: id });
        true
    }

    /// Subscribe to session notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Session notifications as a stream. Notifications missed by a slow
    /// consumer are skipped.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|item| std::future::ready(item.ok()))
    }

    /// Backend-issued id, unset until the first successful send.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.snapshot().id.clone()
    }

    #[must_use]
    pub fn adapter_name(&self) -> &'static str {
        self.inner.adapter.name()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.snapshot().machine.state()
    }

    /// Number of sends that produced a response.
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.snapshot().message_count
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.snapshot().started_at
    }

    #[must_use]
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_message_at
    }

    /// Error of the most recent failed send, cleared by a success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.snapshot().last_error.clone()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.snapshot().machine.stats()
    }

    /// Snapshot for listings. `None` until an id is bound.
    #[must_use]
    pub fn info(&self) -> Option<SessionInfo> {
        let snapshot = self.snapshot();
        Some(SessionInfo {
            id: snapshot.id.clone()?,
            adapter: self.inner.adapter.name(),
            state: snapshot.machine.state(),
            message_count: snapshot.message_count,
            started_at: snapshot.started_at,
            last_message_at: snapshot.last_message_at,
        })
    }
}

/// Bind `reported` if no id is bound yet.
///
/// A bound id never changes; a backend reporting a different one is logged.
fn bind_id(snapshot: &mut Snapshot, reported: Option<&str>) {
    let Some(reported) = reported.filter(|id| !id.is_empty()) else {
        return;
    };
    match &snapshot.id {
        None => {
            tracing::debug!(session_id = %reported, "Captured session id");
            snapshot.id = Some(reported.to_string());
        }
        Some(bound) if bound != reported => {
            tracing::warn!(
                bound = %bound,
                reported = %reported,
                "Backend reported a different session id; keeping the bound id"
            );
        }
        Some(_) => {}
    }
}
