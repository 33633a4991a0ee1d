//! Client façade over one adapter.

use std::sync::Arc;

use crate::adapter::{create_adapter, Adapter, ExecuteOptions};
use crate::config::{Backend, SdkConfig};
use crate::error::{Capability, Result};
use crate::session::{ActiveSessionRegistry, Session, SessionInfo};
use crate::stream::ExecutionResponse;

/// Entry point owning one adapter and the sessions created through it.
///
/// ```no_run
/// use agent_cli_sdk::{ClaudeAdapter, Client};
///
/// # async fn demo() -> agent_cli_sdk::Result<()> {
/// let client = Client::new(ClaudeAdapter::default());
/// let session = client.create_session(None)?;
/// let first = session.send("Summarise src/lib.rs", None).await?;
/// let second = session.send("Now list its public types", None).await?;
/// assert_eq!(first.session_id, second.session_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    adapter: Arc<dyn Adapter>,
    registry: Arc<ActiveSessionRegistry>,
}

impl Client {
    #[must_use]
    pub fn new(adapter: impl Adapter + 'static) -> Self {
        Self::from_adapter(Arc::new(adapter))
    }

    #[must_use]
    pub fn from_adapter(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            adapter,
            registry: Arc::new(ActiveSessionRegistry::new()),
        }
    }

    /// Build a client for `backend`, or the config's default backend.
    #[must_use]
    pub fn from_config(config: &SdkConfig, backend: Option<Backend>) -> Self {
        let backend = backend.unwrap_or(config.backend);
        Self::from_adapter(create_adapter(backend, config.adapter(backend).clone()))
    }

    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Run one stateless prompt.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Adapter::execute`].
    pub async fn execute(&self, prompt: &str, options: ExecuteOptions) -> Result<ExecutionResponse> {
        self.adapter.execute(prompt, options).await
    }

    /// Create a session. It becomes discoverable through
    /// [`Client::get_session`] after its first successful send.
    ///
    /// A resume id in `options` continues an existing conversation.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Capability` if the adapter has no session
    /// management.
    pub fn create_session(&self, options: Option<ExecuteOptions>) -> Result<Session> {
        self.adapter.require(Capability::SessionManagement)?;
        Ok(Session::new(
            Arc::clone(&self.adapter),
            options.unwrap_or_default(),
            Arc::downgrade(&self.registry),
        ))
    }

    pub async fn get_session(&self, id: &str) -> Option<Session> {
        self.registry.get(id).await
    }

    pub async fn list_active_sessions(&self) -> Vec<SessionInfo> {
        self.registry.list().await
    }

    /// Abort the session registered under `id`. Returns false if none is.
    pub async fn abort_session(&self, id: &str) -> bool {
        match self.registry.get(id).await {
            Some(session) => {
                session.abort().await;
                true
            }
            None => false,
        }
    }
}
