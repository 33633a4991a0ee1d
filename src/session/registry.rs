//! Registry of sessions that have a backend-issued id.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::session::Session;
use super::state::SessionState;

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub adapter: &'static str,
    pub state: SessionState,
    pub message_count: u64,
    pub started_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Sessions keyed by their backend-issued id.
///
/// Safe for concurrent registration, lookup and removal.
#[derive(Debug, Default)]
pub struct ActiveSessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl ActiveSessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: String, session: Session) {
        tracing::debug!(session_id = %id, "Registering session");
        self.sessions.write().await.insert(id, session);
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    /// Snapshots of every registered session, ordered by start time.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        let mut infos: Vec<SessionInfo> = sessions.iter().filter_map(Session::info).collect();
        infos.sort_by_key(|info| info.started_at);
        infos
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
