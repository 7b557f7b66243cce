//! Session presence gateway.
//!
//! Presence is owned by an external store; the hub reads snapshots and
//! issues heartbeat/position commands through this trait.  Failures surface
//! to the router, which answers the inbound frame with an `error` envelope.

use async_trait::async_trait;
use plaza_protocol::Position;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// What the presence store knows about one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: String,
    pub map_id: String,
    pub avatar_pos: Position,
    pub is_active: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("presence store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PresenceGateway: Send + Sync {
    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, PresenceError>;

    /// Refresh the session's liveness TTL.
    async fn session_heartbeat(&self, session_id: &str) -> Result<(), PresenceError>;

    /// Persist an accepted avatar position.  Idempotent.
    async fn update_avatar_position(
        &self,
        session_id: &str,
        position: Position,
    ) -> Result<(), PresenceError>;
}

/// In-memory presence store for single-process deployments and tests.
#[derive(Default)]
pub struct MemoryPresence {
    sessions: RwLock<HashMap<String, SessionSnapshot>>,
}

impl MemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, snapshot: SessionSnapshot) {
        self.sessions
            .write()
            .await
            .insert(snapshot.session_id.clone(), snapshot);
    }

    pub async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    pub async fn set_active(&self, session_id: &str, is_active: bool) {
        if let Some(snapshot) = self.sessions.write().await.get_mut(session_id) {
            snapshot.is_active = is_active;
        }
    }
}

#[async_trait]
impl PresenceGateway for MemoryPresence {
    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, PresenceError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| PresenceError::NotFound(session_id.to_owned()))
    }

    async fn session_heartbeat(&self, session_id: &str) -> Result<(), PresenceError> {
        // No TTL to refresh in memory; the lookup doubles as the liveness check.
        self.get_session(session_id).await.map(|_| ())
    }

    async fn update_avatar_position(
        &self,
        session_id: &str,
        position: Position,
    ) -> Result<(), PresenceError> {
        match self.sessions.write().await.get_mut(session_id) {
            Some(snapshot) => {
                snapshot.avatar_pos = position;
                Ok(())
            }
            None => Err(PresenceError::NotFound(session_id.to_owned())),
        }
    }
}
