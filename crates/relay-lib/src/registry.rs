// ============================
// relay-lib/src/registry.rs
// ============================
//! Connection registry: maps each live transport connection to its
//! outbound channel and at most one session.

use crate::error::RelayError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use relay_common::ServerEvent;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque connection identifier, unique for the connection's lifetime.
pub type ConnId = Uuid;

/// The live binding of one connection to one (room, user) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room: String,
    pub user: String,
    pub joined_at: DateTime<Utc>,
}

impl Session {
    pub fn new(room: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            user: user.into(),
            joined_at: Utc::now(),
        }
    }
}

/// State tracked per live connection.
pub struct ConnectionEntry {
    /// Outbound channel drained by the connection's forwarding task
    pub tx: mpsc::Sender<ServerEvent>,
    /// Zero or one session at any instant
    pub session: Option<Session>,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Owns the connection map; all access goes through these methods so
/// the synchronization discipline stays in one place.
pub struct ConnectionRegistry {
    conns: DashMap<ConnId, ConnectionEntry>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
        }
    }

    /// Register a new connection with its outbound channel.
    pub fn register(&self, tx: mpsc::Sender<ServerEvent>) -> ConnId {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conns.insert(
            id,
            ConnectionEntry {
                tx,
                session: None,
                connected_at: now,
                last_seen: now,
            },
        );
        id
    }

    /// Remove a connection. Idempotent: returns false if it was
    /// already gone (e.g. transport close raced with cleanup).
    ///
    /// This only drops the registry entry. Closing a live connection
    /// goes through [`session::disconnect`](crate::session::disconnect),
    /// which runs the leave path first; a session still attached here
    /// means that path was skipped and the room's presence set has gone
    /// stale.
    pub fn unregister(&self, id: ConnId) -> bool {
        match self.conns.remove(&id) {
            Some((_, entry)) => {
                if let Some(session) = entry.session {
                    tracing::warn!(
                        conn = %id,
                        room = %session.room,
                        user = %session.user,
                        "unregistered a connection that never left its room"
                    );
                }
                true
            }
            None => false,
        }
    }

    pub fn session_of(&self, id: ConnId) -> Option<Session> {
        self.conns.get(&id).and_then(|e| e.session.clone())
    }

    pub fn set_session(&self, id: ConnId, session: Session) {
        if let Some(mut entry) = self.conns.get_mut(&id) {
            entry.session = Some(session);
        }
    }

    /// Detach and return the session, if any.
    pub fn clear_session(&self, id: ConnId) -> Option<Session> {
        self.conns.get_mut(&id).and_then(|mut e| e.session.take())
    }

    /// Record activity on a connection.
    pub fn touch(&self, id: ConnId) {
        if let Some(mut entry) = self.conns.get_mut(&id) {
            entry.last_seen = Utc::now();
        }
    }

    /// Senders of every connection whose session points at `room`.
    /// Senders are cloned out so no shard lock is held during fan-out.
    pub fn members_of(&self, room: &str) -> Vec<(ConnId, mpsc::Sender<ServerEvent>)> {
        self.conns
            .iter()
            .filter(|e| e.session.as_ref().is_some_and(|s| s.room == room))
            .map(|e| (*e.key(), e.tx.clone()))
            .collect()
    }

    /// Send one event to one connection.
    pub async fn send_to(&self, id: ConnId, event: ServerEvent) -> Result<(), RelayError> {
        let tx = self
            .conns
            .get(&id)
            .map(|e| e.tx.clone())
            .ok_or(RelayError::TransportFailure)?;
        tx.send(event)
            .await
            .map_err(|_| RelayError::TransportFailure)
    }

    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    pub fn session_count(&self) -> usize {
        self.conns.iter().filter(|e| e.session.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(16)
    }

    #[tokio::test]
    async fn register_and_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();

        let id = registry.register(tx);
        assert_eq!(registry.connection_count(), 1);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id)); // second call is a no-op
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn unregister_with_live_session_still_removes_the_connection() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();
        let id = registry.register(tx);
        registry.set_session(id, Session::new("lobby", "alice"));

        // skipping the leave path is logged, not fatal
        assert!(registry.unregister(id));
        assert_eq!(registry.connection_count(), 0);
        assert!(registry.members_of("lobby").is_empty());
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();
        let id = registry.register(tx);

        assert!(registry.session_of(id).is_none());
        assert_eq!(registry.session_count(), 0);

        registry.set_session(id, Session::new("lobby", "alice"));
        let session = registry.session_of(id).unwrap();
        assert_eq!(session.room, "lobby");
        assert_eq!(session.user, "alice");
        assert_eq!(registry.session_count(), 1);

        let cleared = registry.clear_session(id).unwrap();
        assert_eq!(cleared.user, "alice");
        assert!(registry.session_of(id).is_none());
        assert!(registry.clear_session(id).is_none());
    }

    #[tokio::test]
    async fn members_of_filters_by_room_and_session() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let (tx_c, _rx_c) = channel();

        let a = registry.register(tx_a);
        let b = registry.register(tx_b);
        let _idle = registry.register(tx_c); // connected, never joined

        registry.set_session(a, Session::new("lobby", "alice"));
        registry.set_session(b, Session::new("other", "bob"));

        let members = registry.members_of("lobby");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].0, a);
    }

    #[tokio::test]
    async fn send_to_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        let err = registry
            .send_to(
                Uuid::new_v4(),
                ServerEvent::Status {
                    message: "hi".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TransportFailure));
    }
}
