// ============================
// relay-lib/src/room.rs
// ============================
//! Room store: one actor task per room owning the presence set and the
//! bounded message history. Routing every mutation through the actor's
//! command channel serializes per-room state changes; rooms never
//! contend with each other.

use crate::error::RelayError;
use crate::metrics::ROOMS_CREATED;
use dashmap::DashMap;
use metrics::counter;
use relay_common::{ChatMessage, ROOM_HISTORY_LIMIT};
use std::collections::{HashSet, VecDeque};
use tokio::sync::mpsc;

/// Message sent *into* the actor
#[derive(Debug)]
pub enum RoomCmd {
    /// Add a user and return (history, presence) snapshots atomically
    Join {
        user: String,
        resp_tx: mpsc::UnboundedSender<(Vec<ChatMessage>, Vec<String>)>,
    },
    /// Remove a user; replies whether the name was present
    Leave {
        user: String,
        resp_tx: mpsc::UnboundedSender<bool>,
    },
    /// Append a message, trimming to the history bound
    Append {
        message: ChatMessage,
        resp_tx: mpsc::UnboundedSender<()>,
    },
    /// Last `limit` messages, oldest first
    History {
        limit: usize,
        resp_tx: mpsc::UnboundedSender<Vec<ChatMessage>>,
    },
    /// Current presence set, sorted
    Presence {
        resp_tx: mpsc::UnboundedSender<Vec<String>>,
    },
}

/// Handle other components keep to a room's actor.
#[derive(Clone)]
pub struct RoomHandle {
    cmd_tx: mpsc::UnboundedSender<RoomCmd>,
}

impl RoomHandle {
    pub async fn join(&self, user: String) -> Result<(Vec<ChatMessage>, Vec<String>), RelayError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(RoomCmd::Join { user, resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| RelayError::Internal("room actor gone".to_string()))
    }

    pub async fn leave(&self, user: String) -> Result<bool, RelayError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(RoomCmd::Leave { user, resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| RelayError::Internal("room actor gone".to_string()))
    }

    pub async fn append(&self, message: ChatMessage) -> Result<(), RelayError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(RoomCmd::Append { message, resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| RelayError::Internal("room actor gone".to_string()))
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<ChatMessage>, RelayError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(RoomCmd::History { limit, resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| RelayError::Internal("room actor gone".to_string()))
    }

    pub async fn presence(&self) -> Result<Vec<String>, RelayError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(RoomCmd::Presence { resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| RelayError::Internal("room actor gone".to_string()))
    }
}

pub struct RoomActor {
    id: String,
    users: HashSet<String>,
    history: VecDeque<ChatMessage>,
}

impl RoomActor {
    pub fn new(id: String) -> Self {
        RoomActor {
            id,
            users: HashSet::new(),
            history: VecDeque::new(),
        }
    }

    /// Presence is a set of names; adding an existing name is a no-op.
    fn join(&mut self, user: String) -> (Vec<ChatMessage>, Vec<String>) {
        self.users.insert(user);
        (self.history_snapshot(ROOM_HISTORY_LIMIT), self.presence())
    }

    fn leave(&mut self, user: &str) -> bool {
        self.users.remove(user)
    }

    fn append(&mut self, message: ChatMessage) {
        self.history.push_back(message);
        while self.history.len() > ROOM_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    fn history_snapshot(&self, limit: usize) -> Vec<ChatMessage> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    fn presence(&self) -> Vec<String> {
        let mut users: Vec<String> = self.users.iter().cloned().collect();
        users.sort();
        users
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCmd>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                RoomCmd::Join { user, resp_tx } => {
                    let _ = resp_tx.send(self.join(user));
                },
                RoomCmd::Leave { user, resp_tx } => {
                    let _ = resp_tx.send(self.leave(&user));
                },
                RoomCmd::Append { message, resp_tx } => {
                    self.append(message);
                    let _ = resp_tx.send(());
                },
                RoomCmd::History { limit, resp_tx } => {
                    let _ = resp_tx.send(self.history_snapshot(limit));
                },
                RoomCmd::Presence { resp_tx } => {
                    let _ = resp_tx.send(self.presence());
                },
            }
        }
        tracing::debug!(room = %self.id, "room actor stopped");
    }
}

/// Spawn a new room actor and return its handle.
pub fn spawn_room_actor(id: &str) -> RoomHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let actor = RoomActor::new(id.to_string());
    tokio::spawn(actor.run(cmd_rx));
    RoomHandle { cmd_tx }
}

/// Map of room id to actor handle. Rooms are created lazily on first
/// use and never destroyed; an empty room's id stays addressable.
pub struct RoomMap {
    rooms: DashMap<String, RoomHandle>,
}

impl Default for RoomMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomMap {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Get the room's handle, creating the actor if absent. Idempotent.
    pub fn ensure(&self, id: &str) -> RoomHandle {
        self.rooms
            .entry(id.to_string())
            .or_insert_with(|| {
                counter!(ROOMS_CREATED).increment(1);
                tracing::info!(room = id, "room created");
                spawn_room_actor(id)
            })
            .value()
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.get(id).map(|h| h.value().clone())
    }

    /// Last `limit` messages of a room, oldest first. An absent or
    /// empty room yields an empty list, never an error.
    pub async fn recent_history(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RelayError> {
        match self.get(id) {
            Some(handle) => handle.history(limit).await,
            None => Ok(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
