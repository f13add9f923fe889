// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between chat clients and the relay server.
//! This module defines the WebSocket protocol events and the message record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of messages retained per room. Oldest evicted first.
pub const ROOM_HISTORY_LIMIT: usize = 200;

/// A single chat message. Immutable once created; clients deduplicate on `id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author user name (caller-supplied, not globally unique)
    pub user: String,
    /// Message body, already trimmed
    pub text: String,
    /// Unix milliseconds, for ordering and display
    pub timestamp: i64,
    /// Derived from (author, high-resolution time)
    pub id: String,
    /// True for autonomous-agent traffic, so agents can ignore each other
    #[serde(rename = "isAgent")]
    pub is_agent: bool,
}

impl ChatMessage {
    /// Build a message stamped with the current wall clock.
    pub fn new(user: impl Into<String>, text: impl Into<String>, is_agent: bool) -> Self {
        let user = user.into();
        let now = Utc::now();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_millis());
        Self {
            id: format!("{user}-{nanos}"),
            user,
            text: text.into(),
            timestamp: now.timestamp_millis(),
            is_agent,
        }
    }
}

/// Events sent from client to relay
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a room (leaves the current one first, if any)
    Join { room: String, user: String },
    /// Leave the current room; no-op without a session
    Leave,
    /// Submit a chat message; `room`/`user` must match the session
    Message {
        room: String,
        user: String,
        text: String,
    },
    /// Agent-originated message; broadcast under a claimed name,
    /// no session required
    #[serde(alias = "agent_message")]
    BotMessage {
        room: String,
        user: String,
        text: String,
    },
    /// Typing indicator on. Payload fields are accepted for wire
    /// compatibility but the session is authoritative.
    Typing {
        #[serde(default)]
        room: String,
        #[serde(default)]
        user: String,
    },
    /// Typing indicator off
    StopTyping {
        #[serde(default)]
        room: String,
        #[serde(default)]
        user: String,
    },
}

/// Events sent from relay to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent to a connection immediately after a successful join
    RoomHistory {
        messages: Vec<ChatMessage>,
        users: Vec<String>,
    },
    /// Broadcast on every accepted message, sender included
    Message {
        #[serde(flatten)]
        message: ChatMessage,
    },
    /// Broadcast to a room on membership change
    UserJoined { user: String },
    UserLeft { user: String },
    /// Ephemeral typing indicators, sender excluded
    Typing { user: String },
    StopTyping { user: String },
    /// Emote name -> local file reference, sent after connect and join
    Emotes { emotes: HashMap<String, String> },
    /// Human-readable status line
    Status { message: String },
    /// Sent only to the offending connection, never broadcast
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_wire_names() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"join","room":"lobby","user":"alice"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Join { .. }));

        // bot_message and its agent_message alias parse to the same variant
        for name in ["bot_message", "agent_message"] {
            let raw = format!(r#"{{"type":"{name}","room":"r","user":"botX","text":"hi"}}"#);
            let event: ClientEvent = serde_json::from_str(&raw).unwrap();
            assert!(matches!(event, ClientEvent::BotMessage { .. }));
        }

        let event: ClientEvent = serde_json::from_str(r#"{"type":"stop_typing"}"#).unwrap();
        assert!(matches!(event, ClientEvent::StopTyping { .. }));
    }

    #[test]
    fn message_event_flattens_record() {
        let message = ChatMessage::new("bob", "hi", false);
        let json = serde_json::to_value(ServerEvent::Message {
            message: message.clone(),
        })
        .unwrap();

        assert_eq!(json["type"], "message");
        assert_eq!(json["user"], "bob");
        assert_eq!(json["text"], "hi");
        assert_eq!(json["isAgent"], false);
        assert_eq!(json["id"], serde_json::Value::String(message.id));
    }

    #[test]
    fn message_ids_embed_author_and_time() {
        let a = ChatMessage::new("alice", "one", false);
        let b = ChatMessage::new("alice", "two", false);
        assert!(a.id.starts_with("alice-"));
        assert_ne!(a.id, b.id);
        assert!(a.timestamp <= b.timestamp);
    }
}
