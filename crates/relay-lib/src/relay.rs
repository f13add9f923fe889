// ============================
// relay-lib/src/relay.rs
// ============================
//! Message relay: validates inbound messages against the sender's
//! session, appends them to the room history and fans them out to
//! every connection joined to the room.

use crate::error::RelayError;
use crate::metrics::{MESSAGES_ACCEPTED, MESSAGES_REJECTED};
use crate::registry::ConnId;
use crate::AppState;
use metrics::counter;
use relay_common::{ChatMessage, ServerEvent};

/// Submit a human message. The connection's session must match the
/// claimed `(room, user)` exactly; a mismatch (stale client state,
/// spoofing, or a race with a concurrent leave) is `InvalidSession`.
/// The sender receives the message via the broadcast echo like everyone
/// else, so every client's transcript is exactly what the relay sent.
pub async fn submit(
    state: &AppState,
    conn: ConnId,
    room: &str,
    user: &str,
    text: &str,
) -> Result<(), RelayError> {
    let valid = state
        .registry
        .session_of(conn)
        .is_some_and(|s| s.room == room && s.user == user);
    if !valid {
        counter!(MESSAGES_REJECTED).increment(1);
        return Err(RelayError::InvalidSession);
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(RelayError::EmptyMessage);
    }

    state.registry.touch(conn);
    deliver(state, room, ChatMessage::new(user, text, false)).await
}

/// Submit an agent message. Agents broadcast under a claimed name with
/// no live session and never enter the presence set; blank fields are
/// dropped without an error, matching the looser trust model for
/// autonomous participants.
pub async fn submit_agent(
    state: &AppState,
    room: &str,
    user: &str,
    text: &str,
) -> Result<(), RelayError> {
    let room = room.trim();
    let user = user.trim();
    let text = text.trim();
    if room.is_empty() || user.is_empty() || text.is_empty() {
        return Err(RelayError::EmptyMessage);
    }

    deliver(state, room, ChatMessage::new(user, text, true)).await
}

/// Append then broadcast, sender included.
async fn deliver(state: &AppState, room: &str, message: ChatMessage) -> Result<(), RelayError> {
    let handle = state.rooms.ensure(room);
    handle.append(message.clone()).await?;

    counter!(MESSAGES_ACCEPTED).increment(1);
    tracing::debug!(room, user = %message.user, agent = message.is_agent, "message accepted");

    broadcast_to_room(state, room, &ServerEvent::Message { message }, None).await;
    Ok(())
}

/// Fan an event out to every connection whose session points at `room`,
/// optionally excluding one connection. A recipient whose channel has
/// closed is skipped; its own disconnect path cleans it up.
pub async fn broadcast_to_room(
    state: &AppState,
    room: &str,
    event: &ServerEvent,
    skip: Option<ConnId>,
) {
    for (id, tx) in state.registry.members_of(room) {
        if skip == Some(id) {
            continue;
        }
        if tx.send(event.clone()).await.is_err() {
            tracing::debug!(conn = %id, room, "recipient channel closed, skipping");
        }
    }
}
