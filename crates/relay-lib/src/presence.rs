// ============================
// relay-lib/src/presence.rs
// ============================
//! Typing indicator fan-out. Ephemeral: nothing is stored, nothing is
//! ordered against message history, and a lost event self-heals on the
//! next keystroke or the paired stop-typing.

use crate::registry::ConnId;
use crate::relay::broadcast_to_room;
use crate::AppState;
use relay_common::ServerEvent;

/// Broadcast a typing / stop-typing signal to every *other* member of
/// the caller's room. No session, no-op — the claimed payload fields on
/// the wire are ignored; the session is authoritative.
pub async fn typing(state: &AppState, conn: ConnId, active: bool) {
    let Some(session) = state.registry.session_of(conn) else {
        return;
    };

    let event = if active {
        ServerEvent::Typing {
            user: session.user.clone(),
        }
    } else {
        ServerEvent::StopTyping {
            user: session.user.clone(),
        }
    };

    broadcast_to_room(state, &session.room, &event, Some(conn)).await;
}
