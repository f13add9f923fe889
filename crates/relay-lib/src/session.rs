// ============================
// relay-lib/src/session.rs
// ============================
//! Session manager: owns the join/leave/rejoin protocol and keeps the
//! connection registry and room store consistent on every transition.
//!
//! Ordering invariant: presence is added to the room before the session
//! is attached to the connection, and the session is detached before
//! presence is removed. A reader therefore never observes a session
//! whose room does not contain its user.

use crate::error::RelayError;
use crate::registry::{ConnId, Session};
use crate::relay::broadcast_to_room;
use crate::AppState;
use relay_common::{ChatMessage, ServerEvent};

/// Join a room, leaving the current one first if a session exists.
/// Returns the room's history and presence snapshots for the caller.
/// `user_joined` and a status line go to the whole room, the joiner
/// included — every client's membership view comes from the same
/// broadcast, like the message echo.
pub async fn join(
    state: &AppState,
    conn: ConnId,
    room: &str,
    user: &str,
) -> Result<(Vec<ChatMessage>, Vec<String>), RelayError> {
    let room = room.trim();
    let user = user.trim();
    if room.is_empty() || user.is_empty() {
        return Err(RelayError::InvalidJoinRequest);
    }

    // Rejoin composes leave-then-join; the leave fully commits before
    // the join begins. Events for one connection are handled one at a
    // time, so no other join/leave on this connection can interleave.
    leave(state, conn).await?;

    let handle = state.rooms.ensure(room);
    let (history, users) = handle.join(user.to_string()).await?;
    state.registry.set_session(conn, Session::new(room, user));

    tracing::info!(%conn, room, user, "joined room");

    broadcast_to_room(
        state,
        room,
        &ServerEvent::UserJoined { user: user.to_string() },
        None,
    )
    .await;
    broadcast_to_room(
        state,
        room,
        &ServerEvent::Status {
            message: format!("{user} joined"),
        },
        None,
    )
    .await;

    Ok((history, users))
}

/// Leave the current room. No-op (not an error) without a session.
pub async fn leave(state: &AppState, conn: ConnId) -> Result<(), RelayError> {
    let Some(session) = state.registry.clear_session(conn) else {
        return Ok(());
    };

    let handle = state.rooms.ensure(&session.room);
    let removed = handle.leave(session.user.clone()).await?;

    tracing::info!(%conn, room = %session.room, user = %session.user, "left room");

    if removed {
        broadcast_to_room(
            state,
            &session.room,
            &ServerEvent::UserLeft {
                user: session.user.clone(),
            },
            None,
        )
        .await;
    }

    Ok(())
}

/// Transport close: leave, then discard the connection entirely.
/// Safe to call twice; both halves are idempotent.
pub async fn disconnect(state: &AppState, conn: ConnId) -> Result<(), RelayError> {
    leave(state, conn).await?;
    state.registry.unregister(conn);
    Ok(())
}
