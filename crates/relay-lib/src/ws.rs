// ============================
// relay-lib/src/ws.rs
// ============================
//! WebSocket router, per-connection loop and the event dispatcher that
//! routes tagged inbound events to the component operations.

use crate::error::RelayError;
use crate::metrics::{WS_ACTIVE, WS_CONNECTIONS};
use crate::registry::ConnId;
use crate::{presence, relay, session, AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use relay_common::{ClientEvent, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

/// Outbound events buffered per connection before fan-out backpressure
/// applies.
const OUTBOUND_BUFFER: usize = 64;

/// Build the relay router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Convenience introspection surface, not part of the protocol.
async fn healthz(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "rooms": state.rooms.len(),
        "connections": state.registry.connection_count(),
        "sessions": state.registry.session_count(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    counter!(WS_CONNECTIONS).increment(1);
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    gauge!(WS_ACTIVE).increment(1.0);
    let (mut sink, mut stream) = socket.split();

    // Outbound channel drained by a forwarding task; everything the
    // relay says to this client goes through it, broadcast and replies
    // alike.
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);
    let conn = state.registry.register(tx);
    tracing::info!(%conn, "connection opened");

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Greet, then announce the emote table. It is sent again after each
    // join to close the race where a join beats the table load.
    let _ = state
        .registry
        .send_to(
            conn,
            ServerEvent::Status {
                message: "Connected to server.".to_string(),
            },
        )
        .await;
    let _ = state.registry.send_to(conn, state.emotes.to_event()).await;

    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => dispatch_event(&state, conn, event).await,
                Err(err) => {
                    let malformed = ServerEvent::Error {
                        code: "MALFORMED".to_string(),
                        message: err.to_string(),
                    };
                    if state.registry.send_to(conn, malformed).await.is_err() {
                        break;
                    }
                },
            },
            Message::Close(_) => break,
            _ => {},
        }
    }

    // Transport close and cleanup funnel into the same disconnect path.
    if let Err(err) = session::disconnect(&state, conn).await {
        tracing::warn!(%conn, %err, "disconnect cleanup failed");
    }
    tracing::info!(%conn, "connection closed");
    gauge!(WS_ACTIVE).decrement(1.0);
    send_task.abort();
}

/// Route one inbound event to the owning component. Errors go back to
/// the offending connection only; silent ones are dropped.
pub async fn dispatch_event(state: &AppState, conn: ConnId, event: ClientEvent) {
    match event {
        ClientEvent::Join { room, user } => match session::join(state, conn, &room, &user).await {
            Ok((messages, users)) => {
                let _ = state
                    .registry
                    .send_to(conn, ServerEvent::RoomHistory { messages, users })
                    .await;
                let _ = state.registry.send_to(conn, state.emotes.to_event()).await;
            },
            Err(err) => report(state, conn, err).await,
        },
        ClientEvent::Leave => {
            if let Err(err) = session::leave(state, conn).await {
                report(state, conn, err).await;
            }
        },
        ClientEvent::Message { room, user, text } => {
            if let Err(err) = relay::submit(state, conn, &room, &user, &text).await {
                report(state, conn, err).await;
            }
        },
        ClientEvent::BotMessage { room, user, text } => {
            // the agent path never surfaces errors, mirroring its
            // fire-and-forget contract
            if let Err(err) = relay::submit_agent(state, &room, &user, &text).await {
                tracing::debug!(%conn, %err, "agent message dropped");
            }
        },
        ClientEvent::Typing { .. } => presence::typing(state, conn, true).await,
        ClientEvent::StopTyping { .. } => presence::typing(state, conn, false).await,
    }
}

async fn report(state: &AppState, conn: ConnId, err: RelayError) {
    if err.is_silent() {
        return;
    }
    if let Err(send_err) = state.registry.send_to(conn, err.to_event()).await {
        tracing::debug!(%conn, %send_err, "could not report error to client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::emotes::EmoteTable;
    use tokio::sync::mpsc;

    fn test_state() -> AppState {
        AppState::new(Settings::default(), EmoteTable::empty())
    }

    fn connect(state: &AppState) -> (ConnId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (state.registry.register(tx), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn join_replies_with_announcement_history_then_emotes() {
        let state = test_state();
        let (conn, mut rx) = connect(&state);

        dispatch_event(
            &state,
            conn,
            ClientEvent::Join {
                room: "lobby".into(),
                user: "alice".into(),
            },
        )
        .await;

        // the joiner hears its own announcement, then gets the snapshots
        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            ServerEvent::UserJoined {
                user: "alice".into()
            }
        );
        assert!(matches!(events[1], ServerEvent::Status { .. }));
        match &events[2] {
            ServerEvent::RoomHistory { messages, users } => {
                assert!(messages.is_empty());
                assert_eq!(users, &vec!["alice".to_string()]);
            },
            other => panic!("Expected RoomHistory, got {other:?}"),
        }
        assert!(matches!(events[3], ServerEvent::Emotes { .. }));
    }

    #[tokio::test]
    async fn invalid_join_reports_error_to_sender_only() {
        let state = test_state();
        let (conn, mut rx) = connect(&state);
        let (_other, mut rx_other) = connect(&state);

        dispatch_event(
            &state,
            conn,
            ClientEvent::Join {
                room: "".into(),
                user: "alice".into(),
            },
        )
        .await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ServerEvent::Error { code, .. } if code == "INVALID_JOIN"
        ));
        assert!(drain(&mut rx_other).is_empty());
    }

    #[tokio::test]
    async fn empty_message_produces_no_error_event() {
        let state = test_state();
        let (conn, mut rx) = connect(&state);
        dispatch_event(
            &state,
            conn,
            ClientEvent::Join {
                room: "lobby".into(),
                user: "alice".into(),
            },
        )
        .await;
        drain(&mut rx);

        dispatch_event(
            &state,
            conn,
            ClientEvent::Message {
                room: "lobby".into(),
                user: "alice".into(),
                text: "   ".into(),
            },
        )
        .await;

        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn session_mismatch_surfaces_invalid_session() {
        let state = test_state();
        let (conn, mut rx) = connect(&state);
        dispatch_event(
            &state,
            conn,
            ClientEvent::Join {
                room: "lobby".into(),
                user: "alice".into(),
            },
        )
        .await;
        drain(&mut rx);

        dispatch_event(
            &state,
            conn,
            ClientEvent::Message {
                room: "lobby".into(),
                user: "mallory".into(),
                text: "spoof".into(),
            },
        )
        .await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ServerEvent::Error { code, .. } if code == "INVALID_SESSION"
        ));
    }
}
