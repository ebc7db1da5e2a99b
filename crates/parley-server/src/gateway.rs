//! Connection gateway: handshake authentication and session lifecycle.
//!
//! One session per WebSocket connection, bound to exactly one identity
//! for its lifetime. The session loop multiplexes three event sources:
//! inbound frames (processed in receipt order), the outbound channel
//! other components push into, and the presence heartbeat. The heartbeat
//! lives inside the loop's `select!`, so closing the connection cancels
//! it deterministically.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use parley_shared::events::{ClientEvent, ServerEvent};
use parley_shared::types::{ConnectionId, UserId};

use crate::error::GatewayError;
use crate::rooms::{OutboundSender, RoomRegistry};
use crate::state::AppState;
use crate::{delivery, groups, typing};

/// One live, authenticated connection.
pub struct Session {
    pub conn: ConnectionId,
    pub user: UserId,
    pub authenticated_at: DateTime<Utc>,
    outbound: OutboundSender,
}

impl Session {
    pub fn new(user: UserId, outbound: OutboundSender) -> Self {
        Self {
            conn: ConnectionId::new(),
            user,
            authenticated_at: Utc::now(),
            outbound,
        }
    }

    /// Queue an event for this session's write loop. Sends to a closed
    /// session are dropped silently; the session loop is already tearing
    /// down and the result would not be observable anyway.
    pub fn push(&self, event: ServerEvent) {
        let _ = self.outbound.send(event);
    }

    pub fn outbound(&self) -> OutboundSender {
        self.outbound.clone()
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Upgrade handler. Authentication happens before the upgrade: a missing
/// credential is `Unauthenticated`, an unverifiable one (or one that
/// resolves to no known identity) is `InvalidCredential`, and either
/// terminates the connection attempt with a 401.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, GatewayError> {
    let token = query.token.ok_or(GatewayError::Unauthenticated)?;
    let user = state.auth.authenticate(&token).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user, state)))
}

async fn handle_socket(socket: WebSocket, user: UserId, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut outbound) = mpsc::unbounded_channel();
    let session = Session::new(user, tx);

    info!(user = %user, conn = %session.conn, "Session established");

    // Register locally, then in the shared directory. Presence failures
    // degrade: the session stays up and the next heartbeat retries.
    state.rooms.connect(session.conn, session.outbound());
    state
        .rooms
        .join(&RoomRegistry::personal_room(user), session.conn);

    if let Err(e) = state.presence.register(user, session.conn).await {
        warn!(user = %user, error = %e, "Presence registration failed");
    }
    if let Err(e) = state.presence.mark_online(user).await {
        warn!(user = %user, error = %e, "Online marker failed");
    }

    if state.config.presence_broadcast {
        state
            .rooms
            .broadcast_except(session.conn, &ServerEvent::UserOnline { user_id: user });
    }

    session.push(ServerEvent::Connected { user_id: user });

    let mut heartbeat = tokio::time::interval(std::time::Duration::from_secs(
        state.config.heartbeat_interval_secs,
    ));

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, &session, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(user = %user, error = %e, "Socket read error");
                        break;
                    }
                }
            }
            event = outbound.recv() => {
                let Some(event) = event else { break };
                match event.encode() {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(user = %user, error = %e, "Outbound encode failed"),
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = state.presence.mark_online(user).await {
                    warn!(user = %user, error = %e, "Heartbeat failed, retrying next interval");
                }
            }
        }
    }

    // Teardown order matters: the directory entry goes away before peers
    // hear `user_offline`, so a concurrent lookup can never see a stale
    // online mapping after the broadcast.
    state.rooms.disconnect(session.conn);
    if let Err(e) = state.presence.remove(user).await {
        warn!(user = %user, error = %e, "Presence removal failed");
    }
    if state.config.presence_broadcast {
        state
            .rooms
            .broadcast_except(session.conn, &ServerEvent::UserOffline { user_id: user });
    }

    let connected_secs = (Utc::now() - session.authenticated_at).num_seconds();
    info!(user = %user, conn = %session.conn, connected_secs, "Session closed");
}

/// Decode and dispatch one inbound frame. All failures are scoped to
/// this connection: they are logged, reported as an `error` event, and
/// never tear the session down.
async fn handle_frame(state: &AppState, session: &Session, text: &str) {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(user = %session.user, error = %e, "Malformed client event");
            session.push(ServerEvent::error("Invalid message data"));
            return;
        }
    };

    if let Err(e) = dispatch(state, session, event).await {
        warn!(user = %session.user, error = %e, "Event handler error");
        session.push(ServerEvent::error(e.to_string()));
    }
}

async fn dispatch(
    state: &AppState,
    session: &Session,
    event: ClientEvent,
) -> Result<(), GatewayError> {
    match event {
        ClientEvent::PrivateMessage { to, text } => {
            delivery::send_private(state, session, to, text).await
        }
        ClientEvent::MessageRead { message_id } => {
            delivery::mark_read(state, session, message_id).await
        }
        ClientEvent::Typing { to, is_typing } => {
            typing::relay(state, session, to, is_typing).await;
            Ok(())
        }
        ClientEvent::JoinMyGroups => groups::join_my_groups(state, session).await.map(|_| ()),
        ClientEvent::JoinGroup { group_id } => groups::join_group(state, session, group_id).await,
        ClientEvent::GroupMessage { group_id, text } => {
            groups::send_group(state, session, group_id, text).await
        }
        ClientEvent::LeaveGroup { group_id } => {
            groups::leave_group(state, session, group_id).await
        }
        ClientEvent::GroupMessageRead { message_id } => {
            groups::mark_group_read(state, session, message_id).await
        }
    }
}
