//! Shared helpers for gateway tests: in-memory state wiring and fake
//! connections attached straight to the room registry.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use parley_coord::MemoryCoord;
use parley_shared::events::ServerEvent;
use parley_shared::types::UserId;
use parley_store::MemoryStore;

use crate::auth::LogSmsSender;
use crate::config::ServerConfig;
use crate::gateway::Session;
use crate::rooms::RoomRegistry;
use crate::state::{AppState, Persistence};

pub fn test_state() -> (AppState, Arc<MemoryCoord>, Arc<MemoryStore>) {
    let coord = Arc::new(MemoryCoord::new());
    let store = Arc::new(MemoryStore::new());
    let state = AppState::build(
        ServerConfig::default(),
        coord.clone(),
        coord.clone(),
        Persistence {
            messages: store.clone(),
            group_messages: store.clone(),
            groups: store.clone(),
            users: store.clone(),
        },
        Arc::new(LogSmsSender),
    );
    (state, coord, store)
}

/// A second "process": shares the coordination store, bus, and
/// persistence with `state`, but holds its own room registry and
/// connections.
pub fn sibling_state(
    state: &AppState,
    coord: Arc<MemoryCoord>,
    store: Arc<MemoryStore>,
) -> AppState {
    AppState::build(
        (*state.config).clone(),
        coord.clone(),
        coord,
        Persistence {
            messages: store.clone(),
            group_messages: store.clone(),
            groups: store.clone(),
            users: store,
        },
        Arc::new(LogSmsSender),
    )
}

/// Simulate an authenticated connection: a session wired into the room
/// registry and presence directory, with its outbound events readable
/// from the returned receiver.
pub async fn connect_user(
    state: &AppState,
    user: UserId,
) -> (Session, UnboundedReceiver<ServerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::new(user, tx);

    state.rooms.connect(session.conn, session.outbound());
    state
        .rooms
        .join(&RoomRegistry::personal_room(user), session.conn);
    state.presence.register(user, session.conn).await.unwrap();
    state.presence.mark_online(user).await.unwrap();

    (session, rx)
}

/// Pop every event currently queued for a fake connection.
pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
