//! Typing indicator relay.
//!
//! Stateless and best-effort: resolve the peer, forward, and silently
//! drop when the peer is unreachable. Nothing is persisted or retried;
//! clients self-clear stale indicators after a couple of seconds.

use parley_shared::events::ServerEvent;
use parley_shared::types::UserId;

use crate::gateway::Session;
use crate::state::AppState;

pub async fn relay(state: &AppState, session: &Session, to: UserId, is_typing: bool) {
    if let Some(conn) = state.presence.lookup(to).await {
        state.rooms.send_to_conn(
            conn,
            ServerEvent::TypingStatus {
                user_id: session.user,
                is_typing,
            },
        );
    }
}
