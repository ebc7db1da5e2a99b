//! Private-message delivery engine.
//!
//! Send path: persist first, deliver second. A crash between the two
//! leaves the message `sent`, which is always valid; `delivered` is only
//! recorded after the push to a live local connection succeeded.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use parley_coord::FailurePolicy;
use parley_shared::constants::{PRIVATE_MESSAGE_LIMIT, PRIVATE_MESSAGE_WINDOW_SECS};
use parley_shared::events::{MessagePayload, ServerEvent};
use parley_shared::types::{DeliveryState, MessageId, UserId};
use parley_store::{MessageStore, StoredMessage};

use crate::error::GatewayError;
use crate::gateway::Session;
use crate::state::AppState;

pub async fn send_private(
    state: &AppState,
    session: &Session,
    to: UserId,
    text: String,
) -> Result<(), GatewayError> {
    if text.is_empty() {
        return Err(GatewayError::BadRequest("Invalid message data".into()));
    }

    // Fail open: a limiter outage must not take messaging down with it.
    let allowed = state
        .limiter
        .allow_or(
            &session.user.to_string(),
            "send_message",
            PRIVATE_MESSAGE_LIMIT,
            Duration::from_secs(PRIVATE_MESSAGE_WINDOW_SECS),
            FailurePolicy::Open,
        )
        .await;
    if !allowed {
        return Err(GatewayError::RateLimited);
    }

    let message = StoredMessage::new(session.user, to, &text);
    state.messages.create_message(&message).await?;

    let payload = MessagePayload {
        id: message.id,
        from: message.from,
        to: message.to,
        text: message.text.clone(),
        timestamp: message.timestamp,
    };

    // Delivered iff the recipient's connection resolves AND this process
    // holds it; a mapping owned by another process counts as unreachable
    // for the direct push.
    let delivered = match state.presence.lookup(to).await {
        Some(conn) => state
            .rooms
            .send_to_conn(conn, ServerEvent::ReceiveMessage(payload)),
        None => false,
    };

    if delivered {
        let _ = state
            .messages
            .advance_delivery_state(message.id, DeliveryState::Delivered)
            .await?;
        session.push(ServerEvent::MessageDelivered {
            message_id: message.id,
        });
    } else {
        if let Err(e) = state.unread.increment(to, session.user).await {
            warn!(recipient = %to, error = %e, "Unread counter update failed");
        }
        session.push(ServerEvent::MessageSent {
            message_id: message.id,
            delivered: false,
        });
    }

    info!(
        from = %session.user,
        to = %to,
        message = %message.id,
        delivered,
        "Private message"
    );
    Ok(())
}

/// Handle a recipient's read acknowledgment. Unknown ids and repeated
/// acknowledgments are no-ops; the sender gets exactly one receipt.
pub async fn mark_read(
    state: &AppState,
    session: &Session,
    message_id: MessageId,
) -> Result<(), GatewayError> {
    let Some(transition) = state
        .messages
        .advance_delivery_state(message_id, DeliveryState::Read)
        .await?
    else {
        return Ok(());
    };

    if !transition.changed {
        return Ok(());
    }

    let message = transition.message;
    if let Some(conn) = state.presence.lookup(message.from).await {
        state.rooms.send_to_conn(
            conn,
            ServerEvent::MessageReadReceipt {
                message_id,
                read_by: session.user,
                read_at: message.read_at.unwrap_or_else(Utc::now),
            },
        );
    }

    Ok(())
}
