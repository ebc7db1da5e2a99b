//! Group rooms and cross-process fan-out.
//!
//! Sending is two-phase: persist once, then publish the fully-formed
//! payload on the group's channel. Every process (the originator
//! included) runs [`run_fanout`], pattern-subscribed to all group
//! channels, and re-emits each payload only to the connections in its own
//! local room. The broadcast bus is the only cross-process coordination;
//! processes never address each other directly.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use parley_coord::{CoordError, CoordResult, CoordStore, FailurePolicy, MessageBus};
use parley_shared::constants::{
    GROUP_CHANNEL_PATTERN, GROUP_MESSAGE_LIMIT, GROUP_MESSAGE_WINDOW_SECS,
};
use parley_shared::events::{GroupMessagePayload, ServerEvent};
use parley_shared::types::{GroupId, MessageId, UserId};
use parley_store::{Group, GroupMessageStore, GroupStore, StoredGroupMessage};

use crate::error::GatewayError;
use crate::gateway::Session;
use crate::rooms::RoomRegistry;
use crate::state::AppState;

fn members_key(group: GroupId) -> String {
    format!("group:members:{group}")
}

/// Resolve the group and require the user to be a current member.
async fn require_membership(
    state: &AppState,
    group_id: GroupId,
    user: UserId,
) -> Result<Group, GatewayError> {
    match state.groups.find_group(group_id).await? {
        Some(group) if group.is_member(user) => Ok(group),
        _ => Err(GatewayError::NotAMember),
    }
}

/// Track a connected member in the group's cluster-wide room set. Pure
/// bookkeeping; failures degrade to a warning.
async fn track_room_member(state: &AppState, group_id: GroupId, user: UserId, joined: bool) {
    let result = if joined {
        state
            .coord
            .set_add(&members_key(group_id), &user.to_string())
            .await
    } else {
        state
            .coord
            .set_remove(&members_key(group_id), &user.to_string())
            .await
    };
    if let Err(e) = result {
        warn!(group = %group_id, user = %user, error = %e, "Group room bookkeeping failed");
    }
}

/// Join the rooms of every group the user belongs to.
pub async fn join_my_groups(state: &AppState, session: &Session) -> Result<usize, GatewayError> {
    let groups = state.groups.groups_for_member(session.user).await?;

    for group in &groups {
        state.rooms.join(&group.id.to_channel(), session.conn);
        track_room_member(state, group.id, session.user, true).await;
    }

    info!(user = %session.user, count = groups.len(), "Joined groups");
    Ok(groups.len())
}

/// Join one group's room. Membership is verified here, at join time; a
/// member removed mid-session keeps receiving fan-out until they leave
/// or reconnect.
pub async fn join_group(
    state: &AppState,
    session: &Session,
    group_id: GroupId,
) -> Result<(), GatewayError> {
    require_membership(state, group_id, session.user).await?;

    state.rooms.join(&group_id.to_channel(), session.conn);
    track_room_member(state, group_id, session.user, true).await;

    info!(user = %session.user, group = %group_id, "Joined group room");
    Ok(())
}

pub async fn send_group(
    state: &AppState,
    session: &Session,
    group_id: GroupId,
    text: String,
) -> Result<(), GatewayError> {
    if text.is_empty() {
        return Err(GatewayError::BadRequest("Invalid message data".into()));
    }

    let allowed = state
        .limiter
        .allow_or(
            &session.user.to_string(),
            "group_message",
            GROUP_MESSAGE_LIMIT,
            Duration::from_secs(GROUP_MESSAGE_WINDOW_SECS),
            FailurePolicy::Open,
        )
        .await;
    if !allowed {
        return Err(GatewayError::RateLimited);
    }

    require_membership(state, group_id, session.user).await?;

    // Exactly one persisted copy, then one publish; local delivery rides
    // the same self-subscription as every other process.
    let message = StoredGroupMessage::new(group_id, session.user, &text);
    state.group_messages.create_group_message(&message).await?;

    let payload = GroupMessagePayload {
        id: message.id,
        group_id,
        from: session.user,
        text: message.text.clone(),
        timestamp: message.timestamp,
    };
    let encoded = serde_json::to_string(&payload).map_err(CoordError::from)?;
    state.bus.publish(&group_id.to_channel(), &encoded).await?;

    info!(user = %session.user, group = %group_id, message = %message.id, "Group message published");
    Ok(())
}

/// Leave the group entirely: membership, room, and bookkeeping. The
/// remaining room members are notified.
pub async fn leave_group(
    state: &AppState,
    session: &Session,
    group_id: GroupId,
) -> Result<(), GatewayError> {
    state.groups.remove_member(group_id, session.user).await?;

    let room = group_id.to_channel();
    state.rooms.leave(&room, session.conn);
    track_room_member(state, group_id, session.user, false).await;

    state.rooms.send_to_room(
        &room,
        &ServerEvent::MemberLeft {
            group_id,
            user_id: session.user,
        },
    );

    info!(user = %session.user, group = %group_id, "Left group");
    Ok(())
}

/// Union the reader into the message's reader set. Idempotent; unknown
/// ids are no-ops.
pub async fn mark_group_read(
    state: &AppState,
    session: &Session,
    message_id: MessageId,
) -> Result<(), GatewayError> {
    state
        .group_messages
        .add_group_message_reader(message_id, session.user)
        .await?;
    Ok(())
}

/// The fan-out subscriber loop, one per process. Runs until the bus
/// subscription dies, which the caller treats as fatal.
pub async fn run_fanout(bus: Arc<dyn MessageBus>, rooms: RoomRegistry) -> CoordResult<()> {
    let mut rx = bus.subscribe_pattern(GROUP_CHANNEL_PATTERN).await?;

    while let Some(msg) = rx.recv().await {
        let payload: GroupMessagePayload = match serde_json::from_str(&msg.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(channel = %msg.channel, error = %e, "Undecodable fan-out payload");
                continue;
            }
        };

        let delivered = rooms.send_to_room(
            &msg.channel,
            &ServerEvent::GroupMessageReceived(payload),
        );
        debug!(channel = %msg.channel, delivered, "Fanned out group message");
    }

    Err(CoordError::SubscriptionClosed)
}
