use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity = stable identifier assigned at account creation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct GroupId(pub Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Pub/sub channel (and room) name carrying this group's traffic.
    pub fn to_channel(&self) -> String {
        format!("group:{}", self.0)
    }

    /// Parse a `group:<uuid>` channel name back into an id.
    pub fn from_channel(channel: &str) -> Option<Self> {
        let id = channel.strip_prefix("group:")?;
        Uuid::parse_str(id).ok().map(Self)
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle for one live connection, valid only within the process
/// that created it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Per-message delivery state. Ordered: transitions only move forward and
/// re-applying a state is a no-op.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Sent,
    Delivered,
    Read,
}

impl DeliveryState {
    /// Advance to `next` if it is strictly later in the lifecycle.
    ///
    /// Returns `true` when the state actually changed, `false` when the
    /// transition was a backward or repeated one (both are no-ops).
    pub fn advance(&mut self, next: DeliveryState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Delivered => write!(f, "delivered"),
            Self::Read => write!(f, "read"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_channel_roundtrip() {
        let group = GroupId::new();
        let channel = group.to_channel();
        assert!(channel.starts_with("group:"));
        assert_eq!(GroupId::from_channel(&channel), Some(group));
    }

    #[test]
    fn test_from_channel_rejects_garbage() {
        assert_eq!(GroupId::from_channel("group:not-a-uuid"), None);
        assert_eq!(GroupId::from_channel("user:abc"), None);
    }

    #[test]
    fn test_delivery_state_advances_forward() {
        let mut state = DeliveryState::Sent;
        assert!(state.advance(DeliveryState::Delivered));
        assert_eq!(state, DeliveryState::Delivered);
        assert!(state.advance(DeliveryState::Read));
        assert_eq!(state, DeliveryState::Read);
    }

    #[test]
    fn test_delivery_state_never_regresses() {
        let mut state = DeliveryState::Read;
        assert!(!state.advance(DeliveryState::Delivered));
        assert!(!state.advance(DeliveryState::Sent));
        assert_eq!(state, DeliveryState::Read);
    }

    #[test]
    fn test_delivery_state_idempotent() {
        let mut state = DeliveryState::Sent;
        assert!(state.advance(DeliveryState::Delivered));
        assert!(!state.advance(DeliveryState::Delivered));
        assert_eq!(state, DeliveryState::Delivered);
    }

    #[test]
    fn test_skip_straight_to_read() {
        let mut state = DeliveryState::Sent;
        assert!(state.advance(DeliveryState::Read));
        assert_eq!(state, DeliveryState::Read);
    }
}
