use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_shared::types::{DeliveryState, GroupId, MessageId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// E.164 phone number, the account's login identity.
    pub mobile_number: String,
    pub name: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl User {
    /// New account with the default display name `User <last 4 digits>`.
    pub fn with_mobile(mobile_number: &str) -> Self {
        let suffix = &mobile_number[mobile_number.len().saturating_sub(4)..];
        let now = Utc::now();
        Self {
            id: UserId::new(),
            mobile_number: mobile_number.to_string(),
            name: format!("User {suffix}"),
            avatar: None,
            created_at: now,
            last_seen: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub created_by: UserId,
    pub members: Vec<UserId>,
    pub admins: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// The creator is always both a member and an admin.
    pub fn new(name: &str, description: &str, created_by: UserId) -> Self {
        Self {
            id: GroupId::new(),
            name: name.to_string(),
            description: description.to_string(),
            created_by,
            members: vec![created_by],
            admins: vec![created_by],
            created_at: Utc::now(),
        }
    }

    pub fn with_members(mut self, members: &[UserId]) -> Self {
        for member in members {
            if !self.members.contains(member) {
                self.members.push(*member);
            }
        }
        self
    }

    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }
}

/// One private message as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub from: UserId,
    pub to: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub state: DeliveryState,
    pub read_at: Option<DateTime<Utc>>,
}

impl StoredMessage {
    /// A freshly sent message; delivery state always starts at `sent`.
    pub fn new(from: UserId, to: UserId, text: &str) -> Self {
        Self {
            id: MessageId::new(),
            from,
            to,
            text: text.to_string(),
            timestamp: Utc::now(),
            state: DeliveryState::Sent,
            read_at: None,
        }
    }
}

/// One group message as persisted. Readers accumulate monotonically; the
/// sender has trivially read their own message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredGroupMessage {
    pub id: MessageId,
    pub group_id: GroupId,
    pub from: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub read_by: HashSet<UserId>,
}

impl StoredGroupMessage {
    pub fn new(group_id: GroupId, from: UserId, text: &str) -> Self {
        Self {
            id: MessageId::new(),
            group_id,
            from,
            text: text.to_string(),
            timestamp: Utc::now(),
            read_by: HashSet::from([from]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creator_is_member_and_admin() {
        let creator = UserId::new();
        let group = Group::new("team", "", creator);
        assert!(group.is_member(creator));
        assert!(group.admins.contains(&creator));
    }

    #[test]
    fn test_with_members_deduplicates() {
        let creator = UserId::new();
        let other = UserId::new();
        let group = Group::new("team", "", creator).with_members(&[creator, other, other]);
        assert_eq!(group.members.len(), 2);
    }

    #[test]
    fn test_default_name_uses_last_digits() {
        let user = User::with_mobile("+15551234567");
        assert_eq!(user.name, "User 4567");
    }

    #[test]
    fn test_new_message_starts_sent() {
        let msg = StoredMessage::new(UserId::new(), UserId::new(), "hi");
        assert_eq!(msg.state, DeliveryState::Sent);
        assert!(msg.read_at.is_none());
    }

    #[test]
    fn test_group_message_sender_has_read() {
        let sender = UserId::new();
        let msg = StoredGroupMessage::new(GroupId::new(), sender, "hi");
        assert!(msg.read_by.contains(&sender));
    }
}
