use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{GroupId, MessageId, UserId};

/// Events a client may send over its connection.
///
/// The wire format is `{"event": "<name>", "data": {...}}`; events without
/// a payload omit `data` entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Send a private message to another user.
    PrivateMessage { to: UserId, text: String },

    /// Acknowledge that a private message has been read.
    MessageRead { message_id: MessageId },

    /// Typing indicator directed at a peer.
    Typing { to: UserId, is_typing: bool },

    /// Join the rooms of every group the user is a member of.
    JoinMyGroups,

    /// Join one group's room (membership is verified).
    JoinGroup { group_id: GroupId },

    /// Send a message to a group.
    GroupMessage { group_id: GroupId, text: String },

    /// Leave a group (drops membership, not just the room).
    LeaveGroup { group_id: GroupId },

    /// Record that the user has read a group message.
    GroupMessageRead { message_id: MessageId },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Handshake confirmation, sent once after authentication.
    Connected { user_id: UserId },

    UserOnline { user_id: UserId },

    UserOffline { user_id: UserId },

    /// A private message pushed to its recipient.
    ReceiveMessage(MessagePayload),

    /// Sender ack: the recipient was online and the message was delivered.
    MessageDelivered { message_id: MessageId },

    /// Sender ack: the recipient was offline, the message stays `sent`.
    MessageSent {
        message_id: MessageId,
        delivered: bool,
    },

    /// Read receipt pushed to the original sender.
    MessageReadReceipt {
        message_id: MessageId,
        read_by: UserId,
        read_at: DateTime<Utc>,
    },

    TypingStatus { user_id: UserId, is_typing: bool },

    /// A group message fanned out to a group room.
    GroupMessageReceived(GroupMessagePayload),

    MemberLeft { group_id: GroupId, user_id: UserId },

    /// Connection-scoped error report. The connection stays open.
    Error { message: String },
}

/// A private message as seen on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    pub id: MessageId,
    pub from: UserId,
    pub to: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A group message as published on the fan-out bus and pushed to rooms.
///
/// The originating process publishes the fully-formed payload; receiving
/// processes re-emit it verbatim to their local room members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupMessagePayload {
    pub id: MessageId,
    pub group_id: GroupId,
    pub from: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ClientEvent {
    /// Validate one inbound frame at the connection boundary.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::MalformedEvent(e.to_string()))
    }
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_tagged_encoding() {
        let event = ClientEvent::PrivateMessage {
            to: UserId::new(),
            text: "hi".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "private_message");
        assert_eq!(json["data"]["text"], "hi");

        let restored: ClientEvent = serde_json::from_value(json).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn test_payloadless_event() {
        let json = serde_json::to_string(&ClientEvent::JoinMyGroups).unwrap();
        let restored: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ClientEvent::JoinMyGroups);
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let raw = r#"{"event": "self_destruct", "data": {}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn test_missing_field_is_rejected() {
        // `text` absent: must fail validation at the boundary, not deep
        // inside a handler.
        let raw = r#"{"event": "private_message", "data": {"to": "0193e798-0000-7000-8000-000000000000"}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn test_server_event_names_match_contract() {
        let event = ServerEvent::MessageSent {
            message_id: MessageId::new(),
            delivered: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message_sent");
        assert_eq!(json["data"]["delivered"], false);

        let receipt = ServerEvent::MessageReadReceipt {
            message_id: MessageId::new(),
            read_by: UserId::new(),
            read_at: Utc::now(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["event"], "message_read_receipt");
    }

    #[test]
    fn test_group_payload_roundtrip() {
        let payload = GroupMessagePayload {
            id: MessageId::new(),
            group_id: GroupId::new(),
            from: UserId::new(),
            text: "meeting at noon".into(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        let restored: GroupMessagePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, payload.id);
        assert_eq!(restored.text, payload.text);
    }
}
