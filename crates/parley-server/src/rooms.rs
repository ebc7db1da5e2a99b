//! Local room registry.
//!
//! Tracks every connection this process holds and the rooms it has
//! joined: the personal room (the user's own id) and one room per joined
//! group. All outbound traffic is an mpsc send to the connection's write
//! loop; nothing here touches the socket directly, and nothing here is
//! visible to other processes.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use parley_shared::events::ServerEvent;
use parley_shared::types::{ConnectionId, UserId};

/// Sender half of a connection's outbound channel. Cloning it is how any
/// component pushes events to that client.
pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Clone, Default)]
pub struct RoomRegistry {
    connections: Arc<DashMap<ConnectionId, OutboundSender>>,
    rooms: Arc<DashMap<String, HashMap<ConnectionId, OutboundSender>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection and its outbound channel.
    pub fn connect(&self, conn: ConnectionId, sender: OutboundSender) {
        self.connections.insert(conn, sender);
    }

    /// Drop a connection from the registry and from every room it joined.
    pub fn disconnect(&self, conn: ConnectionId) {
        self.connections.remove(&conn);
        self.rooms.retain(|_, members| {
            members.remove(&conn);
            !members.is_empty()
        });
        debug!(conn = %conn, "Connection dropped from registry");
    }

    pub fn join(&self, room: &str, conn: ConnectionId) {
        if let Some(sender) = self.connections.get(&conn) {
            self.rooms
                .entry(room.to_string())
                .or_default()
                .insert(conn, sender.clone());
            debug!(room = %room, conn = %conn, "Joined room");
        }
    }

    pub fn leave(&self, room: &str, conn: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&conn);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    /// The personal room a user's own connections sit in.
    pub fn personal_room(user: UserId) -> String {
        user.to_string()
    }

    /// Push an event to one locally-held connection. Returns `false` when
    /// this process does not hold it (it may live on another process).
    pub fn send_to_conn(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&conn) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Emit to every connection in a room. Returns the delivery count.
    pub fn send_to_room(&self, room: &str, event: &ServerEvent) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members
            .values()
            .filter(|sender| sender.send(event.clone()).is_ok())
            .count()
    }

    /// Emit to every connection in a room except one (the originator).
    pub fn send_to_room_except(
        &self,
        room: &str,
        except: ConnectionId,
        event: &ServerEvent,
    ) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter(|(conn, _)| **conn != except)
            .filter(|(_, sender)| sender.send(event.clone()).is_ok())
            .count()
    }

    /// Emit to every local connection except one.
    pub fn broadcast_except(&self, except: ConnectionId, event: &ServerEvent) -> usize {
        self.connections
            .iter()
            .filter(|entry| *entry.key() != except)
            .filter(|entry| entry.value().send(event.clone()).is_ok())
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn attach(registry: &RoomRegistry) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
        let conn = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.connect(conn, tx);
        (conn, rx)
    }

    #[test]
    fn test_room_send_reaches_members_only() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = attach(&registry);
        let (b, mut rx_b) = attach(&registry);
        let (_c, mut rx_c) = attach(&registry);

        registry.join("room", a);
        registry.join("room", b);

        let event = ServerEvent::error("test");
        assert_eq!(registry.send_to_room("room", &event), 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_send_except_skips_originator() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = attach(&registry);
        let (b, mut rx_b) = attach(&registry);

        registry.join("room", a);
        registry.join("room", b);

        assert_eq!(
            registry.send_to_room_except("room", a, &ServerEvent::error("x")),
            1
        );
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_disconnect_leaves_all_rooms() {
        let registry = RoomRegistry::new();
        let (a, _rx) = attach(&registry);
        registry.join("one", a);
        registry.join("two", a);

        registry.disconnect(a);
        assert_eq!(registry.send_to_room("one", &ServerEvent::error("x")), 0);
        assert_eq!(registry.send_to_room("two", &ServerEvent::error("x")), 0);
        assert!(!registry.send_to_conn(a, ServerEvent::error("x")));
    }

    #[test]
    fn test_send_to_unknown_conn_is_false() {
        let registry = RoomRegistry::new();
        assert!(!registry.send_to_conn(ConnectionId::new(), ServerEvent::error("x")));
    }

    #[test]
    fn test_broadcast_except() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = attach(&registry);
        let (_b, mut rx_b) = attach(&registry);
        let (_c, mut rx_c) = attach(&registry);

        assert_eq!(registry.broadcast_except(a, &ServerEvent::error("x")), 2);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
    }
}
