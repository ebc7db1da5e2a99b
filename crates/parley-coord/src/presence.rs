//! Presence & socket directory.
//!
//! Maps each user to their current connection and keeps a short-lived
//! online marker refreshed by the session heartbeat. The connection
//! mapping carries a long safety TTL so a crashed process cannot leave a
//! mapping behind forever; the online marker expires on its own within
//! one safety margin of the last heartbeat.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use parley_shared::constants::{ONLINE_TTL_SECS, SOCKET_TTL_SECS};
use parley_shared::types::{ConnectionId, UserId};

use crate::error::CoordResult;
use crate::store::CoordStore;

fn socket_key(user: UserId) -> String {
    format!("socket:{user}")
}

fn online_key(user: UserId) -> String {
    format!("user:online:{user}")
}

const ONLINE_PREFIX: &str = "user:online:";

#[derive(Clone)]
pub struct PresenceDirectory {
    store: Arc<dyn CoordStore>,
    online_ttl: Duration,
    socket_ttl: Duration,
}

impl PresenceDirectory {
    pub fn new(store: Arc<dyn CoordStore>) -> Self {
        Self {
            store,
            online_ttl: Duration::from_secs(ONLINE_TTL_SECS),
            socket_ttl: Duration::from_secs(SOCKET_TTL_SECS),
        }
    }

    /// Override the marker TTL (tests shrink it to milliseconds).
    pub fn with_online_ttl(mut self, ttl: Duration) -> Self {
        self.online_ttl = ttl;
        self
    }

    /// Record `conn` as the user's reachable connection, overwriting any
    /// prior mapping (last-writer-wins: one connection per identity).
    pub async fn register(&self, user: UserId, conn: ConnectionId) -> CoordResult<()> {
        self.store
            .set_ex(&socket_key(user), &conn.to_string(), self.socket_ttl)
            .await?;
        debug!(user = %user, conn = %conn, "Registered connection");
        Ok(())
    }

    /// Resolve the user's connection, if any. A store failure degrades to
    /// "not reachable" rather than propagating.
    pub async fn lookup(&self, user: UserId) -> Option<ConnectionId> {
        match self.store.get(&socket_key(user)).await {
            Ok(value) => value.and_then(|v| ConnectionId::from_str(&v).ok()),
            Err(e) => {
                warn!(user = %user, error = %e, "Presence lookup failed, treating as offline");
                None
            }
        }
    }

    pub async fn remove(&self, user: UserId) -> CoordResult<()> {
        self.store.del(&socket_key(user)).await?;
        debug!(user = %user, "Removed connection mapping");
        Ok(())
    }

    /// Refresh the online marker. Called on connect and then every
    /// heartbeat; the TTL exceeds the heartbeat interval so one missed
    /// beat does not flap the user offline.
    pub async fn mark_online(&self, user: UserId) -> CoordResult<()> {
        self.store
            .set_ex(
                &online_key(user),
                &chrono::Utc::now().timestamp_millis().to_string(),
                self.online_ttl,
            )
            .await
    }

    /// Existence check on the online marker only, independent of the
    /// connection mapping: another process may hold the connection.
    pub async fn is_online(&self, user: UserId) -> bool {
        match self.store.exists(&online_key(user)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(user = %user, error = %e, "Online check failed, treating as offline");
                false
            }
        }
    }

    /// Every user with a live online marker, cluster-wide.
    pub async fn online_users(&self) -> Vec<UserId> {
        match self.store.keys_with_prefix(ONLINE_PREFIX).await {
            Ok(keys) => keys
                .iter()
                .filter_map(|k| k.strip_prefix(ONLINE_PREFIX))
                .filter_map(|id| UserId::from_str(id).ok())
                .collect(),
            Err(e) => {
                warn!(error = %e, "Online-user scan failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCoord;

    fn directory() -> (PresenceDirectory, MemoryCoord) {
        let store = MemoryCoord::new();
        let dir = PresenceDirectory::new(Arc::new(store.clone()));
        (dir, store)
    }

    #[tokio::test]
    async fn test_register_lookup_remove() {
        let (dir, _) = directory();
        let user = UserId::new();
        let conn = ConnectionId::new();

        assert_eq!(dir.lookup(user).await, None);

        dir.register(user, conn).await.unwrap();
        assert_eq!(dir.lookup(user).await, Some(conn));

        dir.remove(user).await.unwrap();
        assert_eq!(dir.lookup(user).await, None);
    }

    #[tokio::test]
    async fn test_register_overwrites_prior_mapping() {
        let (dir, _) = directory();
        let user = UserId::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        dir.register(user, first).await.unwrap();
        dir.register(user, second).await.unwrap();
        assert_eq!(dir.lookup(user).await, Some(second));
    }

    #[tokio::test]
    async fn test_online_marker_expires_without_heartbeat() {
        let (dir, _) = directory();
        let dir = dir.with_online_ttl(Duration::from_millis(30));
        let user = UserId::new();

        dir.mark_online(user).await.unwrap();
        assert!(dir.is_online(user).await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!dir.is_online(user).await);
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_marker_alive() {
        let (dir, _) = directory();
        let dir = dir.with_online_ttl(Duration::from_millis(60));
        let user = UserId::new();

        for _ in 0..4 {
            dir.mark_online(user).await.unwrap();
            tokio::time::sleep(Duration::from_millis(25)).await;
            assert!(dir.is_online(user).await);
        }
    }

    #[tokio::test]
    async fn test_is_online_independent_of_mapping() {
        let (dir, _) = directory();
        let user = UserId::new();

        // Marker set by some other process's heartbeat; no local mapping.
        dir.mark_online(user).await.unwrap();
        assert!(dir.is_online(user).await);
        assert_eq!(dir.lookup(user).await, None);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_offline() {
        let (dir, store) = directory();
        let user = UserId::new();
        dir.register(user, ConnectionId::new()).await.unwrap();
        dir.mark_online(user).await.unwrap();

        store.set_unavailable(true);
        assert_eq!(dir.lookup(user).await, None);
        assert!(!dir.is_online(user).await);
        assert!(dir.online_users().await.is_empty());

        store.set_unavailable(false);
        assert!(dir.is_online(user).await);
    }

    #[tokio::test]
    async fn test_online_users_scan() {
        let (dir, _) = directory();
        let a = UserId::new();
        let b = UserId::new();

        dir.mark_online(a).await.unwrap();
        dir.mark_online(b).await.unwrap();

        let online = dir.online_users().await;
        assert_eq!(online.len(), 2);
        assert!(online.contains(&a));
        assert!(online.contains(&b));
    }
}
