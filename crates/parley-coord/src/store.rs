//! Interfaces over the shared coordination store.
//!
//! Every component takes these traits as an injected dependency so the
//! whole server runs against either Redis or the in-memory fake. Each
//! operation is an independently atomic round-trip; no method holds state
//! across calls.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CoordResult;

/// TTL-capable key-value operations, mirroring the small slice of Redis
/// the server actually uses: strings with expiry, counters, hashes, sets.
#[async_trait]
pub trait CoordStore: Send + Sync {
    /// Set a string value with an expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CoordResult<()>;

    async fn get(&self, key: &str) -> CoordResult<Option<String>>;

    async fn del(&self, key: &str) -> CoordResult<()>;

    /// Pure existence check; does not touch the value or its TTL.
    async fn exists(&self, key: &str) -> CoordResult<bool>;

    /// Atomic increment-and-read. Missing keys start at zero, so the first
    /// call returns 1. An existing TTL is preserved.
    async fn incr(&self, key: &str) -> CoordResult<u64>;

    /// Set the expiry of an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> CoordResult<()>;

    async fn hash_incr(&self, key: &str, field: &str, by: i64) -> CoordResult<i64>;

    async fn hash_get_all(&self, key: &str) -> CoordResult<HashMap<String, String>>;

    async fn hash_del(&self, key: &str, field: &str) -> CoordResult<()>;

    async fn set_add(&self, key: &str, member: &str) -> CoordResult<()>;

    async fn set_remove(&self, key: &str, member: &str) -> CoordResult<()>;

    async fn set_members(&self, key: &str) -> CoordResult<Vec<String>>;

    /// All live keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> CoordResult<Vec<String>>;
}

/// One message received from the broadcast bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Channel the message was published on (e.g. `group:<uuid>`).
    pub channel: String,
    /// The payload exactly as published.
    pub payload: String,
}

/// Cluster-wide publish/subscribe. The only cross-process coordination
/// mechanism: processes never discover each other directly.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> CoordResult<()>;

    /// Subscribe to every channel matching `pattern` (glob, e.g.
    /// `group:*`). Messages arrive on the returned receiver until the
    /// subscriber is dropped.
    async fn subscribe_pattern(&self, pattern: &str) -> CoordResult<mpsc::Receiver<BusMessage>>;
}
