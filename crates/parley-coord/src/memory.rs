//! In-memory coordination store for tests and single-process development.
//!
//! Behaves like the Redis implementation for the operations the server
//! uses, including TTL expiry and pattern pub/sub. Also supports
//! simulating an unreachable store so degraded-mode behavior is testable.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::error::{CoordError, CoordResult};
use crate::store::{BusMessage, CoordStore, MessageBus};

const BUS_CAPACITY: usize = 1024;

#[derive(Default)]
struct State {
    strings: HashMap<String, StringEntry>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
}

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Clone)]
pub struct MemoryCoord {
    state: Arc<Mutex<State>>,
    bus: broadcast::Sender<BusMessage>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryCoord {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            bus,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulate the store being unreachable: every subsequent operation
    /// fails with `CoordError::Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> CoordResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CoordError::Unavailable("store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryCoord {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordStore for MemoryCoord {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CoordResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> CoordResult<Option<String>> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        match state.strings.get(key) {
            Some(entry) if entry.expired() => {
                state.strings.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> CoordResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.strings.remove(key);
        state.hashes.remove(key);
        state.sets.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CoordResult<bool> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        match state.strings.get(key) {
            Some(entry) if entry.expired() => {
                state.strings.remove(key);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(state.hashes.contains_key(key) || state.sets.contains_key(key)),
        }
    }

    async fn incr(&self, key: &str) -> CoordResult<u64> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        if state.strings.get(key).is_some_and(|e| e.expired()) {
            state.strings.remove(key);
        }

        let entry = state.strings.entry(key.to_string()).or_insert(StringEntry {
            value: "0".to_string(),
            expires_at: None,
        });
        let count = entry.value.parse::<u64>().unwrap_or(0) + 1;
        entry.value = count.to_string();
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CoordResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if let Some(entry) = state.strings.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn hash_incr(&self, key: &str, field: &str, by: i64) -> CoordResult<i64> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let hash = state.hashes.entry(key.to_string()).or_default();
        let value = hash
            .get(field)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            + by;
        hash.insert(field.to_string(), value.to_string());
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> CoordResult<HashMap<String, String>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_del(&self, key: &str, field: &str) -> CoordResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if let Some(hash) = state.hashes.get_mut(key) {
            hash.remove(field);
            if hash.is_empty() {
                state.hashes.remove(key);
            }
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> CoordResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> CoordResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if let Some(set) = state.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                state.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> CoordResult<Vec<String>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CoordResult<Vec<String>> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.strings.retain(|_, entry| !entry.expired());
        Ok(state
            .strings
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageBus for MemoryCoord {
    async fn publish(&self, channel: &str, payload: &str) -> CoordResult<()> {
        self.check_available()?;
        // send() errs when nobody subscribed yet; that matches Redis,
        // where PUBLISH with zero receivers is still a success.
        let _ = self.bus.send(BusMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn subscribe_pattern(&self, pattern: &str) -> CoordResult<mpsc::Receiver<BusMessage>> {
        self.check_available()?;
        let mut sub = self.bus.subscribe();
        let (tx, rx) = mpsc::channel(BUS_CAPACITY);
        let pattern = pattern.to_string();

        tokio::spawn(async move {
            loop {
                match sub.recv().await {
                    Ok(msg) => {
                        if !pattern_matches(&pattern, &msg.channel) {
                            continue;
                        }
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "In-memory bus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}

/// Glob matching restricted to the single trailing-`*` form the server
/// subscribes with (`group:*`).
fn pattern_matches(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => pattern == channel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_ex_expires() {
        let store = MemoryCoord::new();
        store
            .set_ex("k", "v", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_starts_at_one_and_counts() {
        let store = MemoryCoord::new();
        assert_eq!(store.incr("counter").await.unwrap(), 1);
        assert_eq!(store.incr("counter").await.unwrap(), 2);
        assert_eq!(store.incr("counter").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_incr_resets_after_expiry() {
        let store = MemoryCoord::new();
        assert_eq!(store.incr("c").await.unwrap(), 1);
        store.expire("c", Duration::from_millis(20)).await.unwrap();
        assert_eq!(store.incr("c").await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.incr("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hash_counters() {
        let store = MemoryCoord::new();
        assert_eq!(store.hash_incr("h", "a", 1).await.unwrap(), 1);
        assert_eq!(store.hash_incr("h", "a", 1).await.unwrap(), 2);
        assert_eq!(store.hash_incr("h", "b", 5).await.unwrap(), 5);

        let all = store.hash_get_all("h").await.unwrap();
        assert_eq!(all.get("a"), Some(&"2".to_string()));
        assert_eq!(all.get("b"), Some(&"5".to_string()));

        store.hash_del("h", "a").await.unwrap();
        let all = store.hash_get_all("h").await.unwrap();
        assert!(!all.contains_key("a"));
    }

    #[tokio::test]
    async fn test_sets() {
        let store = MemoryCoord::new();
        store.set_add("s", "x").await.unwrap();
        store.set_add("s", "x").await.unwrap();
        store.set_add("s", "y").await.unwrap();

        let mut members = store.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["x".to_string(), "y".to_string()]);

        store.set_remove("s", "x").await.unwrap();
        assert_eq!(store.set_members("s").await.unwrap(), vec!["y".to_string()]);
    }

    #[tokio::test]
    async fn test_pattern_subscription_filters() {
        let store = MemoryCoord::new();
        let mut rx = store.subscribe_pattern("group:*").await.unwrap();

        store.publish("group:abc", "one").await.unwrap();
        store.publish("user:xyz", "two").await.unwrap();
        store.publish("group:def", "three").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.channel, "group:abc");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.channel, "group:def");
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_operations() {
        let store = MemoryCoord::new();
        store.set_unavailable(true);
        assert!(store.get("k").await.is_err());
        assert!(store.incr("k").await.is_err());

        store.set_unavailable(false);
        assert!(store.get("k").await.is_ok());
    }
}
