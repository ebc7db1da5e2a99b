//! Per-recipient unread counters, keyed by sender.
//!
//! Incremented when a private message cannot be delivered live; read and
//! cleared when the recipient opens the conversation history.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use parley_shared::types::UserId;

use crate::error::CoordResult;
use crate::store::CoordStore;

fn unread_key(user: UserId) -> String {
    format!("unread:{user}")
}

#[derive(Clone)]
pub struct UnreadCounters {
    store: Arc<dyn CoordStore>,
}

impl UnreadCounters {
    pub fn new(store: Arc<dyn CoordStore>) -> Self {
        Self { store }
    }

    pub async fn increment(&self, user: UserId, from: UserId) -> CoordResult<()> {
        self.store
            .hash_incr(&unread_key(user), &from.to_string(), 1)
            .await?;
        Ok(())
    }

    /// Unread counts for `user`, one entry per sender with pending
    /// messages.
    pub async fn counts(&self, user: UserId) -> CoordResult<HashMap<UserId, i64>> {
        let raw = self.store.hash_get_all(&unread_key(user)).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(sender, count)| {
                let sender = UserId::from_str(&sender).ok()?;
                let count = count.parse::<i64>().ok()?;
                Some((sender, count))
            })
            .collect())
    }

    /// Clear the counter for one conversation.
    pub async fn clear(&self, user: UserId, from: UserId) -> CoordResult<()> {
        self.store
            .hash_del(&unread_key(user), &from.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCoord;

    #[tokio::test]
    async fn test_increment_and_read_counts() {
        let counters = UnreadCounters::new(Arc::new(MemoryCoord::new()));
        let recipient = UserId::new();
        let alice = UserId::new();
        let bob = UserId::new();

        counters.increment(recipient, alice).await.unwrap();
        counters.increment(recipient, alice).await.unwrap();
        counters.increment(recipient, bob).await.unwrap();

        let counts = counters.counts(recipient).await.unwrap();
        assert_eq!(counts.get(&alice), Some(&2));
        assert_eq!(counts.get(&bob), Some(&1));
    }

    #[tokio::test]
    async fn test_clear_single_conversation() {
        let counters = UnreadCounters::new(Arc::new(MemoryCoord::new()));
        let recipient = UserId::new();
        let alice = UserId::new();
        let bob = UserId::new();

        counters.increment(recipient, alice).await.unwrap();
        counters.increment(recipient, bob).await.unwrap();

        counters.clear(recipient, alice).await.unwrap();
        let counts = counters.counts(recipient).await.unwrap();
        assert!(!counts.contains_key(&alice));
        assert_eq!(counts.get(&bob), Some(&1));
    }

    #[tokio::test]
    async fn test_empty_counts() {
        let counters = UnreadCounters::new(Arc::new(MemoryCoord::new()));
        assert!(counters.counts(UserId::new()).await.unwrap().is_empty());
    }
}
