//! Redis-backed coordination store.
//!
//! Regular operations share one multiplexed connection; pub/sub requires a
//! dedicated connection per subscription, created on demand from the kept
//! client handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{CoordError, CoordResult};
use crate::store::{BusMessage, CoordStore, MessageBus};

/// Capacity of the channel feeding bus messages to a subscriber. A
/// subscriber that stalls this far behind loses the connection rather than
/// the whole process.
const SUBSCRIPTION_BUFFER: usize = 1024;

#[derive(Clone)]
pub struct RedisCoord {
    client: redis::Client,
    conn: Arc<Mutex<redis::aio::MultiplexedConnection>>,
}

impl RedisCoord {
    /// Connect and verify the server responds to PING.
    pub async fn connect(url: &str) -> CoordResult<Self> {
        let client = redis::Client::open(url).map_err(CoordError::from)?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(CoordError::from)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CoordError::from)?;

        info!(url = %url, "Connected to coordination store");

        Ok(Self {
            client,
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl CoordStore for RedisCoord {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CoordResult<()> {
        let mut conn = self.conn.lock().await;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CoordResult<Option<String>> {
        let mut conn = self.conn.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn del(&self, key: &str) -> CoordResult<()> {
        let mut conn = self.conn.lock().await;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CoordResult<bool> {
        let mut conn = self.conn.lock().await;
        let n: u64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(n == 1)
    }

    async fn incr(&self, key: &str) -> CoordResult<u64> {
        let mut conn = self.conn.lock().await;
        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CoordResult<()> {
        let mut conn = self.conn.lock().await;
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn hash_incr(&self, key: &str, field: &str, by: i64) -> CoordResult<i64> {
        let mut conn = self.conn.lock().await;
        let value: i64 = redis::cmd("HINCRBY")
            .arg(key)
            .arg(field)
            .arg(by)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> CoordResult<HashMap<String, String>> {
        let mut conn = self.conn.lock().await;
        let map: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(map)
    }

    async fn hash_del(&self, key: &str, field: &str) -> CoordResult<()> {
        let mut conn = self.conn.lock().await;
        redis::cmd("HDEL")
            .arg(key)
            .arg(field)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> CoordResult<()> {
        let mut conn = self.conn.lock().await;
        redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> CoordResult<()> {
        let mut conn = self.conn.lock().await;
        redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> CoordResult<Vec<String>> {
        let mut conn = self.conn.lock().await;
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(members)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CoordResult<Vec<String>> {
        let mut conn = self.conn.lock().await;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        let pattern = format!("{prefix}*");

        // SCAN instead of KEYS so a large keyspace never blocks the server.
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl MessageBus for RedisCoord {
    async fn publish(&self, channel: &str, payload: &str) -> CoordResult<()> {
        let mut conn = self.conn.lock().await;
        let receivers: u64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut *conn)
            .await?;
        debug!(channel = %channel, receivers, "Published to bus");
        Ok(())
    }

    async fn subscribe_pattern(&self, pattern: &str) -> CoordResult<mpsc::Receiver<BusMessage>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;

        info!(pattern = %pattern, "Subscribed to bus pattern");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let channel = msg.get_channel_name().to_string();
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Undecodable bus payload");
                        continue;
                    }
                };

                if tx.send(BusMessage { channel, payload }).await.is_err() {
                    // Subscriber dropped the receiver; tear down quietly.
                    break;
                }
            }
            error!("Bus subscription stream ended");
        });

        Ok(rx)
    }
}
