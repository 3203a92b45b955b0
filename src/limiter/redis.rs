//! Redis counter store shared between processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use tracing::info;

use super::CounterStore;
use crate::error::StoreError;

/// Increment and window expiry as one atomic unit.
///
/// The expiry is attached whenever the key has none: on the increment that
/// creates the counter, and as repair for a counter left without a TTL.
/// An existing window is never extended.
const INCREMENT_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
";

/// Distributed counter store backed by Redis.
///
/// The increment runs as a single server-side script, so concurrent callers
/// observe distinct counts and the limit cannot be under-enforced, and no
/// counter can outlive its window: a key that somehow lost its TTL gets one
/// re-attached on the next increment instead of rejecting forever.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    increment: Script,
}

impl RedisCounterStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis for rate-limit counters");

        Ok(Self {
            conn,
            increment: Script::new(INCREMENT_SCRIPT),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, period: Duration) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: u64 = self
            .increment
            .key(key)
            .arg(period.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
