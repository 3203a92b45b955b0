//! Redis cache store shared between processes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::CacheStore;
use crate::error::StoreError;

/// Wire form of one cache entry.
///
/// The expiry is an absolute unix-millisecond timestamp so independent
/// processes agree on freshness despite clock drift between them and the
/// store; the Redis key TTL is only physical eviction.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at_ms: i64,
}

/// Distributed cache store backed by Redis.
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis for response caching");

        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let text: Option<String> = conn.get(key).await?;

        let Some(text) = text else {
            return Ok(None);
        };
        let entry: StoredEntry = serde_json::from_str(&text)
            .map_err(|e| StoreError::Backend(format!("corrupt cache entry under {key}: {e}")))?;

        // Past the absolute expiry the entry is absent even if Redis has
        // not physically evicted it yet.
        if entry.expires_at_ms <= Utc::now().timestamp_millis() {
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let entry = StoredEntry {
            value: value.to_string(),
            expires_at_ms: Utc::now().timestamp_millis() + ttl.as_millis() as i64,
        };
        let text = serde_json::to_string(&entry)
            .map_err(|e| StoreError::Backend(format!("failed to encode cache entry: {e}")))?;

        let mut conn = self.conn.clone();
        let _: () = conn.pset_ex(key, text, ttl.as_millis() as u64).await?;

        debug!(key = %key, "Stored cache entry in Redis");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
