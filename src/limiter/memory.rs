//! In-memory counter store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::CounterStore;
use crate::error::StoreError;

struct Counter {
    count: u64,
    expires_at: Instant,
}

/// Process-local counter store with the same fixed-window contract as the
/// distributed variant: the increment that creates a counter owns its
/// expiry, later increments leave it unchanged.
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, period: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        match counters.get_mut(key) {
            Some(counter) if counter.expires_at > now => {
                counter.count += 1;
                Ok(counter.count)
            }
            _ => {
                counters.insert(
                    key.to_string(),
                    Counter {
                        count: 1,
                        expires_at: now + period,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.counters.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_within_window() {
        let store = InMemoryCounterStore::new();
        assert_eq!(
            store.increment("Limiter:SendCode:+100", Duration::from_secs(60)).await.unwrap(),
            1
        );
        assert_eq!(
            store.increment("Limiter:SendCode:+100", Duration::from_secs(60)).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn window_restarts_after_expiry() {
        let store = InMemoryCounterStore::new();
        store
            .increment("Limiter:SendCode:+100", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(
            store
                .increment("Limiter:SendCode:+100", Duration::from_millis(50))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn increments_leave_expiry_unchanged() {
        let store = InMemoryCounterStore::new();
        let key = "Limiter:SendCode:+100";

        store.increment(key, Duration::from_millis(100)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        // A second increment inside the window must not extend it.
        store.increment(key, Duration::from_millis(100)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        // 120ms after creation the original window has elapsed.
        assert_eq!(
            store.increment(key, Duration::from_millis(100)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn clear_drops_counter() {
        let store = InMemoryCounterStore::new();
        store
            .increment("Limiter:SendCode:+100", Duration::from_secs(60))
            .await
            .unwrap();
        store.clear("Limiter:SendCode:+100").await.unwrap();
        assert_eq!(
            store
                .increment("Limiter:SendCode:+100", Duration::from_secs(60))
                .await
                .unwrap(),
            1
        );
    }
}
