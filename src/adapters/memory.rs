use crate::domain::ports::CounterStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A thread-safe in-memory counter store.
///
/// Each operation takes the map lock once, which makes it atomic for a single
/// key. Ideal for tests and local runs; counters vanish with the process.
#[derive(Default, Clone)]
pub struct InMemoryCounterStore {
    counters: Arc<Mutex<HashMap<String, i64>>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let counters = self.counters.lock().await;
        Ok(counters.get(key).copied())
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        let mut counters = self.counters.lock().await;
        counters.insert(key.to_string(), value);
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn decr(&self, key: &str) -> Result<i64> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value -= 1;
        Ok(*value)
    }
}
