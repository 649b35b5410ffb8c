use crate::domain::order::OrderRecord;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Linearizable single-key integer counter.
///
/// Every method is one indivisible operation on one key. The reservation
/// protocol is built from `incr`/`decr` alone, so any store offering these
/// four primitives can back it.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<i64>>;
    async fn set(&self, key: &str, value: i64) -> Result<()>;
    /// Returns the value after incrementing. An absent key counts as 0.
    async fn incr(&self, key: &str) -> Result<i64>;
    /// Returns the value after decrementing. An absent key counts as 0.
    async fn decr(&self, key: &str) -> Result<i64>;
}

pub type CounterStoreRef = Arc<dyn CounterStore>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifyReceipt {
    pub channel: String,
    pub message_id: Option<i64>,
}

/// Outbound order notification. Single attempt; retries belong to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, order: &OrderRecord) -> Result<NotifyReceipt>;
}

pub type NotifierRef = Arc<dyn Notifier>;

pub trait ConfigProvider: Send + Sync {
    fn key_prefix(&self) -> &str;
    fn notify_timeout(&self) -> Duration;
    fn delivery_fee(&self) -> f64;
    fn webhook_secret(&self) -> Option<&str>;
}
