use crate::domain::ports::CounterStore;
use crate::utils::error::{CheckoutError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Counter store backed by the Upstash Redis REST API.
///
/// Each call is a single Redis command (`GET`, `SET`, `INCR`, `DECR`) sent as a
/// JSON array to the database endpoint, so every primitive keeps Redis'
/// single-key atomicity across processes.
#[derive(Debug, Clone)]
pub struct UpstashCounterStore {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    result: Option<Value>,
    error: Option<String>,
}

impl UpstashCounterStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_timeout(base_url, token, Duration::from_secs(5))
    }

    pub fn with_timeout(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn command(&self, args: Value) -> Result<Value> {
        tracing::debug!("Upstash command: {}", args);
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await
            .map_err(|e| CheckoutError::store(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CheckoutError::ConfigError {
                message: "Upstash rejected the REST token".to_string(),
            });
        }

        let body: CommandResponse = response
            .json()
            .await
            .map_err(|e| CheckoutError::store(format!("unreadable response ({}): {}", status, e)))?;

        if let Some(error) = body.error {
            return Err(CheckoutError::store(error));
        }
        if !status.is_success() {
            return Err(CheckoutError::store(format!("unexpected status {}", status)));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

/// Upstash returns `GET` results as strings and `INCR`/`DECR` results as numbers.
fn parse_integer(key: &str, value: &Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| CheckoutError::store(format!("{} holds a non-integer: {}", key, n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| CheckoutError::store(format!("{} holds a non-integer: {}", key, s))),
        other => Err(CheckoutError::store(format!(
            "{} holds an unexpected value: {}",
            key, other
        ))),
    }
}

fn require_integer(key: &str, value: &Value) -> Result<i64> {
    parse_integer(key, value)?
        .ok_or_else(|| CheckoutError::store(format!("{} returned no value", key)))
}

#[async_trait]
impl CounterStore for UpstashCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let value = self.command(json!(["GET", key])).await?;
        parse_integer(key, &value)
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        self.command(json!(["SET", key, value.to_string()])).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let value = self.command(json!(["INCR", key])).await?;
        require_integer(key, &value)
    }

    async fn decr(&self, key: &str) -> Result<i64> {
        let value = self.command(json!(["DECR", key])).await?;
        require_integer(key, &value)
    }
}
