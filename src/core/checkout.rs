use crate::core::catalog::Catalog;
use crate::core::dispatch::{OrderConfirmation, OrderDispatcher};
use crate::core::reservation::ReservationEngine;
use crate::core::seed::SeedReport;
use crate::domain::model::PromoKind;
use crate::domain::order::OrderRequest;
use crate::domain::ports::{ConfigProvider, CounterStoreRef, NotifierRef};
use crate::utils::error::{CheckoutError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Client-tier request, tagged by `action`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApiRequest {
    Checkout { order: OrderRequest },
    ApplyPromo { code: Option<String> },
    Balance { code: String },
    Seed,
}

/// Serverless event shape: request headers plus a JSON body, which may arrive
/// either as an object or as a JSON-encoded string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn from_error(error: &CheckoutError) -> Self {
        let reason = error.reason();
        Self {
            status: reason.status_code(),
            body: json!({
                "ok": false,
                "reason": reason,
                "error": error.user_friendly_message(),
            }),
        }
    }
}

/// Read-only answer to "may I use this code?". Stale as soon as it is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromoQuote {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: PromoKind,
    pub value: f64,
    pub left: i64,
}

pub struct CheckoutService {
    dispatcher: OrderDispatcher,
    webhook_secret: Option<String>,
}

impl CheckoutService {
    pub fn new<C: ConfigProvider + ?Sized>(dispatcher: OrderDispatcher, config: &C) -> Self {
        Self {
            dispatcher,
            webhook_secret: config
                .webhook_secret()
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// Wires catalog, store and notifier into the three-stage pipeline.
    pub fn assemble<C: ConfigProvider + ?Sized>(
        config: &C,
        catalog: Catalog,
        store: CounterStoreRef,
        notifier: NotifierRef,
    ) -> Self {
        let engine = ReservationEngine::new(store, Arc::new(catalog), config.key_prefix());
        let dispatcher = OrderDispatcher::new(engine, notifier, config);
        Self::new(dispatcher, config)
    }

    pub fn dispatcher(&self) -> &OrderDispatcher {
        &self.dispatcher
    }

    pub async fn checkout(&self, order: OrderRequest) -> Result<OrderConfirmation> {
        self.dispatcher.dispatch(order).await
    }

    pub async fn apply_promo(&self, code: Option<&str>) -> Result<PromoQuote> {
        let code = match code.filter(|c| !c.trim().is_empty()) {
            Some(code) => code,
            None => return Err(CheckoutError::validation("code", "Promo code required")),
        };
        let engine = self.dispatcher.reservations();
        let def = engine.catalog().resolve(code)?;
        let left = engine.check_balance(code).await?;
        if left <= 0 {
            return Err(CheckoutError::PromoExhausted {
                code: code.to_string(),
            });
        }
        Ok(PromoQuote {
            code: def.code.clone(),
            kind: def.kind,
            value: def.value,
            left,
        })
    }

    pub async fn balance(&self, code: &str) -> Result<i64> {
        self.dispatcher.reservations().check_balance(code).await
    }

    pub async fn seed(&self) -> Result<SeedReport> {
        self.dispatcher.reservations().seed().await
    }

    fn authorize(&self, headers: &HashMap<String, String>) -> Result<()> {
        let Some(expected) = self.webhook_secret.as_deref() else {
            return Ok(());
        };
        let provided = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(WEBHOOK_SECRET_HEADER))
            .map(|(_, value)| value.as_str());
        if provided == Some(expected) {
            Ok(())
        } else {
            Err(CheckoutError::Forbidden {
                message: "invalid webhook secret".to_string(),
            })
        }
    }

    pub async fn handle(&self, headers: &HashMap<String, String>, request: ApiRequest) -> ApiResponse {
        let result = match request {
            ApiRequest::Checkout { order } => match self.authorize(headers) {
                Ok(()) => self
                    .checkout(order)
                    .await
                    .map(|confirmation| json!({"ok": true, "order": confirmation})),
                Err(e) => Err(e),
            },
            ApiRequest::ApplyPromo { code } => self.apply_promo(code.as_deref()).await.map(|quote| {
                json!({
                    "success": true,
                    "code": quote.code,
                    "type": quote.kind,
                    "value": quote.value,
                    "left": quote.left,
                })
            }),
            ApiRequest::Balance { code } => self
                .balance(&code)
                .await
                .map(|left| json!({"ok": true, "code": code, "left": left})),
            ApiRequest::Seed => match self.authorize(headers) {
                Ok(()) => self
                    .seed()
                    .await
                    .map(|report| json!({"ok": true, "seeded": report.seeded})),
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => {
                if !e.needs_operator() {
                    tracing::info!(reason = e.reason().as_str(), "Request rejected: {}", e);
                }
                ApiResponse::from_error(&e)
            }
        }
    }

    /// Entry point for raw serverless events.
    pub async fn handle_event(&self, event: Value) -> ApiResponse {
        match parse_event(event) {
            Ok((envelope, request)) => self.handle(&envelope.headers, request).await,
            Err(e) => {
                tracing::info!("Malformed request: {}", e);
                ApiResponse::from_error(&e)
            }
        }
    }
}

fn parse_event(event: Value) -> Result<(ApiEnvelope, ApiRequest)> {
    let mut envelope: ApiEnvelope = serde_json::from_value(event)?;
    let body = match envelope.body.take() {
        Some(Value::String(raw)) => serde_json::from_str(&raw)?,
        Some(body) => body,
        None => return Err(CheckoutError::validation("body", "request body is required")),
    };
    let request = serde_json::from_value(body)?;
    Ok((envelope, request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCounterStore;
    use crate::domain::order::OrderRecord;
    use crate::domain::ports::{Notifier, NotifyReceipt};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Settings {
        secret: Option<String>,
    }

    impl ConfigProvider for Settings {
        fn key_prefix(&self) -> &str {
            "promo"
        }

        fn notify_timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        fn delivery_fee(&self) -> f64 {
            5.0
        }

        fn webhook_secret(&self) -> Option<&str> {
            self.secret.as_deref()
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl Notifier for AcceptAll {
        async fn send(&self, _order: &OrderRecord) -> Result<NotifyReceipt> {
            Ok(NotifyReceipt {
                channel: "test".to_string(),
                message_id: None,
            })
        }
    }

    async fn service(secret: Option<&str>) -> CheckoutService {
        let settings = Settings {
            secret: secret.map(str::to_string),
        };
        let catalog = Catalog::from_toml_str(
            "[[promos]]\ncode = \"NEW\"\nkind = \"percent\"\nvalue = 10\nlimit = 1\n",
        )
        .unwrap();
        let service = CheckoutService::assemble(
            &settings,
            catalog,
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(AcceptAll),
        );
        service.seed().await.unwrap();
        service
    }

    fn checkout_body(promo: Option<&str>) -> Value {
        json!({
            "action": "checkout",
            "order": {
                "items": [{"id": "p1", "name": "Chapman Red", "qty": 1, "unit": 6.5}],
                "customer": {"name": "Anna", "nick": "@anna", "payment": "cash"},
                "fulfill": "pickup",
                "address": {"pickup_city": "Berlin"},
                "promo_code": promo
            }
        })
    }

    #[tokio::test]
    async fn test_apply_promo_reports_left_without_consuming() {
        let service = service(None).await;
        let response = service
            .handle_event(json!({"body": {"action": "apply_promo", "code": "NEW"}}))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["left"], 1);
        assert_eq!(response.body["type"], "percent");
        assert_eq!(service.balance("NEW").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_apply_promo_status_codes() {
        let service = service(None).await;
        let missing = service
            .handle_event(json!({"body": {"action": "apply_promo"}}))
            .await;
        assert_eq!(missing.status, 400);

        let unknown = service
            .handle_event(json!({"body": {"action": "apply_promo", "code": "nope"}}))
            .await;
        assert_eq!(unknown.status, 404);
        assert_eq!(unknown.body["reason"], "promo_not_found");

        let order = serde_json::from_value(checkout_body(Some("NEW"))["order"].clone()).unwrap();
        service.checkout(order).await.unwrap();
        let exhausted = service
            .handle_event(json!({"body": {"action": "apply_promo", "code": "NEW"}}))
            .await;
        assert_eq!(exhausted.status, 410);
    }

    #[tokio::test]
    async fn test_checkout_accepts_string_body() {
        let service = service(None).await;
        let raw = checkout_body(Some("NEW")).to_string();
        let response = service.handle_event(json!({"body": raw})).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body["order"]["state"], "done");
        assert_eq!(response.body["order"]["promo_remaining"], 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let service = service(None).await;
        let response = service.handle_event(json!({"body": "{not json"})).await;
        assert_eq!(response.status, 400);

        let response = service
            .handle_event(json!({"body": {"action": "refund"}}))
            .await;
        assert_eq!(response.status, 400);

        let response = service.handle_event(json!({"headers": {}})).await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_webhook_secret_guards_checkout_and_seed() {
        let service = service(Some("s3cret")).await;

        let denied = service
            .handle_event(json!({"body": checkout_body(None)}))
            .await;
        assert_eq!(denied.status, 403);

        let allowed = service
            .handle_event(json!({
                "headers": {"X-Webhook-Secret": "s3cret"},
                "body": checkout_body(None)
            }))
            .await;
        assert_eq!(allowed.status, 200);

        let seed_denied = service
            .handle_event(json!({"headers": {"x-webhook-secret": "wrong"}, "body": {"action": "seed"}}))
            .await;
        assert_eq!(seed_denied.status, 403);

        // 查詢餘額不需要密鑰
        let balance = service
            .handle_event(json!({"body": {"action": "balance", "code": "NEW"}}))
            .await;
        assert_eq!(balance.status, 200);
    }
}
