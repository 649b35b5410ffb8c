use crate::domain::model::format_eur;
use crate::domain::order::{Fulfillment, OrderRecord};
use crate::domain::ports::{Notifier, NotifyReceipt};
use crate::utils::error::{CheckoutError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends each order to the shop admin through the Telegram Bot API.
///
/// Credentials are optional at construction so that a deployment missing them
/// still starts; every send then fails as a configuration fault.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(api_base: impl Into<String>, bot_token: Option<String>, chat_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.filter(|t| !t.trim().is_empty()),
            chat_id: chat_id.filter(|c| !c.trim().is_empty()),
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or_else(|| CheckoutError::MissingConfigError {
                field: "BOT_TOKEN".to_string(),
            })?;
        let chat_id = self
            .chat_id
            .as_deref()
            .ok_or_else(|| CheckoutError::MissingConfigError {
                field: "ADMIN_ID".to_string(),
            })?;
        Ok((token, chat_id))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, order: &OrderRecord) -> Result<NotifyReceipt> {
        let (token, chat_id) = self.credentials()?;
        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let payload = SendMessage {
            chat_id,
            text: render_order_html(order),
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CheckoutError::dispatch(format!("Telegram request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            tracing::error!("Telegram API error {}: {}", status, details);
            return Err(CheckoutError::dispatch(format!(
                "Telegram API error {}: {}",
                status, details
            )));
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message_id = body
            .pointer("/result/message_id")
            .and_then(serde_json::Value::as_i64);

        tracing::info!(order_id = %order.order_id, source = %order.source, "Order sent to admin via Telegram");
        Ok(NotifyReceipt {
            channel: "telegram".to_string(),
            message_id,
        })
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Admin-facing order summary in Telegram's HTML subset.
pub fn render_order_html(order: &OrderRecord) -> String {
    let mut lines = Vec::new();
    lines.push(format!("<b>New order {}</b>", escape_html(&order.order_id)));
    lines.push(format!("⏱ {}", order.created_at.to_rfc3339()));
    lines.push(String::new());
    lines.push(format!("<b>Customer:</b> {}", escape_html(&order.customer.name)));
    lines.push(format!("<b>Nick:</b> {}", escape_html(&order.customer.nick)));
    lines.push(format!("<b>Payment:</b> {}", escape_html(&order.customer.payment)));

    match &order.fulfillment {
        Fulfillment::Delivery(a) => {
            lines.push("<b>Fulfillment:</b> delivery".to_string());
            lines.push(format!(
                "<b>Address:</b> {} {}, {} {}, {} {}",
                escape_html(&a.first_name),
                escape_html(&a.last_name),
                escape_html(&a.street),
                escape_html(&a.house),
                escape_html(&a.postcode),
                escape_html(&a.city)
            ));
            lines.push(format!("<b>Email:</b> {}", escape_html(&a.email)));
        }
        Fulfillment::Pickup { city } => {
            lines.push("<b>Fulfillment:</b> pickup".to_string());
            lines.push(format!("<b>Pickup city:</b> {}", escape_html(city)));
        }
    }

    lines.push(String::new());
    lines.push("<b>Items:</b>".to_string());
    for item in &order.items {
        lines.push(format!(
            "{} — x{} — {}",
            escape_html(&item.name),
            item.qty,
            format_eur(item.subtotal_cents())
        ));
    }
    if let Some(promo) = &order.discount {
        lines.push(format!(
            "Promo {}: -{}",
            escape_html(&promo.code),
            format_eur(promo.discount_cents)
        ));
    }
    if order.delivery_fee_cents > 0 {
        lines.push(format!("Delivery: {}", format_eur(order.delivery_fee_cents)));
    }
    lines.push(format!("<b>Total: {}</b>", format_eur(order.total_cents)));
    if let Some(note) = &order.note {
        lines.push(format!("\nNote: {}", escape_html(note)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{PromoDefinition, PromoKind};
    use crate::domain::order::OrderRequest;
    use httpmock::prelude::*;
    use serde_json::json;

    fn record(promo: Option<&PromoDefinition>) -> OrderRecord {
        let request: OrderRequest = serde_json::from_value(json!({
            "items": [{"id": "p1", "name": "Red <Limited>", "qty": 2, "unit": 6.5}],
            "customer": {"name": "Anna & Co", "nick": "@anna", "payment": "cash"},
            "fulfill": "pickup",
            "address": {"pickup_city": "Berlin"},
            "note": "ring twice",
            "source": "web"
        }))
        .unwrap();
        OrderRecord::finalize(request.validate().unwrap(), 500, promo)
    }

    #[test]
    fn test_render_escapes_html_and_lists_totals() {
        let promo = PromoDefinition {
            code: "NEWYEAR22".into(),
            kind: PromoKind::Percent,
            value: 20.0,
            limit: 50,
        };
        let text = render_order_html(&record(Some(&promo)));
        assert!(text.contains("Anna &amp; Co"));
        assert!(text.contains("Red &lt;Limited&gt; — x2 — 13.00€"));
        assert!(text.contains("Promo NEWYEAR22: -2.60€"));
        assert!(text.contains("<b>Total: 10.40€</b>"));
        assert!(text.contains("Pickup city:</b> Berlin"));
        assert!(!text.contains("Delivery:"));
    }

    #[tokio::test]
    async fn test_send_posts_to_bot_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/sendMessage")
                .body_contains("\"chat_id\":\"42\"")
                .body_contains("\"parse_mode\":\"HTML\"");
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 7}}));
        });

        let notifier = TelegramNotifier::new(server.base_url(), Some("TOKEN".into()), Some("42".into()));
        let receipt = notifier.send(&record(None)).await.unwrap();

        mock.assert();
        assert_eq!(receipt.message_id, Some(7));
        assert_eq!(receipt.channel, "telegram");
    }

    #[tokio::test]
    async fn test_send_non_success_is_dispatch_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/botTOKEN/sendMessage");
            then.status(500).body("upstream down");
        });

        let notifier = TelegramNotifier::new(server.base_url(), Some("TOKEN".into()), Some("42".into()));
        let err = notifier.send(&record(None)).await.unwrap_err();
        match err {
            CheckoutError::DispatchError { message } => assert!(message.contains("upstream down")),
            other => panic!("expected dispatch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_is_configuration_fault() {
        let notifier = TelegramNotifier::new(DEFAULT_API_BASE, None, Some("42".into()));
        let err = notifier.send(&record(None)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::MissingConfigError { ref field } if field == "BOT_TOKEN"));

        let notifier = TelegramNotifier::new(DEFAULT_API_BASE, Some("TOKEN".into()), Some(" ".into()));
        assert!(notifier.send(&record(None)).await.unwrap_err().needs_operator());
    }
}
