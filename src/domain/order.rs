use crate::domain::model::{to_cents, AppliedPromo, PromoDefinition};
use crate::utils::error::{CheckoutError, Result};
use crate::utils::validation::{require_text, validate_email};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub const MAX_ITEM_QTY: u32 = 10_000;
pub const MAX_UNIT_PRICE: f64 = 100_000.0;
pub const MAX_SUBTOTAL_CENTS: i64 = 100_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentMode {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub qty: u32,
    #[serde(default)]
    pub unit: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerFields {
    pub name: Option<String>,
    pub nick: Option<String>,
    pub payment: Option<String>,
}

/// Address fields as submitted; which ones are required depends on the
/// fulfillment mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressFields {
    pub rec_first: Option<String>,
    pub rec_last: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub email: Option<String>,
    pub pickup_city: Option<String>,
}

/// An order exactly as the client tier sent it. Nothing here is trusted until
/// [`OrderRequest::validate`] succeeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub customer: CustomerFields,
    pub fulfill: Option<FulfillmentMode>,
    #[serde(default)]
    pub address: AddressFields,
    pub note: Option<String>,
    pub promo_code: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    pub qty: u32,
    pub unit_cents: i64,
}

impl LineItem {
    pub fn subtotal_cents(&self) -> i64 {
        self.unit_cents.saturating_mul(i64::from(self.qty))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub name: String,
    pub nick: String,
    pub payment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryAddress {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub house: String,
    pub postcode: String,
    pub city: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Fulfillment {
    Pickup { city: String },
    Delivery(DeliveryAddress),
}

/// An order that passed validation and may now touch external resources.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidOrder {
    pub items: Vec<LineItem>,
    pub customer: Customer,
    pub fulfillment: Fulfillment,
    pub note: Option<String>,
    pub promo_code: Option<String>,
    pub source: String,
    /// Goods subtotal, bounded by [`MAX_SUBTOTAL_CENTS`].
    pub subtotal_cents: i64,
}

impl OrderRequest {
    /// Checks every required field. Pure: no store or network access.
    pub fn validate(self) -> Result<ValidOrder> {
        if self.items.is_empty() {
            return Err(CheckoutError::validation("items", "cart is empty"));
        }

        let mut items = Vec::with_capacity(self.items.len());
        let mut subtotal_cents: i64 = 0;
        for (idx, item) in self.items.iter().enumerate() {
            let id = require_text(&format!("items[{}].id", idx), item.id.as_deref())?;
            let name = require_text(&format!("items[{}].name", idx), item.name.as_deref())?;
            if item.qty == 0 || item.qty > MAX_ITEM_QTY {
                return Err(CheckoutError::validation(
                    format!("items[{}].qty", idx),
                    format!("quantity must be between 1 and {}", MAX_ITEM_QTY),
                ));
            }
            if !item.unit.is_finite() || item.unit < 0.0 || item.unit > MAX_UNIT_PRICE {
                return Err(CheckoutError::validation(
                    format!("items[{}].unit", idx),
                    format!("unit price must be between 0 and {}", MAX_UNIT_PRICE),
                ));
            }
            let line = LineItem {
                id: id.to_string(),
                name: name.to_string(),
                qty: item.qty,
                unit_cents: to_cents(item.unit),
            };
            subtotal_cents = line
                .unit_cents
                .checked_mul(i64::from(line.qty))
                .and_then(|line_cents| subtotal_cents.checked_add(line_cents))
                .filter(|total| *total <= MAX_SUBTOTAL_CENTS)
                .ok_or_else(|| CheckoutError::validation("items", "order total is too large"))?;
            items.push(line);
        }

        let customer = Customer {
            name: require_text("customer.name", self.customer.name.as_deref())?.to_string(),
            nick: require_text("customer.nick", self.customer.nick.as_deref())?.to_string(),
            payment: require_text("customer.payment", self.customer.payment.as_deref())?
                .to_string(),
        };

        let address = &self.address;
        let fulfillment = match self.fulfill {
            None => return Err(CheckoutError::validation("fulfill", "is required")),
            Some(FulfillmentMode::Pickup) => Fulfillment::Pickup {
                city: require_text("address.pickup_city", address.pickup_city.as_deref())?
                    .to_string(),
            },
            Some(FulfillmentMode::Delivery) => {
                let email = require_text("address.email", address.email.as_deref())?;
                let delivery = DeliveryAddress {
                    first_name: require_text("address.rec_first", address.rec_first.as_deref())?
                        .to_string(),
                    last_name: require_text("address.rec_last", address.rec_last.as_deref())?
                        .to_string(),
                    street: require_text("address.street", address.street.as_deref())?
                        .to_string(),
                    house: require_text("address.house", address.house.as_deref())?.to_string(),
                    postcode: require_text("address.postcode", address.postcode.as_deref())?
                        .to_string(),
                    city: require_text("address.city", address.city.as_deref())?.to_string(),
                    email: email.to_string(),
                };
                validate_email("address.email", email)?;
                Fulfillment::Delivery(delivery)
            }
        };

        // 空白促銷碼視為未提供；其餘保持原樣（大小寫敏感）
        let promo_code = self.promo_code.filter(|code| !code.trim().is_empty());

        Ok(ValidOrder {
            items,
            customer,
            fulfillment,
            note: self
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            promo_code,
            source: self.source.unwrap_or_else(|| "unknown".to_string()),
            subtotal_cents,
        })
    }
}

static ORDER_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_order_id(created_at: &DateTime<Utc>) -> String {
    let seq = ORDER_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("ORD-{}-{:04}", created_at.format("%Y%m%d%H%M%S%3f"), seq)
}

/// The finalized order handed to the notifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub created_at: DateTime<Utc>,
    pub customer: Customer,
    pub fulfillment: Fulfillment,
    pub items: Vec<LineItem>,
    pub note: Option<String>,
    pub source: String,
    pub subtotal_cents: i64,
    pub delivery_fee_cents: i64,
    pub discount: Option<AppliedPromo>,
    pub total_cents: i64,
}

impl OrderRecord {
    /// Computes totals. The delivery fee only applies to delivery orders and is
    /// never discounted. Infallible: the subtotal was bounded during validation.
    pub fn finalize(
        order: ValidOrder,
        delivery_fee_cents: i64,
        promo: Option<&PromoDefinition>,
    ) -> Self {
        let subtotal_cents = order.subtotal_cents;
        let delivery_fee_cents = match order.fulfillment {
            Fulfillment::Delivery(_) => delivery_fee_cents,
            Fulfillment::Pickup { .. } => 0,
        };
        let discount = promo.map(|def| AppliedPromo {
            code: def.code.clone(),
            kind: def.kind,
            value: def.value,
            discount_cents: def.discount_cents(subtotal_cents),
        });
        let discount_cents = discount.as_ref().map(|d| d.discount_cents).unwrap_or(0);
        let created_at = Utc::now();

        Self {
            order_id: next_order_id(&created_at),
            created_at,
            customer: order.customer,
            fulfillment: order.fulfillment,
            items: order.items,
            note: order.note,
            source: order.source,
            subtotal_cents,
            delivery_fee_cents,
            discount,
            total_cents: (subtotal_cents - discount_cents).saturating_add(delivery_fee_cents),
        }
    }
}
