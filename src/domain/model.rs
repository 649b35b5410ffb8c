use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromoKind {
    Percent,
    Fixed,
}

impl PromoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoKind::Percent => "percent",
            PromoKind::Fixed => "fixed",
        }
    }
}

/// A discount code as configured in the catalog.
///
/// `limit` is the starting value of the code's remaining counter; the live
/// count lives in the counter store, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoDefinition {
    pub code: String,
    pub kind: PromoKind,
    pub value: f64,
    pub limit: u32,
}

impl PromoDefinition {
    /// Discount in cents for a goods subtotal. Never exceeds the subtotal.
    pub fn discount_cents(&self, subtotal_cents: i64) -> i64 {
        let raw = match self.kind {
            PromoKind::Percent => (subtotal_cents as f64 * self.value / 100.0).round() as i64,
            PromoKind::Fixed => to_cents(self.value),
        };
        raw.clamp(0, subtotal_cents.max(0))
    }
}

/// Result of a single reserve attempt against a known code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Granted { remaining: i64 },
    Exhausted,
}

impl Reservation {
    pub fn is_granted(&self) -> bool {
        matches!(self, Reservation::Granted { .. })
    }
}

/// The discount actually applied to a finalized order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedPromo {
    pub code: String,
    pub kind: PromoKind,
    pub value: f64,
    pub discount_cents: i64,
}

pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn format_eur(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}€", sign, abs / 100, abs % 100)
}
