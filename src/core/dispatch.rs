use crate::core::reservation::ReservationEngine;
use crate::domain::model::{to_cents, AppliedPromo, Reservation};
use crate::domain::order::{OrderRecord, OrderRequest, ValidOrder};
use crate::domain::ports::{ConfigProvider, NotifierRef, NotifyReceipt};
use crate::utils::error::{CheckoutError, Result};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Validating,
    PromoReserving,
    Notifying,
    Done,
    Failed,
}

impl DispatchState {
    fn can_advance_to(self, next: DispatchState) -> bool {
        use DispatchState::*;
        matches!(
            (self, next),
            (Validating, PromoReserving)
                | (Validating, Notifying)
                | (PromoReserving, Notifying)
                | (Notifying, Done)
                | (Validating | PromoReserving | Notifying, Failed)
        )
    }
}

/// Tracks one order attempt through the dispatch state machine.
#[derive(Debug)]
struct Attempt {
    state: DispatchState,
}

impl Attempt {
    fn new() -> Self {
        Self {
            state: DispatchState::Validating,
        }
    }

    fn advance(&mut self, next: DispatchState) {
        debug_assert!(self.state.can_advance_to(next), "{:?} -> {:?}", self.state, next);
        tracing::debug!(from = ?self.state, to = ?next, "dispatch transition");
        self.state = next;
    }

    fn fail(&mut self, error: CheckoutError) -> CheckoutError {
        let from = self.state;
        self.advance(DispatchState::Failed);
        if error.needs_operator() {
            tracing::error!(
                state = ?from,
                reason = error.reason().as_str(),
                "❌ Configuration fault, operator action required: {} (💡 {})",
                error,
                error.recovery_suggestion()
            );
        } else {
            tracing::warn!(state = ?from, reason = error.reason().as_str(), "Order attempt failed: {}", error);
        }
        error
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub state: DispatchState,
    pub total_cents: i64,
    pub discount: Option<AppliedPromo>,
    pub promo_remaining: Option<i64>,
    pub receipt: NotifyReceipt,
}

/// Composes the final order, notifies, and keeps promo inventory consistent
/// with the notification outcome: a promo unit stays consumed only when the
/// notification is believed to have succeeded.
#[derive(Clone)]
pub struct OrderDispatcher {
    reservations: ReservationEngine,
    notifier: NotifierRef,
    notify_timeout: Duration,
    delivery_fee_cents: i64,
}

impl OrderDispatcher {
    pub fn new<C: ConfigProvider + ?Sized>(
        reservations: ReservationEngine,
        notifier: NotifierRef,
        config: &C,
    ) -> Self {
        Self {
            reservations,
            notifier,
            notify_timeout: config.notify_timeout(),
            delivery_fee_cents: to_cents(config.delivery_fee()),
        }
    }

    pub fn reservations(&self) -> &ReservationEngine {
        &self.reservations
    }

    /// Runs one order attempt to a terminal state.
    ///
    /// Validation happens inline. Everything after it runs on its own task, so
    /// dropping the returned future does not abandon a reservation mid-flight:
    /// the task still notifies and commits or rolls back.
    pub async fn dispatch(&self, request: OrderRequest) -> Result<OrderConfirmation> {
        let mut attempt = Attempt::new();
        let order = request.validate().map_err(|e| attempt.fail(e))?;

        let this = self.clone();
        tokio::spawn(async move { this.complete(attempt, order).await })
            .await
            .map_err(|e| CheckoutError::dispatch(format!("dispatch task aborted: {}", e)))?
    }

    async fn complete(&self, mut attempt: Attempt, order: ValidOrder) -> Result<OrderConfirmation> {
        let mut reserved = None;
        if let Some(code) = order.promo_code.as_deref() {
            attempt.advance(DispatchState::PromoReserving);
            let definition = match self.reservations.catalog().resolve(code) {
                Ok(def) => def.clone(),
                Err(e) => return Err(attempt.fail(e)),
            };
            match self.reservations.reserve(code).await {
                Ok(Reservation::Granted { remaining }) => reserved = Some((definition, remaining)),
                Ok(Reservation::Exhausted) => {
                    return Err(attempt.fail(CheckoutError::PromoExhausted {
                        code: code.to_string(),
                    }))
                }
                Err(e) => return Err(attempt.fail(e)),
            }
        }

        attempt.advance(DispatchState::Notifying);
        let record = OrderRecord::finalize(
            order,
            self.delivery_fee_cents,
            reserved.as_ref().map(|(def, _)| def),
        );

        let outcome = match tokio::time::timeout(self.notify_timeout, self.notifier.send(&record)).await {
            Ok(result) => result,
            Err(_) => Err(CheckoutError::dispatch(format!(
                "notification timed out after {:?}",
                self.notify_timeout
            ))),
        };

        match outcome {
            Ok(receipt) => {
                attempt.advance(DispatchState::Done);
                tracing::info!(order_id = %record.order_id, total_cents = record.total_cents, "✅ Order dispatched");
                Ok(OrderConfirmation {
                    order_id: record.order_id,
                    state: attempt.state,
                    total_cents: record.total_cents,
                    discount: record.discount,
                    promo_remaining: reserved.map(|(_, remaining)| remaining),
                    receipt,
                })
            }
            Err(e) => {
                if let Some((def, _)) = &reserved {
                    self.rollback(&def.code).await;
                }
                Err(attempt.fail(e))
            }
        }
    }

    /// Internal compensation; its own failure is logged, never surfaced.
    async fn rollback(&self, code: &str) {
        match self.reservations.release(code).await {
            Ok(remaining) => tracing::info!(code, remaining, "↩️ Promo reservation rolled back"),
            Err(e) => tracing::error!(code, "❌ Failed to roll back promo reservation: {}", e),
        }
    }
}
