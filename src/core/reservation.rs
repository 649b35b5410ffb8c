use crate::core::catalog::Catalog;
use crate::core::seed::{seed_counters, SeedReport};
use crate::domain::model::Reservation;
use crate::domain::ports::{CounterStore, CounterStoreRef};
use crate::utils::error::Result;
use std::sync::Arc;

const COMPENSATION_ATTEMPTS: usize = 3;

/// Owns the remaining-count protocol for every catalogued promo code.
///
/// The store offers no conditional decrement, so `reserve` decrements first and
/// compensates with an increment when the result went below zero. Correctness
/// rests only on the store's single-key atomicity: no lock is held here, and
/// several processes may run this protocol against the same store at once.
#[derive(Clone)]
pub struct ReservationEngine {
    store: CounterStoreRef,
    catalog: Arc<Catalog>,
    key_prefix: String,
}

impl ReservationEngine {
    pub fn new(store: CounterStoreRef, catalog: Arc<Catalog>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            catalog,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn key_for(&self, code: &str) -> String {
        format!("{}:{}", self.key_prefix, code)
    }

    /// Operator reset of every catalogued counter to its limit.
    pub async fn seed(&self) -> Result<SeedReport> {
        seed_counters(self.store.as_ref(), &self.catalog, &self.key_prefix).await
    }

    /// Current remaining count. Possibly stale the moment it returns; never a lock.
    ///
    /// A catalogued code that was never seeded reads as 0. A raw value caught
    /// mid-compensation reads as 0 as well.
    pub async fn check_balance(&self, code: &str) -> Result<i64> {
        self.catalog.resolve(code)?;
        let raw = self.store.get(&self.key_for(code)).await?;
        Ok(raw.unwrap_or(0).max(0))
    }

    pub async fn reserve(&self, code: &str) -> Result<Reservation> {
        self.catalog.resolve(code)?;
        let key = self.key_for(code);

        let after = self.store.decr(&key).await?;
        if after >= 0 {
            tracing::debug!(code, remaining = after, "promo reservation granted");
            return Ok(Reservation::Granted { remaining: after });
        }

        self.compensate(&key).await?;
        tracing::info!(code, "promo code exhausted");
        Ok(Reservation::Exhausted)
    }

    /// Returns one previously granted unit to the pool.
    ///
    /// The engine cannot tell a compensating release from a spurious one; the
    /// caller must release at most once per granted reservation.
    pub async fn release(&self, code: &str) -> Result<i64> {
        self.catalog.resolve(code)?;
        let remaining = self.store.incr(&self.key_for(code)).await?;
        tracing::debug!(code, remaining, "promo reservation released");
        Ok(remaining)
    }

    async fn compensate(&self, key: &str) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.store.incr(key).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < COMPENSATION_ATTEMPTS => {
                    tracing::warn!(key, attempt, "compensating increment failed, retrying: {}", e);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(key, "❌ counter left below zero after failed compensation: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
