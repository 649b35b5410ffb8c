use crate::core::catalog::Catalog;
use crate::domain::ports::CounterStore;
use crate::utils::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeededCode {
    pub code: String,
    pub key: String,
    pub remaining: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub seeded: Vec<SeededCode>,
}

/// Resets every catalogued counter to its configured limit.
///
/// Uses plain `set`, so running it again with the same catalog leaves the same
/// counters behind. The catalog was validated when it was loaded; no counter
/// is written for a catalog that failed to load.
pub async fn seed_counters<S: CounterStore + ?Sized>(
    store: &S,
    catalog: &Catalog,
    key_prefix: &str,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    for def in catalog.definitions() {
        let key = format!("{}:{}", key_prefix, def.code);
        let remaining = i64::from(def.limit);
        store.set(&key, remaining).await?;
        tracing::info!(code = %def.code, remaining, "🌱 Seeded promo counter");
        report.seeded.push(SeededCode {
            code: def.code.clone(),
            key,
            remaining,
        });
    }
    Ok(report)
}
