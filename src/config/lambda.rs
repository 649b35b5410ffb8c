use crate::adapters::telegram::DEFAULT_API_BASE;
use crate::adapters::{TelegramNotifier, UpstashCounterStore};
use crate::core::catalog::Catalog;
use crate::core::checkout::CheckoutService;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{CheckoutError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_required_field, validate_url,
    Validate,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;

use super::toml_config::{DEFAULT_DELIVERY_FEE, DEFAULT_KEY_PREFIX, DEFAULT_NOTIFY_TIMEOUT_SECS};

pub const DEFAULT_CATALOG_PATH: &str = "promo-catalog.toml";

/// Serverless configuration, read from the function's environment.
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub upstash_url: Option<String>,
    pub upstash_token: Option<String>,
    pub bot_token: Option<String>,
    pub admin_id: Option<String>,
    pub webhook_secret: Option<String>,
    pub catalog_path: String,
    pub key_prefix: String,
    pub notify_timeout_secs: u64,
    pub delivery_fee: f64,
    pub telegram_api_base: String,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let notify_timeout_secs = match var("NOTIFY_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .parse()
                .map_err(|_| CheckoutError::InvalidConfigValueError {
                    field: "NOTIFY_TIMEOUT_SECONDS".to_string(),
                    value: raw.clone(),
                    reason: "must be a whole number of seconds".to_string(),
                })?,
            None => DEFAULT_NOTIFY_TIMEOUT_SECS,
        };

        let delivery_fee = match var("DELIVERY_FEE") {
            Some(raw) => raw
                .parse()
                .map_err(|_| CheckoutError::InvalidConfigValueError {
                    field: "DELIVERY_FEE".to_string(),
                    value: raw.clone(),
                    reason: "must be a decimal amount".to_string(),
                })?,
            None => DEFAULT_DELIVERY_FEE,
        };

        Ok(Self {
            upstash_url: var("UPSTASH_REDIS_REST_URL"),
            upstash_token: var("UPSTASH_REDIS_REST_TOKEN"),
            bot_token: var("BOT_TOKEN"),
            admin_id: var("ADMIN_ID"),
            webhook_secret: var("WEBHOOK_SECRET"),
            catalog_path: var("PROMO_CATALOG_PATH").unwrap_or_else(|| DEFAULT_CATALOG_PATH.to_string()),
            key_prefix: var("PROMO_KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            notify_timeout_secs,
            delivery_fee,
            telegram_api_base: var("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    /// Builds the service once per cold start.
    ///
    /// Notifier credentials are not required here: a missing `BOT_TOKEN` or
    /// `ADMIN_ID` surfaces per checkout as a misconfiguration, with rollback.
    pub fn build_service(&self) -> Result<CheckoutService> {
        self.validate()?;
        let url = validate_required_field("UPSTASH_REDIS_REST_URL", &self.upstash_url)?;
        let token = validate_required_field("UPSTASH_REDIS_REST_TOKEN", &self.upstash_token)?;

        let catalog = Catalog::from_file(&self.catalog_path)?;
        tracing::info!(
            "📋 Loaded promo catalog with {} codes from {}",
            catalog.len(),
            self.catalog_path
        );

        if catalog.is_empty() {
            tracing::warn!("Promo catalog is empty; every promo code will be rejected");
        }

        let store = Arc::new(UpstashCounterStore::new(url.clone(), token.clone()));
        let notifier = Arc::new(TelegramNotifier::new(
            self.telegram_api_base.clone(),
            self.bot_token.clone(),
            self.admin_id.clone(),
        ));
        Ok(CheckoutService::assemble(self, catalog, store, notifier))
    }
}

impl ConfigProvider for LambdaConfig {
    fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    fn delivery_fee(&self) -> f64 {
        self.delivery_fee
    }

    fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        // 驗證 Upstash 端點
        if let Some(url) = &self.upstash_url {
            validate_url("UPSTASH_REDIS_REST_URL", url)?;
        }
        validate_url("TELEGRAM_API_BASE", &self.telegram_api_base)?;

        validate_non_empty_string("PROMO_KEY_PREFIX", &self.key_prefix)?;
        validate_positive_number("NOTIFY_TIMEOUT_SECONDS", self.notify_timeout_secs, 1)?;

        if !self.delivery_fee.is_finite() || self.delivery_fee < 0.0 {
            return Err(CheckoutError::InvalidConfigValueError {
                field: "DELIVERY_FEE".to_string(),
                value: self.delivery_fee.to_string(),
                reason: "Delivery fee must be a non-negative number".to_string(),
            });
        }

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}
