use crate::adapters::{InMemoryCounterStore, TelegramNotifier, UpstashCounterStore};
use crate::core::catalog::Catalog;
use crate::core::checkout::CheckoutService;
use crate::domain::model::PromoDefinition;
use crate::domain::ports::{ConfigProvider, CounterStoreRef, NotifierRef};
use crate::utils::error::{CheckoutError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_required_field, validate_url,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_KEY_PREFIX: &str = "promo";
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DELIVERY_FEE: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
    pub catalog: Option<CatalogSourceConfig>,
    #[serde(default)]
    pub promos: Vec<PromoDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Upstash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    pub url: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    pub timeout_seconds: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            url: None,
            token: None,
            key_prefix: default_key_prefix(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub api_base: Option<String>,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutConfig {
    pub delivery_fee: Option<f64>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSourceConfig {
    pub path: String,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

/// A `${VAR}` placeholder that survived substitution counts as unset.
fn resolved(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !(v.starts_with("${") && v.ends_with('}')))
        .map(str::to_string)
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CheckoutError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CheckoutError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BOT_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CheckoutError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("store.key_prefix", &self.store.key_prefix)?;

        if self.store.kind == StoreKind::Upstash {
            let url = resolved(&self.store.url);
            validate_url("store.url", validate_required_field("store.url", &url)?)?;
            validate_required_field("store.token", &resolved(&self.store.token))?;
        }
        if let Some(timeout) = self.store.timeout_seconds {
            validate_positive_number("store.timeout_seconds", timeout, 1)?;
        }

        if let Some(api_base) = &self.notifier.api_base {
            validate_url("notifier.api_base", api_base)?;
        }
        if let Some(timeout) = self.notifier.timeout_seconds {
            validate_positive_number("notifier.timeout_seconds", timeout, 1)?;
        }

        let fee = self.delivery_fee();
        if !fee.is_finite() || fee < 0.0 {
            return Err(CheckoutError::InvalidConfigValueError {
                field: "checkout.delivery_fee".to_string(),
                value: fee.to_string(),
                reason: "Delivery fee must be a non-negative number".to_string(),
            });
        }

        if self.catalog.is_some() && !self.promos.is_empty() {
            return Err(CheckoutError::ConfigValidationError {
                field: "catalog".to_string(),
                message: "Use either [catalog] path or inline [[promos]], not both".to_string(),
            });
        }

        Ok(())
    }

    /// Loads the promo catalog once; a broken source is a configuration fault.
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(source) => Catalog::from_file(&source.path),
            None => Catalog::from_definitions(self.promos.clone()),
        }
    }

    pub fn build_store(&self) -> Result<CounterStoreRef> {
        match self.store.kind {
            StoreKind::Memory => {
                tracing::warn!("Using in-memory counter store; counters are lost on exit");
                Ok(Arc::new(InMemoryCounterStore::new()))
            }
            StoreKind::Upstash => {
                let url = resolved(&self.store.url);
                let token = resolved(&self.store.token);
                let timeout = Duration::from_secs(self.store.timeout_seconds.unwrap_or(5));
                Ok(Arc::new(UpstashCounterStore::with_timeout(
                    validate_required_field("store.url", &url)?.clone(),
                    validate_required_field("store.token", &token)?.clone(),
                    timeout,
                )))
            }
        }
    }

    pub fn build_notifier(&self) -> NotifierRef {
        let api_base = self
            .notifier
            .api_base
            .clone()
            .unwrap_or_else(|| crate::adapters::telegram::DEFAULT_API_BASE.to_string());
        Arc::new(TelegramNotifier::new(
            api_base,
            resolved(&self.notifier.bot_token),
            resolved(&self.notifier.chat_id),
        ))
    }

    pub fn build_service(&self) -> Result<CheckoutService> {
        self.validate()?;
        let catalog = self.load_catalog()?;
        tracing::info!("📋 Loaded promo catalog with {} codes", catalog.len());
        if catalog.is_empty() {
            tracing::warn!("Promo catalog is empty; every promo code will be rejected");
        }
        let store = self.build_store()?;
        Ok(CheckoutService::assemble(self, catalog, store, self.build_notifier()))
    }
}

impl ConfigProvider for AppConfig {
    fn key_prefix(&self) -> &str {
        &self.store.key_prefix
    }

    fn notify_timeout(&self) -> Duration {
        Duration::from_secs(
            self.notifier
                .timeout_seconds
                .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECS),
        )
    }

    fn delivery_fee(&self) -> f64 {
        self.checkout.delivery_fee.unwrap_or(DEFAULT_DELIVERY_FEE)
    }

    fn webhook_secret(&self) -> Option<&str> {
        self.checkout
            .webhook_secret
            .as_deref()
            .filter(|s| !s.is_empty() && !s.starts_with("${"))
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[store]
kind = "memory"

[notifier]
bot_token = "TOKEN"
chat_id = "42"
timeout_seconds = 3

[checkout]
delivery_fee = 4.5

[[promos]]
code = "NEW"
kind = "percent"
value = 10
limit = 9999
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = AppConfig::from_toml_str(BASIC).unwrap();
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.key_prefix(), "promo");
        assert_eq!(config.notify_timeout(), Duration::from_secs(3));
        assert_eq!(config.delivery_fee(), 4.5);
        assert!(config.webhook_secret().is_none());
        assert!(config.validate().is_ok());
        assert_eq!(config.load_catalog().unwrap().len(), 1);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PROMO_TEST_UPSTASH_URL", "https://eu1-test.upstash.io");

        let config = AppConfig::from_toml_str(
            r#"
[store]
kind = "upstash"
url = "${PROMO_TEST_UPSTASH_URL}"
token = "${PROMO_TEST_UNSET_TOKEN}"
"#,
        )
        .unwrap();
        assert_eq!(config.store.url.as_deref(), Some("https://eu1-test.upstash.io"));

        // 未設定的變數保持原樣並被視為缺少
        match config.validate() {
            Err(CheckoutError::MissingConfigError { field }) => assert_eq!(field, "store.token"),
            other => panic!("expected missing token, got {:?}", other),
        }

        std::env::remove_var("PROMO_TEST_UPSTASH_URL");
    }

    #[test]
    fn test_config_validation_rejects_bad_urls_and_timeouts() {
        let config = AppConfig::from_toml_str(
            "[store]\nkind = \"upstash\"\nurl = \"not-a-url\"\ntoken = \"t\"\n",
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str("[notifier]\ntimeout_seconds = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalog_path_and_inline_promos_conflict() {
        let toml = format!("[catalog]\npath = \"promos.csv\"\n{}", BASIC);
        let config = AppConfig::from_toml_str(&toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(CheckoutError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_catalog_from_external_file() {
        let mut catalog_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(catalog_file, "code,kind,value,limit\nNEWYEAR22,percent,20,50\n").unwrap();

        let toml = format!(
            "[catalog]\npath = \"{}\"\n",
            catalog_file.path().display().to_string().replace('\\', "/")
        );
        let config = AppConfig::from_toml_str(&toml).unwrap();
        let catalog = config.load_catalog().unwrap();
        assert_eq!(catalog.resolve("NEWYEAR22").unwrap().limit, 50);
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.promos[0].code, "NEW");
    }

    #[test]
    fn test_malformed_toml_is_config_fault() {
        let err = AppConfig::from_toml_str("[store\nkind = ").unwrap_err();
        assert!(err.needs_operator());
    }
}
