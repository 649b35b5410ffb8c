use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Validation error: {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Unknown promo code: {code}")]
    PromoNotFound { code: String },

    #[error("Promo code exhausted: {code}")]
    PromoExhausted { code: String },

    #[error("Order dispatch failed: {message}")]
    DispatchError { message: String },

    #[error("Counter store error: {message}")]
    StoreError { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, CheckoutError>;

/// The single outcome reported to a client for a rejected request.
///
/// Each reason maps to a stable status code so the client tier can render the
/// correct message without parsing error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Validation,
    Forbidden,
    PromoNotFound,
    PromoExhausted,
    DispatchFailed,
    Misconfigured,
}

impl FailureReason {
    pub fn status_code(&self) -> u16 {
        match self {
            FailureReason::Validation => 400,
            FailureReason::Forbidden => 403,
            FailureReason::PromoNotFound => 404,
            FailureReason::PromoExhausted => 410,
            FailureReason::Misconfigured => 500,
            FailureReason::DispatchFailed => 502,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Validation => "validation",
            FailureReason::Forbidden => "forbidden",
            FailureReason::PromoNotFound => "promo_not_found",
            FailureReason::PromoExhausted => "promo_exhausted",
            FailureReason::DispatchFailed => "dispatch_failed",
            FailureReason::Misconfigured => "misconfigured",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Promo,
    Upstream,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CheckoutError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CheckoutError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        CheckoutError::DispatchError {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        CheckoutError::StoreError {
            message: message.into(),
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            CheckoutError::ValidationError { .. } | CheckoutError::SerializationError(_) => {
                FailureReason::Validation
            }
            CheckoutError::Forbidden { .. } => FailureReason::Forbidden,
            CheckoutError::PromoNotFound { .. } => FailureReason::PromoNotFound,
            CheckoutError::PromoExhausted { .. } => FailureReason::PromoExhausted,
            CheckoutError::DispatchError { .. }
            | CheckoutError::StoreError { .. }
            | CheckoutError::ApiError(_) => FailureReason::DispatchFailed,
            CheckoutError::CsvError(_)
            | CheckoutError::IoError(_)
            | CheckoutError::ConfigError { .. }
            | CheckoutError::MissingConfigError { .. }
            | CheckoutError::InvalidConfigValueError { .. }
            | CheckoutError::ConfigValidationError { .. } => FailureReason::Misconfigured,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.reason() {
            FailureReason::Validation | FailureReason::Forbidden => ErrorCategory::Request,
            FailureReason::PromoNotFound | FailureReason::PromoExhausted => ErrorCategory::Promo,
            FailureReason::DispatchFailed => ErrorCategory::Upstream,
            FailureReason::Misconfigured => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request | ErrorCategory::Promo => ErrorSeverity::Low,
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// Configuration faults need an operator, not a user retry.
    pub fn needs_operator(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.reason() {
            FailureReason::Validation => "Fix the highlighted order fields and submit again",
            FailureReason::Forbidden => "Check the webhook secret sent by the client",
            FailureReason::PromoNotFound => "Check the promo code spelling (codes are case-sensitive)",
            FailureReason::PromoExhausted => "Submit the order without a promo code",
            FailureReason::DispatchFailed => "Retry the order later. If the promo code now reads as exhausted, ask an operator to check its counter",
            FailureReason::Misconfigured => {
                "Check credentials and the promo catalog in the deployment configuration"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CheckoutError::ValidationError { field, message } => {
                format!("Order field '{}' is invalid: {}", field, message)
            }
            CheckoutError::SerializationError(_) => "Order payload is malformed".to_string(),
            CheckoutError::Forbidden { .. } => "Request is not authorized".to_string(),
            CheckoutError::PromoNotFound { .. } => "Invalid promo code".to_string(),
            CheckoutError::PromoExhausted { .. } => "Promo code exhausted".to_string(),
            CheckoutError::DispatchError { .. }
            | CheckoutError::StoreError { .. }
            | CheckoutError::ApiError(_) => "Order could not be sent, please try again".to_string(),
            _ => "Server misconfiguration".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_status_codes_are_distinct() {
        let reasons = [
            FailureReason::Validation,
            FailureReason::Forbidden,
            FailureReason::PromoNotFound,
            FailureReason::PromoExhausted,
            FailureReason::DispatchFailed,
            FailureReason::Misconfigured,
        ];
        let mut codes: Vec<u16> = reasons.iter().map(|r| r.status_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), reasons.len());
    }

    #[test]
    fn test_store_failure_is_retryable_dispatch_failure() {
        let err = CheckoutError::store("connection reset");
        assert_eq!(err.reason(), FailureReason::DispatchFailed);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(!err.needs_operator());
    }

    #[test]
    fn test_missing_credentials_needs_operator() {
        let err = CheckoutError::MissingConfigError {
            field: "BOT_TOKEN".to_string(),
        };
        assert_eq!(err.reason(), FailureReason::Misconfigured);
        assert!(err.needs_operator());
        assert_eq!(err.user_friendly_message(), "Server misconfiguration");
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&FailureReason::PromoExhausted).unwrap();
        assert_eq!(json, "\"promo_exhausted\"");
        assert_eq!(FailureReason::PromoExhausted.as_str(), "promo_exhausted");
    }

    #[test]
    fn test_store_failure_suggestion_does_not_promise_unit_back() {
        // A lost DECR response leaves the unit consumed without a release.
        let err = CheckoutError::store("connection reset");
        assert_eq!(err.reason(), FailureReason::DispatchFailed);
        assert!(!err.recovery_suggestion().contains("no promo unit"));
        assert!(err.recovery_suggestion().contains("operator"));
    }
}
