use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "usd";
const DEFAULT_ORDER_NUMBER_PREFIX: &str = "ART";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Payment processor configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    /// Base URL of the payment processor API
    #[serde(default = "default_payment_api_url")]
    pub api_base_url: String,

    /// Secret API key used for intent creation
    #[serde(default)]
    pub secret_key: String,

    /// Shared secret for webhook signature verification.
    /// When absent the webhook endpoint reports itself as not configured.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Maximum accepted age of a signed webhook timestamp
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_payment_api_url(),
            secret_key: String::new(),
            webhook_secret: None,
            webhook_tolerance_secs: default_webhook_tolerance(),
        }
    }
}

/// Outbound email configuration (Resend-style HTTP API)
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Whether emails are sent at all; disabled installs log only
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_email_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Recipient of new-order admin notifications
    #[serde(default = "default_admin_address")]
    pub admin_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_email_api_url(),
            api_key: None,
            from_address: default_from_address(),
            admin_address: default_admin_address(),
        }
    }
}

/// Checkout policy configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Flat shipping fee in dollars applied to every validated cart
    #[serde(default = "default_shipping_flat_fee")]
    pub shipping_flat_fee: Decimal,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Prefix for generated order numbers (PFX-YYYYMMDD-NNNN)
    #[serde(default = "default_order_number_prefix")]
    pub order_number_prefix: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            shipping_flat_fee: default_shipping_flat_fee(),
            currency: default_currency(),
            order_number_prefix: default_order_number_prefix(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Database pool tuning
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default)]
    #[validate]
    pub payment: PaymentConfig,

    #[serde(default)]
    #[validate]
    pub email: EmailConfig,

    #[serde(default)]
    #[validate]
    pub checkout: CheckoutConfig,
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level().to_string(),
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            payment: PaymentConfig::default(),
            email: EmailConfig::default(),
            checkout: CheckoutConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_payment_api_url() -> String {
    "https://api.payments.example.com".to_string()
}

fn default_webhook_tolerance() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}

fn default_email_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_from_address() -> String {
    "orders@atelier.gallery".to_string()
}

fn default_admin_address() -> String {
    "admin@atelier.gallery".to_string()
}

fn default_shipping_flat_fee() -> Decimal {
    Decimal::new(500, 2) // 5.00
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_order_number_prefix() -> String {
    DEFAULT_ORDER_NUMBER_PREFIX.to_string()
}

/// Loads configuration from layered sources: `config/default.toml`, an
/// environment-specific file, then `ATELIER__`-prefixed environment
/// variables (double underscore separates nesting levels).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .add_source(File::from(Path::new(CONFIG_DIR).join("default")).required(false))
        .add_source(File::from(Path::new(CONFIG_DIR).join(&environment)).required(false))
        .add_source(Environment::with_prefix("ATELIER").separator("__"));

    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database_url", url)?;
    }

    let config: AppConfig = builder.build()?.try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    info!(
        environment = %config.environment,
        host = %config.host,
        port = config.port,
        "Configuration loaded"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        assert_eq!(cfg.checkout.shipping_flat_fee, dec!(5.00));
        assert_eq!(cfg.checkout.currency, "usd");
        assert_eq!(cfg.checkout.order_number_prefix, "ART");
        assert_eq!(cfg.payment.webhook_tolerance_secs, 300);
        assert!(cfg.payment.webhook_secret.is_none());
        assert!(!cfg.email.enabled);
    }
}
