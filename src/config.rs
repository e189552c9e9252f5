use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";

/// Processing constants supplied by the settings collaborator.
///
/// These are treated as immutable inputs per calculation, never as hidden
/// defaults baked into a service: the materializer and the aggregator read
/// them from here on every call.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ProcessingConstants {
    /// Fraction of intake weight converted to juice.
    #[serde(default = "default_yield_rate")]
    pub yield_rate: Decimal,

    /// Liters per filled pouch.
    #[serde(default = "default_pouch_liters")]
    pub pouch_liters: Decimal,

    /// Number of pouches packed into one box.
    #[serde(default = "default_pouches_per_box")]
    #[validate(range(min = 1))]
    pub pouches_per_box: i32,

    /// Hour (local facility time) at which one production day rolls into
    /// the next. Work before this hour belongs to the previous day.
    #[serde(default = "default_cutoff_hour")]
    #[validate(range(max = 23))]
    pub production_day_cutoff_hour: u32,
}

fn default_yield_rate() -> Decimal {
    dec!(0.65)
}
fn default_pouch_liters() -> Decimal {
    dec!(3)
}
fn default_pouches_per_box() -> i32 {
    8
}
fn default_cutoff_hour() -> u32 {
    6
}

impl Default for ProcessingConstants {
    fn default() -> Self {
        Self {
            yield_rate: default_yield_rate(),
            pouch_liters: default_pouch_liters(),
            pouches_per_box: default_pouches_per_box(),
            production_day_cutoff_hour: default_cutoff_hour(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Environment name (development, test, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level filter passed to the tracing subscriber
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Run embedded migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Database pool tuning
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, max = 100))]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// TTL for the best-effort notification idempotency cache, in seconds
    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,

    /// Juice-processing constants
    #[serde(default)]
    #[validate]
    pub processing: ProcessingConstants,
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
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_idempotency_ttl_secs() -> u64 {
    120
}

impl AppConfig {
    /// Construct a config programmatically, mainly for tests.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
            processing: ProcessingConstants::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Loads configuration from layered files plus `PRESSHOUSE_` environment
/// overrides (e.g. `PRESSHOUSE_DATABASE_URL`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = std::env::var("PRESSHOUSE_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    let base = Path::new(CONFIG_DIR).join("default");
    builder = builder.add_source(File::with_name(base.to_str().unwrap()).required(false));

    let env_file = Path::new(CONFIG_DIR).join(&environment);
    builder = builder.add_source(File::with_name(env_file.to_str().unwrap()).required(false));

    builder = builder.add_source(Environment::with_prefix("PRESSHOUSE").separator("__"));

    let config: AppConfig = builder.build()?.try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    info!(
        environment = %config.environment,
        cutoff_hour = config.processing.production_day_cutoff_hour,
        "Configuration loaded"
    );

    Ok(config)
}
