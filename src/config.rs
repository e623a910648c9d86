use std::env;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::{error, info};

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Root depot container slot id in the legacy OT depot layout.
const DEFAULT_DEPOT_ROOT: i32 = 101;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,

    /// Shared HS256 secret with the session layer.
    pub jwt_secret: String,

    #[serde(default)]
    pub auto_migrate: bool,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Payment gateway REST base URL.
    pub gateway_base_url: String,
    pub gateway_access_token: String,
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
    /// When set, inbound webhook signatures are verified with this secret.
    #[serde(default)]
    pub gateway_webhook_secret: Option<String>,

    #[serde(default = "default_currency")]
    pub marketplace_currency: String,

    /// Pending orders older than this are cancelled by the expiry sweep.
    #[serde(default = "default_pending_expiry_hours")]
    pub pending_order_expiry_hours: i64,
    #[serde(default = "default_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,

    /// Parent container slot used when a character's depot is empty.
    #[serde(default = "default_depot_root")]
    pub depot_root_container: i32,

    /// Comma-separated origin list; unset means permissive CORS in
    /// development only.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_gateway_timeout_secs() -> u64 {
    5
}
fn default_currency() -> String {
    "BRL".to_string()
}
fn default_pending_expiry_hours() -> i64 {
    48
}
fn default_sweep_interval_secs() -> u64 {
    3600
}
fn default_depot_root() -> i32 {
    DEFAULT_DEPOT_ROOT
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling.
    pub fn new(database_url: String, jwt_secret: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host: "127.0.0.1".to_string(),
            port,
            environment,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            jwt_secret,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            gateway_base_url: "https://api.gateway.invalid".to_string(),
            gateway_access_token: "test-token".to_string(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            gateway_webhook_secret: None,
            marketplace_currency: default_currency(),
            pending_order_expiry_hours: default_pending_expiry_hours(),
            expiry_sweep_interval_secs: default_sweep_interval_secs(),
            depot_root_container: default_depot_root(),
            cors_allowed_origins: None,
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 32 {
            return Err(ConfigError::Message(
                "jwt_secret must be at least 32 characters".into(),
            ));
        }
        if self.pending_order_expiry_hours <= 0 {
            return Err(ConfigError::Message(
                "pending_order_expiry_hours must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] ConfigError),
}

/// Loads application configuration.
///
/// Layers, later sources winning:
/// 1. `config/default.toml`
/// 2. `config/{env}.toml` (env from `RUN_ENV` / `APP_ENV`)
/// 3. `APP__*` environment variables
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://otmarket.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("gateway_base_url", "https://api.mercadopago.com")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Clear message before deserialization for the one secret with no default.
    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to the session layer's secret.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured".into(),
        )));
    }
    if config.get_string("gateway_access_token").is_err() {
        error!("Gateway credentials missing. Set APP__GATEWAY_ACCESS_TOKEN.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "gateway_access_token is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes tracing using the configured log level as the default filter.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("otmarket_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}
