use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::CodeBounds;
use crate::validation::CouponPolicy;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_TOP_COUPONS_LIMIT: usize = 5;
const DEFAULT_AFFILIATE_CODE_PREFIX: &str = "AFF";
const DEFAULT_CODE_MIN_LENGTH: usize = 3;
const DEFAULT_CODE_MAX_LENGTH: usize = 32;
const DEFAULT_PROTECTED_ADMIN_EMAIL: &str = "admin@example.com";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// JSON snapshot used to seed the in-memory store
    #[serde(default)]
    pub snapshot_path: Option<String>,

    /// Number of coupons listed in usage rankings
    #[serde(default = "default_top_coupons_limit")]
    #[validate(range(min = 1, max = 100))]
    pub top_coupons_limit: usize,

    /// Prefix of generated affiliate internal codes
    #[serde(default = "default_affiliate_code_prefix")]
    #[validate(length(min = 1, max = 8), custom = "validate_code_prefix")]
    pub affiliate_code_prefix: String,

    #[serde(default = "default_code_min_length")]
    #[validate(range(min = 1))]
    pub code_min_length: usize,

    #[serde(default = "default_code_max_length")]
    #[validate(range(max = 255))]
    pub code_max_length: usize,

    /// Reject coupons whose start date is after their end date
    #[serde(default)]
    pub enforce_date_order: bool,

    /// Freeze a coupon's code once it has been redeemed
    #[serde(default)]
    pub lock_used_codes: bool,

    /// Admin account that can never be deleted; blank disables the guard
    #[serde(default = "default_protected_admin_email")]
    pub protected_admin_email: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            snapshot_path: None,
            top_coupons_limit: default_top_coupons_limit(),
            affiliate_code_prefix: default_affiliate_code_prefix(),
            code_min_length: default_code_min_length(),
            code_max_length: default_code_max_length(),
            enforce_date_order: false,
            lock_used_codes: false,
            protected_admin_email: default_protected_admin_email(),
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn protected_admin_email(&self) -> Option<&str> {
        self.protected_admin_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn code_bounds(&self) -> CodeBounds {
        CodeBounds {
            min: self.code_min_length,
            max: self.code_max_length,
        }
    }

    /// Cross-field checks that `#[validate]` attributes cannot express.
    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.code_min_length > self.code_max_length {
            let mut err = ValidationError::new("code_length_bounds");
            err.message = Some(
                format!(
                    "code_min_length ({}) must not exceed code_max_length ({})",
                    self.code_min_length, self.code_max_length
                )
                .into(),
            );
            errors.add("code_min_length", err);
        }

        if self.environment.trim().is_empty() {
            let mut err = ValidationError::new("environment_required");
            err.message = Some("environment must not be empty".into());
            errors.add("environment", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<&AppConfig> for CouponPolicy {
    fn from(config: &AppConfig) -> Self {
        CouponPolicy {
            enforce_date_order: config.enforce_date_order,
            lock_used_codes: config.lock_used_codes,
            code_bounds: config.code_bounds(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_top_coupons_limit() -> usize {
    DEFAULT_TOP_COUPONS_LIMIT
}

fn default_protected_admin_email() -> Option<String> {
    Some(DEFAULT_PROTECTED_ADMIN_EMAIL.to_string())
}

fn default_affiliate_code_prefix() -> String {
    DEFAULT_AFFILIATE_CODE_PREFIX.to_string()
}

fn default_code_min_length() -> usize {
    DEFAULT_CODE_MIN_LENGTH
}

fn default_code_max_length() -> usize {
    DEFAULT_CODE_MAX_LENGTH
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_code_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("affiliate_code_prefix");
        err.message = Some("affiliate_code_prefix must be ASCII letters or digits".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("coupon_admin={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    // Logs go to stderr so CLI output on stdout stays machine-readable.
    if json {
        let _ = fmt()
            .with_env_filter(filter_directive)
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter_directive)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit configuration directory.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let profile = |name: &str| -> PathBuf { config_dir.join(name) };

    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(profile("default")).required(false))
        .add_source(File::from(profile(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
