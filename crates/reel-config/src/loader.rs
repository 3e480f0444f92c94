//! Configuration loader with layered sources.

use crate::AppConfig;
use config::{Config, ConfigError, Environment, File};
use reel_core::ReelError;
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable selecting the environment overlay file.
pub const ENVIRONMENT_VAR: &str = "REEL_ENVIRONMENT";

/// Loads and validates the layered configuration once at startup.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: AppConfig,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Uncommitted local overrides
    /// 4. Environment variables with `REEL_` prefix (`REEL_JOBS__SCALING__ENABLED=true`)
    pub fn new(config_dir: impl Into<String>) -> Result<Self, ReelError> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        Self::with_environment(config_dir, environment)
    }

    /// Creates a loader for an explicit environment name.
    pub fn with_environment(
        config_dir: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self, ReelError> {
        let config_dir = config_dir.into();
        let environment = environment.into();
        let config = Self::load_config(&config_dir, &environment)?;
        Ok(Self { config })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, ReelError> {
        Self::new("./config")
    }

    /// Returns the loaded configuration.
    pub fn get(&self) -> AppConfig {
        self.config.clone()
    }

    fn load_config(config_dir: &str, environment: &str) -> Result<AppConfig, ReelError> {
        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        let layers = [
            format!("{config_dir}/default.toml"),
            format!("{config_dir}/{environment}.toml"),
            format!("{config_dir}/local.toml"),
        ];
        for path in &layers {
            if Path::new(path).exists() {
                debug!("Loading config layer from: {}", path);
                builder = builder.add_source(File::with_name(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("REEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_reel_error)?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_reel_error)?;

        if app_config.app.environment != environment {
            debug!(
                "Environment {} overrides app.environment {}",
                environment, app_config.app.environment
            );
            app_config.app.environment = environment.to_string();
        }

        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration.
    fn validate_config(config: &AppConfig) -> Result<(), ReelError> {
        config.jobs.validate().map_err(ReelError::from)?;

        if config.app.name.trim().is_empty() {
            return Err(ReelError::Configuration("app.name must not be empty".to_string()));
        }

        if config.metrics.enabled
            && config.metrics.listen_addr.parse::<std::net::SocketAddr>().is_err()
        {
            return Err(ReelError::Configuration(format!(
                "metrics.listen_addr is not a socket address: {}",
                config.metrics.listen_addr
            )));
        }

        if config.is_production() && !config.jobs.scaling.enabled {
            warn!("Auto-scaling is disabled in production; the GPU fleet will not follow demand");
        }

        Ok(())
    }
}

fn config_error_to_reel_error(err: ConfigError) -> ReelError {
    ReelError::Configuration(err.to_string())
}
