//! Application configuration structures.

use reel_core::TelemetryConfig;
use reel_jobs::JobsConfig;
use serde::{Deserialize, Serialize};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Scheduler, scaling, job types and GPU catalog.
    #[serde(default)]
    pub jobs: JobsConfig,
}

impl AppConfig {
    /// Returns true when running in production.
    pub fn is_production(&self) -> bool {
        self.app.environment == "production"
    }
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Application name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Application version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Environment (development, staging, production).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// GPU instances assumed to be running at startup.
    #[serde(default)]
    pub initial_fleet_size: u32,
}

fn default_name() -> String {
    "reel-scheduler".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            environment: default_environment(),
            initial_fleet_size: 0,
        }
    }
}

/// Prometheus scrape endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to install the exporter.
    #[serde(default)]
    pub enabled: bool,
    /// Listen address for the scrape endpoint.
    #[serde(default = "default_metrics_addr")]
    pub listen_addr: String,
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9100".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_addr(),
        }
    }
}
