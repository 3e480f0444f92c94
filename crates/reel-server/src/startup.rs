//! Server startup utilities.

use metrics_exporter_prometheus::PrometheusBuilder;
use reel_config::{AppConfig, MetricsConfig};
use reel_core::{ReelError, ReelResult};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

/// Prints the startup banner.
pub fn print_banner() {
    info!(
        r#"
    ____            __
   / __ \___  ___  / /
  / /_/ / _ \/ _ \/ /
 / _, _/  __/  __/ /
/_/ |_|\___/\___/_/   GPU job scheduler
    "#
    );
}

/// Prints the effective scheduler settings.
pub fn print_startup_info(config: &AppConfig) {
    let separator = "=".repeat(60);
    let jobs = &config.jobs;
    info!("{}", separator);
    info!("Environment:       {}", config.app.environment);
    info!("Heartbeat timeout: {}s", jobs.scheduler.heartbeat_timeout_secs);
    info!(
        "Auto-scaling:      {} (every {}s)",
        if jobs.scaling.enabled { "enabled" } else { "disabled" },
        jobs.scaling.evaluation_interval_secs
    );
    for class in jobs.gpu_catalog.classes() {
        info!(
            "GPU class:         {} ({}, {} GB, ${:.3}/h)",
            class.name, class.gpu_model, class.gpu_memory_gb, class.hourly_cost_usd
        );
    }
    if config.metrics.enabled {
        info!("Metrics:           http://{}/metrics", config.metrics.listen_addr);
    }
    info!("{}", separator);
}

/// Installs the Prometheus recorder and its scrape listener.
pub fn install_metrics_exporter(config: &MetricsConfig) -> ReelResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config.listen_addr.parse().map_err(|e| {
        ReelError::Configuration(format!("invalid metrics.listen_addr: {e}"))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ReelError::Internal(format!("Failed to install metrics exporter: {e}")))?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_banner_does_not_panic() {
        let _ = tracing_subscriber::fmt::try_init();
        print_banner();
    }

    #[test]
    fn test_print_startup_info_does_not_panic() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut config = AppConfig::default();
        config.metrics.enabled = true;
        print_startup_info(&config);
    }

    #[test]
    fn test_disabled_exporter_is_noop() {
        assert!(install_metrics_exporter(&MetricsConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_exporter_address() {
        let config = MetricsConfig {
            enabled: true,
            listen_addr: "not-an-address".to_string(),
        };
        assert!(matches!(
            install_metrics_exporter(&config),
            Err(ReelError::Configuration(_))
        ));
    }
}
