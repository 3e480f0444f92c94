//! # Reel Server
//!
//! Runs the GPU job scheduler until Ctrl+C or SIGTERM.

use reel_config::ConfigLoader;
use reel_core::{init_telemetry, ReelResult};
use reel_jobs::register_metrics;
use reel_server::app::Application;
use reel_server::startup::{
    install_metrics_exporter, print_banner, print_startup_info, shutdown_signal,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Telemetry may not be up yet when configuration fails.
        eprintln!("Application error: {e}");
        error!(code = e.error_code(), "Application error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run() -> ReelResult<()> {
    let config_loader = ConfigLoader::from_default_location()?;
    let config = config_loader.get();

    init_telemetry(&config.telemetry)?;
    print_banner();
    info!("Starting {} v{}", config.app.name, config.app.version);

    install_metrics_exporter(&config.metrics)?;
    register_metrics();
    print_startup_info(&config);

    let app = Application::start(&config);

    shutdown_signal().await;

    let forwarded = app.shutdown().await;
    info!(forwarded, "Server shutdown complete");
    Ok(())
}
