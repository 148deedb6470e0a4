use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use breakwater::config::BreakwaterConfig;
use breakwater::http::{HttpServer, MiddlewareConfig};
use breakwater::ratelimit::{CleanupSweeper, LimiterRegistry, LogAlert, RouteRules, SystemClock};

/// Sliding-window rate limiting gateway.
#[derive(Parser, Debug)]
#[command(name = "breakwater", version, about = "Sliding-window rate limiting gateway")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Breakwater Rate Limiting Gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => BreakwaterConfig::from_file(path)?,
        None => BreakwaterConfig::default(),
    };
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    // Load route rules
    let rules = match &config.rate_limiting.rules_path {
        Some(path) => RouteRules::from_file(path)?,
        None => RouteRules::default(),
    };

    // Build the limiter registry
    let registry = Arc::new(LimiterRegistry::new(rules, Arc::new(SystemClock))?);
    info!("Rate limiter registry initialized");

    // Start the cleanup sweeper
    let sweeper = CleanupSweeper::new(
        Arc::clone(&registry),
        Duration::from_secs(config.rate_limiting.sweep_interval_secs),
    );
    sweeper.start();

    // Create and start the HTTP server
    let middleware = MiddlewareConfig {
        trust_proxy: config.rate_limiting.trust_proxy,
        alert: Some(Arc::new(LogAlert)),
        ..MiddlewareConfig::default()
    };
    let server = HttpServer::with_middleware(config.server.http_addr, registry, middleware);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    sweeper.stop();
    info!("Breakwater Rate Limiting Gateway stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
