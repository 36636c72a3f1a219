//! Udpflow - Flow-Tracking Bidirectional UDP Relay
//!
//! This is the main entry point for the Udpflow application.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use udpflow::config::{load_config, Config, RelayConfig};
use udpflow::relay::run_relay;

/// Udpflow - Flow-tracking bidirectional UDP relay
#[derive(Parser, Debug)]
#[command(name = "udpflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Local UDP port to listen on
    #[arg(short = 'p', long)]
    local_port: Option<u16>,

    /// Upstream host all traffic is forwarded to
    #[arg(long)]
    upstream_host: Option<String>,

    /// Upstream port all traffic is forwarded to
    #[arg(long)]
    upstream_port: Option<u16>,

    /// Seconds of upstream silence before a flow expires
    #[arg(long)]
    flow_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    // Assemble configuration from file and/or flags
    let config = build_config(&args)?;

    info!("Udpflow v{}", udpflow::VERSION);
    info!("Listening port: {}", config.relay.local_port);
    info!("Upstream endpoint: {}", config.relay.upstream_endpoint());

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C and termination signals (cross-platform)
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate())
                .expect("Failed to setup SIGTERM handler");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            // On Windows, only handle Ctrl+C
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down...");
        }

        let _ = shutdown_tx_clone.send(true);
    });

    // Run the relay
    run_relay(config, shutdown_rx).await
}

/// Build the configuration from a file, CLI flags, or both
///
/// Flags override values loaded from the file; without a file, the three
/// endpoint flags are required.
fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let local_port = args
                .local_port
                .with_context(|| "--local-port is required without --config")?;
            let upstream_host = args
                .upstream_host
                .clone()
                .with_context(|| "--upstream-host is required without --config")?;
            let upstream_port = args
                .upstream_port
                .with_context(|| "--upstream-port is required without --config")?;
            Config {
                relay: RelayConfig::new(local_port, upstream_host, upstream_port),
            }
        }
    };

    if let Some(port) = args.local_port {
        config.relay.local_port = port;
    }
    if let Some(host) = &args.upstream_host {
        config.relay.upstream_host = host.clone();
    }
    if let Some(port) = args.upstream_port {
        config.relay.upstream_port = port;
    }
    if let Some(secs) = args.flow_timeout {
        config.relay.flow_timeout = secs;
    }

    Ok(config)
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
