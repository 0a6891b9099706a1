//! netprobe daemon - Main entry point
//!
//! Loads configuration, wires the shutdown signal and hands off to the
//! orchestrator.

mod config;
mod orchestrator;
mod probe;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "netprobe")]
#[command(about = "Network discovery and passive capture agent")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "netprobe.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single scan cycle and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("netprobe v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;
    let probe_id = config::ensure_probe_id(&mut config, &args.config);

    info!(
        probe = %probe_id,
        subnet = %config.scan.subnet,
        prefix = config.scan.prefix_len,
        interval_secs = config.scan.interval_secs,
        "Configuration loaded"
    );

    if args.scan_once {
        info!("Running a single scan cycle");
        return orchestrator::scan_once(&config, &probe_id).await;
    }

    // SIGINT or SIGTERM flips the shutdown flag; the orchestrator
    // finishes its current cycle and closes the capture session.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("Termination signal received, shutting down");
        let _ = shutdown_tx.send(true);
    });

    orchestrator::run(config, probe_id, shutdown_rx).await
}
