//! Telemetry server CLI - ingest vehicle-state samples streamed by a driving simulation.

use anyhow::{Context, Result};
use clap::Parser;
use sim_telemetry::{
    config::Config,
    metrics::start_metrics_server,
    server::TelemetryServer,
    sink::{ConsoleSink, NullSink, TelemetrySink},
    stats::IngestStats,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Telemetry server - ingest vehicle-state samples from a driving simulation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for telemetry connections
    #[arg(short, long, env = "TELEMETRY_PORT")]
    port: Option<u16>,

    /// Address to bind the listener to
    #[arg(long, env = "TELEMETRY_BIND")]
    bind: Option<String>,

    /// Print statistics every N seconds (0 disables)
    #[arg(short, long)]
    stats_interval: Option<u64>,

    /// Suppress per-sample console output
    #[arg(short, long)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable the Prometheus metrics HTTP endpoint
    #[arg(long)]
    metrics: bool,

    /// Port for the Prometheus metrics HTTP endpoint
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = Config::load()?;
    config.validate()?;

    // Command-line flags override file values
    let bind = args.bind.unwrap_or(config.bind);
    let port = args.port.unwrap_or(config.port);
    let stats_interval = args.stats_interval.unwrap_or(config.stats_interval);
    let quiet = args.quiet || config.quiet;
    let metrics_enabled = args.metrics || config.metrics_enabled;
    let metrics_port = args.metrics_port.unwrap_or(config.metrics_port);

    let ip: IpAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;
    let addr = SocketAddr::new(ip, port);

    info!("Telemetry server starting...");
    info!("Bind address: {}", addr);

    // Shared across all connection handlers
    let stats = Arc::new(IngestStats::new());
    let sink: Arc<dyn TelemetrySink> = if quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(ConsoleSink)
    };

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // Start stats printer
    if stats_interval > 0 {
        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                println!("\n{}", stats_clone.summary());
            }
        });
    }

    // Start metrics endpoint
    if metrics_enabled {
        let metrics_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(metrics_port, metrics_stats).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Bind errors are fatal and exit non-zero
    let server = TelemetryServer::bind(addr).await?;

    tokio::select! {
        // The accept loop only returns on a fatal accept error
        result = server.serve(sink, Arc::clone(&stats)) => {
            result?;
        }
        _ = shutdown_rx.changed() => {}
    }

    // Print final statistics
    println!("\n\nFINAL STATISTICS");
    println!("{}", stats.summary());

    Ok(())
}
