//! Cellframe Hub Collector Daemon
//!
//! Runs a telemetry collector that:
//! - Polls the local node CLI for network status, stake and rewards
//! - Writes a JSON snapshot artifact every cycle
//! - Exports the snapshot to the node's global database
//! - Serves a status page, health check and Prometheus metrics

use cellhub_core::{NodeCli, ProcessCli};
use cellhub_node::{
    host, init_metrics, HealthState, HubConfig, HubMetrics, HubPipeline, NodeAddressCache,
    Scheduler, StatusRoutes, StatusServer, Updater,
};
use cellhub_store::{GlobalDbStore, KvStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cellhub-node")]
#[command(about = "Cellframe node telemetry collector")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "hub.toml")]
    config: PathBuf,

    /// Snapshot artifact path (overrides config file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds between collection cycles (overrides config file)
    #[arg(short, long)]
    interval_secs: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Cellframe hub collector starting...");

    // Load configuration
    // Priority: CLI args > environment > hub.toml > defaults
    let config = HubConfig::load_or_default(&cli.config)
        .with_env_overrides()
        .with_overrides(cli.output, cli.interval_secs);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let node_cli: Arc<dyn NodeCli> = Arc::new(
        ProcessCli::new(&config.node.cli_path).with_timeout(config.node.cli_timeout()),
    );
    let store: Arc<dyn KvStore> = Arc::new(GlobalDbStore::new(node_cli.clone()));

    // Create shared state
    let hostname = host::resolve_hostname();
    let health_state = Arc::new(RwLock::new(HealthState::default()));
    let node_addr = NodeAddressCache::new();
    let cancel = CancellationToken::new();

    // Start status HTTP server (installs the metrics recorder)
    if config.status.enabled && !cli.once {
        let status_server = StatusServer::new(config.status.listen_addr())
            .map_err(|e| anyhow::anyhow!("Failed to create status server: {}", e))?;
        let routes = StatusRoutes {
            page_path: config.status.page_path.clone(),
            health_path: config.status.health_path.clone(),
            metrics_path: config.status.metrics_path.clone(),
        };
        let writer = cellhub_node::SnapshotWriter::new(&config.collector.output_path);
        let health_state_clone = health_state.clone();

        tokio::spawn(async move {
            if let Err(e) = status_server
                .start(routes, writer, health_state_clone)
                .await
            {
                error!(error = %e, "Status server failed");
            }
        });

        info!(port = config.status.port, "Status server started");
    }
    init_metrics();
    let hub_metrics = HubMetrics::new(&hostname);

    let pipeline = HubPipeline::from_config(
        &config,
        node_cli.clone(),
        store,
        node_addr,
        hub_metrics.clone(),
    );
    let scheduler = Scheduler::new(pipeline, config.collector.interval(), hub_metrics.clone())
        .with_health(health_state);

    if cli.once {
        return scheduler
            .run_once()
            .await
            .map(|report| info!(networks = report.networks, "Single cycle finished"))
            .map_err(|reason| anyhow::anyhow!("Collection cycle failed: {}", reason));
    }

    // Start updater
    if config.updater.enabled {
        let updater = Updater::new(config.updater.clone(), node_cli.clone())?;
        let cancel = cancel.clone();
        tokio::spawn(async move { updater.run(cancel).await });
        info!(manifest = %config.updater.remote_manifest_url, "Updater started");
    }

    info!("========================================");
    info!(
        interval_secs = config.collector.interval_secs,
        output = ?config.collector.output_path,
        group = %config.store.group,
        "Collector ready"
    );
    info!("Press Ctrl+C to shut down");

    // Run the scheduler until a shutdown signal cancels it
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        shutdown.cancel();
    });

    scheduler.run(cancel).await;

    // Graceful shutdown
    info!("Shutting down...");
    hub_metrics.mark_down();

    info!("Cellframe hub collector stopped");
    Ok(())
}
