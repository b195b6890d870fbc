//! Collection scheduler
//!
//! Runs collect → write → export as one task, then sleeps a fixed interval.
//! Cycles never overlap. A failing or panicking cycle is logged and the loop
//! carries on with the next tick; only cancellation stops it.

use crate::collector::Collector;
use crate::config::HubConfig;
use crate::exporter::{ExportSummary, Exporter};
use crate::metrics::{HealthState, HubMetrics};
use crate::network_config::NetworkConfigReader;
use crate::state::NodeAddressCache;
use crate::writer::SnapshotWriter;
use anyhow::Context;
use async_trait::async_trait;
use cellhub_core::cli::NodeCli;
use cellhub_store::KvStore;
use chrono::Local;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Result of one successful cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub networks: usize,
    pub export: ExportSummary,
}

/// Unit of work executed once per tick
#[async_trait]
pub trait CycleTask: Send + Sync {
    async fn run_cycle(&self) -> anyhow::Result<CycleReport>;
}

/// Collector → writer → exporter
pub struct HubPipeline {
    collector: Collector,
    writer: SnapshotWriter,
    exporter: Exporter,
}

impl HubPipeline {
    pub fn new(collector: Collector, writer: SnapshotWriter, exporter: Exporter) -> Self {
        Self {
            collector,
            writer,
            exporter,
        }
    }

    /// Wire a pipeline from configuration
    pub fn from_config(
        config: &HubConfig,
        cli: Arc<dyn NodeCli>,
        store: Arc<dyn KvStore>,
        node_addr: NodeAddressCache,
        metrics: HubMetrics,
    ) -> Self {
        let collector = Collector::new(
            cli,
            NetworkConfigReader::new(&config.node.network_config_dir),
            node_addr,
            metrics.clone(),
        )
        .with_service_name(&config.node.service_name);

        let writer = SnapshotWriter::new(&config.collector.output_path);
        let exporter = Exporter::new(store, config.store.to_store_config(), metrics);

        Self::new(collector, writer, exporter)
    }
}

#[async_trait]
impl CycleTask for HubPipeline {
    async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        let now = Local::now();
        let snapshot = self.collector.collect_at(now).await;
        let networks = snapshot.network_info.len();

        self.writer
            .write(&snapshot)
            .await
            .with_context(|| format!("failed to write snapshot to {}", self.writer.path().display()))?;

        // Export what consumers will read, not the in-memory copy
        let artifact = self
            .writer
            .read_value()
            .await
            .context("failed to read snapshot back")?;
        let export = self.exporter.export(&artifact, now.date_naive()).await;

        Ok(CycleReport { networks, export })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fixed-interval driver for a [`CycleTask`]
pub struct Scheduler<T: CycleTask> {
    task: T,
    interval: Duration,
    metrics: HubMetrics,
    health: Arc<RwLock<HealthState>>,
}

impl<T: CycleTask> Scheduler<T> {
    pub fn new(task: T, interval: Duration, metrics: HubMetrics) -> Self {
        Self {
            task,
            interval,
            metrics,
            health: Arc::new(RwLock::new(HealthState::default())),
        }
    }

    /// Share an existing health state (e.g. with the status server)
    pub fn with_health(mut self, health: Arc<RwLock<HealthState>>) -> Self {
        self.health = health;
        self
    }

    pub fn health(&self) -> Arc<RwLock<HealthState>> {
        self.health.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single cycle; errors and panics are caught and reported
    pub async fn run_once(&self) -> Result<CycleReport, String> {
        let start = Instant::now();

        let outcome = match AssertUnwindSafe(self.task.run_cycle()).catch_unwind().await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(payload) => Err(format!("cycle panicked: {}", panic_message(payload))),
        };

        let elapsed = start.elapsed();
        self.metrics.record_cycle(outcome.is_ok(), elapsed);
        self.health
            .write()
            .await
            .update(outcome.as_ref().map(|_| ()).map_err(Clone::clone));

        match &outcome {
            Ok(report) => info!(
                networks = report.networks,
                written = report.export.written,
                failed = report.export.failed,
                elapsed_ms = elapsed.as_millis() as u64,
                "Collection cycle completed"
            ),
            Err(reason) => error!(error = %reason, "Collection cycle failed"),
        }

        outcome
    }

    /// Loop until `cancel` fires: cycle, then sleep the interval
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Starting collection scheduler");

        while !cancel.is_cancelled() {
            let _ = self.run_once().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            debug!("Scheduler tick");
        }

        info!("Collection scheduler stopped");
    }
}
