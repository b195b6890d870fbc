//! Prometheus metrics and status HTTP server for the hub collector
//!
//! Exposes cycle outcomes, CLI and store failures, the status page and a
//! health check.

use crate::page::render_status_page;
use crate::writer::SnapshotWriter;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Metric names as constants
pub mod names {
    // Cycle metrics
    pub const CYCLES_TOTAL: &str = "cellhub_cycles_total";
    pub const CYCLE_FAILURES: &str = "cellhub_cycle_failures_total";
    pub const CYCLE_DURATION: &str = "cellhub_cycle_duration_seconds";
    pub const LAST_CYCLE_TIME: &str = "cellhub_last_cycle_timestamp_seconds";

    // Node metrics
    pub const NETWORKS_DISCOVERED: &str = "cellhub_networks_discovered";
    pub const CLI_FAILURES: &str = "cellhub_cli_failures_total";

    // Store metrics
    pub const STORE_WRITES: &str = "cellhub_store_writes_total";
    pub const STORE_WRITE_FAILURES: &str = "cellhub_store_write_failures_total";

    // Health metrics
    pub const COLLECTOR_UP: &str = "cellhub_collector_up";
    pub const COLLECTOR_START_TIME: &str = "cellhub_collector_start_time_seconds";
}

/// Initialize metric descriptions
pub fn init_metrics() {
    // Cycle metrics
    describe_counter!(names::CYCLES_TOTAL, "Total number of collection cycles run");
    describe_counter!(
        names::CYCLE_FAILURES,
        "Number of collection cycles that failed or panicked"
    );
    describe_histogram!(
        names::CYCLE_DURATION,
        "Collection cycle duration in seconds"
    );
    describe_gauge!(
        names::LAST_CYCLE_TIME,
        "Unix timestamp of the last completed cycle"
    );

    // Node metrics
    describe_gauge!(
        names::NETWORKS_DISCOVERED,
        "Number of networks reported by the node in the last cycle"
    );
    describe_counter!(names::CLI_FAILURES, "Number of failed node CLI calls");

    // Store metrics
    describe_counter!(names::STORE_WRITES, "Number of successful store writes");
    describe_counter!(names::STORE_WRITE_FAILURES, "Number of failed store writes");

    // Health metrics
    describe_gauge!(
        names::COLLECTOR_UP,
        "Whether the collector is up (1) or down (0)"
    );
    describe_gauge!(
        names::COLLECTOR_START_TIME,
        "Unix timestamp when the collector started"
    );
}

fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Metrics recorder for collector statistics
#[derive(Clone)]
pub struct HubMetrics {
    host: String,
}

impl HubMetrics {
    /// Create a new metrics recorder labelled with `host`
    pub fn new(host: impl Into<String>) -> Self {
        let metrics = Self { host: host.into() };

        gauge!(names::COLLECTOR_UP, "host" => metrics.host.clone()).set(1.0);
        gauge!(names::COLLECTOR_START_TIME, "host" => metrics.host.clone()).set(unix_now());

        metrics
    }

    /// Record a finished cycle
    pub fn record_cycle(&self, success: bool, duration: std::time::Duration) {
        counter!(names::CYCLES_TOTAL, "host" => self.host.clone()).increment(1);
        if !success {
            counter!(names::CYCLE_FAILURES, "host" => self.host.clone()).increment(1);
        }
        histogram!(names::CYCLE_DURATION, "host" => self.host.clone())
            .record(duration.as_secs_f64());
        gauge!(names::LAST_CYCLE_TIME, "host" => self.host.clone()).set(unix_now());
    }

    /// Record a failed CLI call
    pub fn record_cli_failure(&self, command: &'static str) {
        let labels = [("host", self.host.clone()), ("command", command.to_string())];
        counter!(names::CLI_FAILURES, &labels).increment(1);
    }

    /// Update the discovered network count
    pub fn set_networks(&self, count: usize) {
        gauge!(names::NETWORKS_DISCOVERED, "host" => self.host.clone()).set(count as f64);
    }

    /// Record the outcome of one export
    pub fn record_store_writes(&self, written: usize, failed: usize) {
        counter!(names::STORE_WRITES, "host" => self.host.clone()).increment(written as u64);
        counter!(names::STORE_WRITE_FAILURES, "host" => self.host.clone()).increment(failed as u64);
    }

    /// Mark collector as down
    pub fn mark_down(&self) {
        gauge!(names::COLLECTOR_UP, "host" => self.host.clone()).set(0.0);
    }
}

/// Routes served by [`StatusServer`]
#[derive(Debug, Clone)]
pub struct StatusRoutes {
    pub page_path: String,
    pub health_path: String,
    pub metrics_path: String,
}

/// HTTP server for the status page, health check and metrics
pub struct StatusServer {
    handle: PrometheusHandle,
    addr: SocketAddr,
}

impl StatusServer {
    /// Create a new status server and install the Prometheus recorder
    pub fn new(addr: SocketAddr) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let builder = PrometheusBuilder::new();
        let handle = builder.install_recorder()?;

        Ok(Self { handle, addr })
    }

    /// Start the HTTP server
    pub async fn start(
        self,
        routes: StatusRoutes,
        writer: SnapshotWriter,
        health_state: Arc<RwLock<HealthState>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        use axum::{http::StatusCode, response::Html, response::IntoResponse, routing::get, Router};

        let handle = self.handle;

        // Status page handler: renders whatever artifact is on disk
        let page_handler = move || {
            let writer = writer.clone();
            async move {
                let snapshot = match writer.read_value().await {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(error = %e, "No snapshot available for status page");
                        None
                    }
                };
                Html(render_status_page(snapshot.as_ref()))
            }
        };

        // Health check handler
        let health_handler = {
            let state = health_state.clone();
            move || {
                let state = state.clone();
                async move {
                    let health = state.read().await;
                    if health.is_healthy {
                        (StatusCode::OK, "OK").into_response()
                    } else {
                        (StatusCode::SERVICE_UNAVAILABLE, "UNHEALTHY").into_response()
                    }
                }
            }
        };

        // Metrics handler
        let metrics_handler = move || {
            let handle = handle.clone();
            async move { handle.render() }
        };

        let app = Router::new()
            .route(&routes.page_path, get(page_handler))
            .route(&routes.health_path, get(health_handler))
            .route(&routes.metrics_path, get(metrics_handler));

        info!(addr = %self.addr, page = %routes.page_path, "Starting status server");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Health state of the collector
#[derive(Debug, Clone)]
pub struct HealthState {
    pub is_healthy: bool,
    pub cycles_run: u64,
    pub last_error: Option<String>,
    pub last_cycle: Option<std::time::Instant>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            is_healthy: true,
            cycles_run: 0,
            last_error: None,
            last_cycle: None,
        }
    }
}

impl HealthState {
    /// Record the outcome of a cycle
    pub fn update(&mut self, outcome: Result<(), String>) {
        self.cycles_run += 1;
        self.last_cycle = Some(std::time::Instant::now());
        match outcome {
            Ok(()) => {
                self.is_healthy = true;
                self.last_error = None;
            }
            Err(reason) => {
                self.is_healthy = false;
                self.last_error = Some(reason);
            }
        }
    }
}
