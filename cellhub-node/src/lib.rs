//! Cellframe Hub Collector Library
//!
//! Provides the components of the node telemetry collector:
//! - Configuration management
//! - Network config reading and host information
//! - Snapshot aggregation, artifact writing and store export
//! - Fixed-interval scheduler with a per-cycle catch-all boundary
//! - Prometheus metrics, health check and HTML status page
//! - Self-update from a remote manifest

pub mod collector;
pub mod config;
pub mod exporter;
pub mod host;
pub mod metrics;
pub mod network_config;
pub mod page;
pub mod scheduler;
pub mod state;
pub mod updater;
pub mod writer;

pub use collector::Collector;
pub use config::{
    CollectorSettings, ConfigError, HubConfig, NodeSettings, StatusSettings, StoreSettings,
    UpdateArtifact, UpdaterSettings,
};
pub use exporter::{flatten_snapshot, ExportSummary, Exporter};
pub use metrics::{init_metrics, HealthState, HubMetrics, StatusRoutes, StatusServer};
pub use network_config::{parse_network_config, NetworkConfig, NetworkConfigReader};
pub use page::render_status_page;
pub use scheduler::{CycleReport, CycleTask, HubPipeline, Scheduler};
pub use state::NodeAddressCache;
pub use updater::{is_newer, UpdateOutcome, Updater};
pub use writer::SnapshotWriter;
