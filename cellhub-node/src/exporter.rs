//! Snapshot export to the shared key-value store
//!
//! The artifact is flattened into one entry per leaf field:
//!
//! - host fields: `<addr>_<field>`
//! - network fields: `<addr>_<network>_<path>` with path segments joined by `_`
//! - moving averages: `<...>_ma7_<date>` holds the value, `<...>_ma7_apy` the yield
//!
//! `<addr>` is the node address with `:` removed. Null fields are skipped and
//! reward history is limited to today and yesterday.

use crate::metrics::HubMetrics;
use cellhub_core::rewards::DAY_FORMAT;
use cellhub_core::snapshot::UNKNOWN_NODE_ADDR;
use cellhub_store::{KvStore, StoreConfig};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Top-level fields exported under `<addr>_<field>`
const HOST_FIELDS: [&str; 4] = ["hostname", "service_uptime", "node_version", "timestamp"];

/// Outcome of one export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: usize,
    pub failed: usize,
    /// Null leaves and pruned reward days
    pub skipped: usize,
}

/// Key segment with `,` removed and spaces replaced by `_`
pub fn sanitize_segment(segment: &str) -> String {
    segment.replace(',', "").replace(' ', "_")
}

/// Node address as used in keys
pub fn key_prefix(node_addr: &str) -> String {
    node_addr.replace(':', "")
}

/// Flattened store entries of a snapshot artifact
#[derive(Debug, Default)]
pub struct FlatEntries {
    pub entries: Vec<(String, String)>,
    pub skipped: usize,
}

impl FlatEntries {
    fn push(&mut self, key: String, value: &Value) {
        match scalar(value) {
            Some(text) => self.entries.push((key, text)),
            None => self.skipped += 1,
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn is_moving_average(map: &Map<String, Value>) -> bool {
    map.len() == 3 && map.contains_key("date") && map.contains_key("value") && map.contains_key("apy")
}

/// Flatten a snapshot artifact into store entries as of `today`
pub fn flatten_snapshot(snapshot: &Value, today: NaiveDate) -> FlatEntries {
    let mut flat = FlatEntries::default();
    let addr = key_prefix(snapshot["node_addr"].as_str().unwrap_or(UNKNOWN_NODE_ADDR));

    for field in HOST_FIELDS {
        flat.push(format!("{}_{}", addr, field), &snapshot[field]);
    }

    let kept_days = [
        today.format(DAY_FORMAT).to_string(),
        today
            .pred_opt()
            .map(|d| d.format(DAY_FORMAT).to_string())
            .unwrap_or_default(),
    ];

    if let Some(networks) = snapshot["network_info"].as_object() {
        for (network, record) in networks {
            let prefix = format!("{}_{}", addr, sanitize_segment(network));
            flatten_into(&mut flat, &prefix, record, &kept_days);
        }
    }

    flat
}

fn flatten_into(flat: &mut FlatEntries, prefix: &str, value: &Value, kept_days: &[String]) {
    let Some(map) = value.as_object() else {
        flat.push(prefix.to_string(), value);
        return;
    };

    for (field, child) in map {
        let key = format!("{}_{}", prefix, sanitize_segment(field));
        match child {
            Value::Object(inner) if field == "rewards" => {
                for (day, amount) in inner {
                    if kept_days.iter().any(|d| d == day) {
                        flat.push(format!("{}_{}", key, sanitize_segment(day)), amount);
                    } else {
                        flat.skipped += 1;
                    }
                }
            }
            Value::Object(inner) if is_moving_average(inner) => {
                let date = inner["date"].as_str().unwrap_or_default();
                flat.push(format!("{}_{}", key, sanitize_segment(date)), &inner["value"]);
                flat.push(format!("{}_apy", key), &inner["apy"]);
            }
            Value::Object(_) => flatten_into(flat, &key, child, kept_days),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    flatten_into(flat, &format!("{}_{}", key, i), item, kept_days);
                }
            }
            _ => flat.push(key, child),
        }
    }
}

/// Writes flattened snapshots to a [`KvStore`]
pub struct Exporter {
    store: Arc<dyn KvStore>,
    config: StoreConfig,
    metrics: HubMetrics,
}

impl Exporter {
    pub fn new(store: Arc<dyn KvStore>, config: StoreConfig, metrics: HubMetrics) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    /// Export the artifact; individual write failures are logged and counted
    pub async fn export(&self, snapshot: &Value, today: NaiveDate) -> ExportSummary {
        if !self.config.enabled {
            debug!("Store export disabled");
            return ExportSummary::default();
        }

        let node_addr = snapshot["node_addr"].as_str().unwrap_or_default();
        if node_addr.is_empty() || node_addr == UNKNOWN_NODE_ADDR {
            warn!("Node address not detected yet, skipping store export");
            return ExportSummary::default();
        }

        let flat = flatten_snapshot(snapshot, today);
        let mut summary = ExportSummary {
            skipped: flat.skipped,
            ..Default::default()
        };

        for (key, value) in &flat.entries {
            match self.store.write(&self.config.group, key, value).await {
                Ok(()) => summary.written += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "Store write failed");
                    summary.failed += 1;
                }
            }
        }

        self.metrics
            .record_store_writes(summary.written, summary.failed);
        info!(
            group = %self.config.group,
            written = summary.written,
            failed = summary.failed,
            skipped = summary.skipped,
            "Snapshot exported"
        );
        summary
    }
}
