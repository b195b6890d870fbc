//! Host-level fields of a snapshot
//!
//! Hostname, node service uptime and node version are gathered once per
//! cycle, independent of any network.

use cellhub_core::cli::{commands, NodeCli};
use cellhub_core::parse::parse_node_version;
use std::ffi::OsStr;
use std::time::Duration;
use sysinfo::System;
use tracing::{debug, warn};

/// Local hostname, or `"unknown"` when it cannot be resolved
pub fn resolve_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().to_string(),
        Err(e) => {
            warn!(error = %e, "Failed to resolve hostname");
            "unknown".to_string()
        }
    }
}

/// Format a duration as `"{d}d {h}h {m}m {s}s"`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
}

fn name_matches(process_name: impl AsRef<OsStr>, wanted: &str) -> bool {
    process_name.as_ref() == OsStr::new(wanted)
}

/// Run time of the first process named exactly `service_name`
pub fn process_uptime(service_name: &str) -> Option<Duration> {
    let sys = System::new_all();
    sys.processes()
        .values()
        .find(|process| name_matches(process.name(), service_name))
        .map(|process| Duration::from_secs(process.run_time()))
}

/// Formatted uptime of the node service, or a not-found marker
pub fn service_uptime(service_name: &str) -> String {
    match process_uptime(service_name) {
        Some(uptime) => format_uptime(uptime),
        None => {
            debug!(service = %service_name, "Service process not found");
            format!("{} process not found", service_name)
        }
    }
}

/// Node version reported by the CLI, or an error marker
pub async fn node_version<C: NodeCli + ?Sized>(cli: &C) -> String {
    match cli.invoke(&commands::version()).await {
        Ok(output) => parse_node_version(&output).unwrap_or_else(|| "Error: empty output".to_string()),
        Err(e) => {
            warn!(error = %e, "Failed to read node version");
            format!("Error: {}", e)
        }
    }
}
