//! Snapshot model
//!
//! One [`Snapshot`] is built per collection cycle and fully replaces the
//! previous artifact. Absent values serialize as `null`.

use crate::parse::{NetworkStatus, StakeInfo};
use crate::rewards::FeeAddrInfo;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node address reported before any status output has carried one
pub const UNKNOWN_NODE_ADDR: &str = "unknown";

/// Format of [`Snapshot::timestamp`] (local time)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sovereign (delegation) settings of a stake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SovereignInfo {
    pub sovereign_addr: String,
    pub sovereign_tax: String,
}

/// Everything collected for one network in one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub our_node_state: Option<String>,
    pub network_state: Option<String>,
    pub main_status: Option<String>,
    pub sync_percentage: Option<String>,
    pub block_height: Option<String>,
    pub stake_value: Option<String>,
    pub sovereign_addr_info: Option<SovereignInfo>,
    pub fee_addr_info: Option<FeeAddrInfo>,
    /// Set when the network's status could not be fetched
    pub error: Option<String>,
}

impl NetworkRecord {
    /// Status-only record
    pub fn from_status(status: NetworkStatus) -> Self {
        Self {
            our_node_state: status.our_node_state,
            network_state: status.network_state,
            main_status: status.main_status,
            sync_percentage: status.sync_percentage,
            block_height: status.block_height,
            ..Default::default()
        }
    }

    /// Placeholder for a network whose status fetch failed
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Attach stake fields
    pub fn merge_stake(&mut self, stake: &StakeInfo) {
        self.stake_value = Some(stake.stake_value.clone());
        self.sovereign_addr_info = Some(SovereignInfo {
            sovereign_addr: stake.sovereign_addr.clone(),
            sovereign_tax: stake.sovereign_tax.clone(),
        });
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Cycle-consistent aggregate of host and per-network data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub node_addr: String,
    pub hostname: String,
    pub service_uptime: String,
    pub node_version: String,
    pub timestamp: String,
    pub network_info: BTreeMap<String, NetworkRecord>,
}

impl Snapshot {
    /// Empty snapshot stamped with `now`
    pub fn new(
        node_addr: Option<String>,
        hostname: impl Into<String>,
        service_uptime: impl Into<String>,
        node_version: impl Into<String>,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            node_addr: node_addr.unwrap_or_else(|| UNKNOWN_NODE_ADDR.to_string()),
            hostname: hostname.into(),
            service_uptime: service_uptime.into(),
            node_version: node_version.into(),
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            network_info: BTreeMap::new(),
        }
    }

    /// Whether a node address has been detected
    pub fn has_node_addr(&self) -> bool {
        self.node_addr != UNKNOWN_NODE_ADDR && !self.node_addr.is_empty()
    }

    pub fn network(&self, name: &str) -> Option<&NetworkRecord> {
        self.network_info.get(name)
    }

    pub fn insert_network(&mut self, name: impl Into<String>, record: NetworkRecord) {
        self.network_info.insert(name.into(), record);
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_snapshot_defaults_to_unknown_addr() {
        let snapshot = Snapshot::new(None, "host", "1d 0h 0m 0s", "5.3-360", now());
        assert_eq!(snapshot.node_addr, UNKNOWN_NODE_ADDR);
        assert!(!snapshot.has_node_addr());
        assert_eq!(snapshot.timestamp, "2026-10-19 08:30:00");
    }

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let mut snapshot = Snapshot::new(Some("AA::BB".into()), "host", "up", "v", now());
        snapshot.insert_network(
            "net-b",
            NetworkRecord::from_status(NetworkStatus {
                main_status: Some("synced".into()),
                ..Default::default()
            }),
        );

        let value: serde_json::Value =
            serde_json::from_str(&snapshot.to_json_pretty().unwrap()).unwrap();
        let record = &value["network_info"]["net-b"];
        assert_eq!(record["main_status"], "synced");
        assert!(record["stake_value"].is_null());
        assert!(record["fee_addr_info"].is_null());
        assert!(record["error"].is_null());
    }

    #[test]
    fn test_merge_stake() {
        let mut record = NetworkRecord::default();
        record.merge_stake(&StakeInfo::default());
        assert_eq!(record.stake_value.as_deref(), Some("0"));
        assert_eq!(
            record.sovereign_addr_info.as_ref().map(|s| s.sovereign_addr.as_str()),
            Some("N/A")
        );
    }

    #[test]
    fn test_failed_record() {
        let record = NetworkRecord::failed("CLI timed out after 120s");
        assert!(record.is_failed());
        assert!(record.main_status.is_none());
    }
}
