//! Snapshot aggregation
//!
//! Drives the CLI, parsers, network configs and reward math across every
//! network the node reports and merges the results into one [`Snapshot`].
//! Every failure is contained to the smallest unit it affects: a field, a
//! network's enrichment, or a single network's record.

use crate::host;
use crate::metrics::HubMetrics;
use crate::network_config::{NetworkConfig, NetworkConfigReader};
use crate::state::NodeAddressCache;
use cellhub_core::cli::{commands, NodeCli};
use cellhub_core::parse::{parse_network_list, OutputParser, StakeInfo, TableLayoutV1};
use cellhub_core::rewards::{FeeAddrInfo, RewardLedger};
use cellhub_core::snapshot::{NetworkRecord, Snapshot};
use chrono::{DateTime, Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds one snapshot per call
pub struct Collector {
    cli: Arc<dyn NodeCli>,
    parser: Arc<dyn OutputParser>,
    configs: NetworkConfigReader,
    node_addr: NodeAddressCache,
    metrics: HubMetrics,
    hostname: String,
    service_name: String,
}

impl Collector {
    /// Create a collector using the current CLI table layout
    pub fn new(
        cli: Arc<dyn NodeCli>,
        configs: NetworkConfigReader,
        node_addr: NodeAddressCache,
        metrics: HubMetrics,
    ) -> Self {
        Self {
            cli,
            parser: Arc::new(TableLayoutV1),
            configs,
            node_addr,
            metrics,
            hostname: host::resolve_hostname(),
            service_name: "cellframe-node".to_string(),
        }
    }

    /// Parse CLI output with a different layout
    pub fn with_parser(mut self, parser: Arc<dyn OutputParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Collect a snapshot stamped with the current local time
    pub async fn collect(&self) -> Snapshot {
        self.collect_at(Local::now()).await
    }

    /// Collect a snapshot as of `now`
    pub async fn collect_at(&self, now: DateTime<Local>) -> Snapshot {
        let today = now.date_naive();

        let service_uptime = self.service_uptime().await;
        let node_version = host::node_version(self.cli.as_ref()).await;

        let networks = self.discover_networks().await;
        self.metrics.set_networks(networks.len());
        debug!(layout = self.parser.layout(), networks = ?networks, "Collecting networks");

        let mut records = Vec::with_capacity(networks.len());
        for network in networks {
            let record = self.collect_network(&network, today).await;
            records.push((network, record));
        }

        // Read after the network pass so a freshly detected address is used
        let mut snapshot = Snapshot::new(
            self.node_addr.get(),
            self.hostname.clone(),
            service_uptime,
            node_version,
            now,
        );
        for (network, record) in records {
            snapshot.insert_network(network, record);
        }

        info!(
            node_addr = %snapshot.node_addr,
            networks = snapshot.network_info.len(),
            "Snapshot collected"
        );
        snapshot
    }

    /// Network names reported by the node; empty when the call fails
    pub async fn discover_networks(&self) -> Vec<String> {
        match self.cli.invoke(&commands::net_list()).await {
            Ok(output) => parse_network_list(&output),
            Err(e) => {
                warn!(error = %e, "Failed to list networks");
                self.metrics.record_cli_failure("net_list");
                Vec::new()
            }
        }
    }

    /// Collect the record of a single network
    pub async fn collect_network(&self, network: &str, today: NaiveDate) -> NetworkRecord {
        let status = match self.cli.invoke(&commands::net_status(network)).await {
            Ok(output) => self.parser.parse_status(&output),
            Err(e) => {
                warn!(network = %network, error = %e, "Failed to fetch network status");
                self.metrics.record_cli_failure("net_status");
                return NetworkRecord::failed(e.to_string());
            }
        };

        if let Some(addr) = &status.node_addr {
            self.node_addr.update(addr);
        }
        let mut record = NetworkRecord::from_status(status);

        let config = match self.configs.read(network).await {
            Ok(config) => config,
            Err(e) => {
                warn!(network = %network, error = %e, "No network config, reporting status only");
                return record;
            }
        };

        let NetworkConfig {
            blocks_sign_cert,
            fee_addr,
        } = config;

        let Some(cert) = blocks_sign_cert else {
            warn!(network = %network, "No blocks-sign-cert, skipping stake and rewards");
            return record;
        };

        let stake = self.fetch_stake(network, &cert).await;
        if let Some(stake) = &stake {
            record.merge_stake(stake);
        }

        record.fee_addr_info = match fee_addr {
            Some(fee_addr) => {
                let ledger = self.build_ledger(&fee_addr, today).await;
                let stake = stake.unwrap_or_default();
                Some(FeeAddrInfo::compute(&fee_addr, &ledger, &stake, today))
            }
            None => {
                warn!(network = %network, "No fee_addr in network config");
                None
            }
        };

        record
    }

    async fn fetch_stake(&self, network: &str, cert: &str) -> Option<StakeInfo> {
        match self.cli.invoke(&commands::stake_keys(network, cert)).await {
            Ok(output) => Some(self.parser.parse_stake(&output)),
            Err(e) => {
                warn!(network = %network, cert = %cert, error = %e, "Failed to fetch stake");
                self.metrics.record_cli_failure("stake_keys");
                None
            }
        }
    }

    /// Reward ledger of `fee_addr`; history is fetched once for all days
    pub async fn build_ledger(&self, fee_addr: &str, today: NaiveDate) -> RewardLedger {
        let history = match self.cli.invoke(&commands::tx_history(fee_addr)).await {
            Ok(output) => output,
            Err(e) => {
                warn!(fee_addr = %fee_addr, error = %e, "Failed to fetch transaction history");
                self.metrics.record_cli_failure("tx_history");
                String::new()
            }
        };
        RewardLedger::from_history(&history, today)
    }

    async fn service_uptime(&self) -> String {
        let service_name = self.service_name.clone();
        match tokio::task::spawn_blocking(move || host::service_uptime(&service_name)).await {
            Ok(uptime) => uptime,
            Err(e) => {
                warn!(error = %e, "Service uptime lookup failed");
                format!("{} process not found", self.service_name)
            }
        }
    }
}
