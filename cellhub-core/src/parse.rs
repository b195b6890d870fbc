//! Parsers for node CLI output
//!
//! All parsers are pure and never fail: unknown lines are ignored and a
//! field that cannot be located is simply absent from the result.

use serde::{Deserialize, Serialize};

/// Header token printed by `net list` before the network names
const NETWORK_LIST_HEADER: &str = "networks:";

/// Status of one network as reported by `net get status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub our_node_state: Option<String>,
    pub network_state: Option<String>,
    pub main_status: Option<String>,
    pub block_height: Option<String>,
    pub sync_percentage: Option<String>,
    /// Our node address, when the output carries `current_addr:`
    pub node_addr: Option<String>,
}

/// Stake registered for our signing certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeInfo {
    pub stake_value: String,
    pub sovereign_addr: String,
    pub sovereign_tax: String,
}

impl Default for StakeInfo {
    fn default() -> Self {
        Self {
            stake_value: "0".to_string(),
            sovereign_addr: "N/A".to_string(),
            sovereign_tax: "0".to_string(),
        }
    }
}

/// Parser for one CLI output layout.
///
/// The status table is read positionally, so a change in the CLI's layout
/// gets a new implementation rather than changes in the collector.
pub trait OutputParser: Send + Sync {
    /// Layout identifier, for logs
    fn layout(&self) -> &'static str;

    /// Parse `net get status` output
    fn parse_status(&self, text: &str) -> NetworkStatus;

    /// Parse `srv_stake list keys` output
    fn parse_stake(&self, text: &str) -> StakeInfo;
}

/// Table layout of the current node CLI.
///
/// After the `main:` line, the chain status sits at +1, the block height at
/// +3 and the sync percentage at +4.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLayoutV1;

impl TableLayoutV1 {
    const MAIN_STATUS_OFFSET: usize = 1;
    const BLOCK_HEIGHT_OFFSET: usize = 3;
    const SYNC_PERCENT_OFFSET: usize = 4;
}

impl OutputParser for TableLayoutV1 {
    fn layout(&self) -> &'static str {
        "table-v1"
    }

    fn parse_status(&self, text: &str) -> NetworkStatus {
        let lines: Vec<&str> = text.lines().collect();
        let at = |i: usize| lines.get(i).and_then(|line| column_value(line));

        let mut status = NetworkStatus::default();
        for (i, line) in lines.iter().enumerate() {
            if line.contains("current:") && line.contains("NET_STATE") {
                status.our_node_state = column_value(line);
            } else if line.contains("target:") && line.contains("NET_STATE") {
                status.network_state = column_value(line);
            } else if line.contains("main:") {
                status.main_status = at(i + Self::MAIN_STATUS_OFFSET);
                status.block_height = at(i + Self::BLOCK_HEIGHT_OFFSET);
                status.sync_percentage = at(i + Self::SYNC_PERCENT_OFFSET);
            } else if line.contains("current_addr:") {
                status.node_addr = value_after_key(line).filter(|addr| !addr.is_empty());
            }
        }
        status
    }

    fn parse_stake(&self, text: &str) -> StakeInfo {
        let mut stake = StakeInfo::default();
        for line in text.lines() {
            let slot = if line.contains("stake_value:") {
                &mut stake.stake_value
            } else if line.contains("sovereign_addr:") {
                &mut stake.sovereign_addr
            } else if line.contains("sovereign_tax:") {
                &mut stake.sovereign_tax
            } else {
                continue;
            };
            if let Some(value) = value_after_key(line) {
                *slot = value;
            }
        }
        stake
    }
}

/// Text between the first and second `:` of a table row, trimmed
fn column_value(line: &str) -> Option<String> {
    line.split(':').nth(1).map(|v| v.trim().to_string())
}

/// Everything after the first `:`, trimmed
fn value_after_key(line: &str) -> Option<String> {
    line.split_once(':').map(|(_, v)| v.trim().to_string())
}

/// Parse `net list` output into a flat list of network names.
///
/// Names may be separated by newlines or commas. The header token is dropped
/// and duplicates keep their first position.
pub fn parse_network_list(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let line = line.strip_prefix(NETWORK_LIST_HEADER).unwrap_or(line);
        for name in line.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Version string from `version` output (its last token)
pub fn parse_node_version(text: &str) -> Option<String> {
    text.split_whitespace().last().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "\
status:
  net: Backbone
  current_addr: 0A1B::2C3D::4E5F::6789
  states:
    current: NET_STATE_ONLINE
    target: NET_STATE_ONLINE
  processed:
    main:
      status: synced
      current: 512340
      in network: 512345
      percent: 99.9 %
";

    #[test]
    fn test_parse_status() {
        let status = TableLayoutV1.parse_status(STATUS);
        assert_eq!(status.our_node_state.as_deref(), Some("NET_STATE_ONLINE"));
        assert_eq!(status.network_state.as_deref(), Some("NET_STATE_ONLINE"));
        assert_eq!(status.main_status.as_deref(), Some("synced"));
        assert_eq!(status.block_height.as_deref(), Some("512345"));
        assert_eq!(status.sync_percentage.as_deref(), Some("99.9 %"));
        assert_eq!(status.node_addr.as_deref(), Some("0A1B::2C3D::4E5F::6789"));
    }

    #[test]
    fn test_parse_status_is_deterministic() {
        let first = TableLayoutV1.parse_status(STATUS);
        let second = TableLayoutV1.parse_status(STATUS);
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_status_truncated_main_block() {
        let text = "current: NET_STATE_SYNC_CHAINS\nmain:\n  status: syncing\n  current: 10";
        let status = TableLayoutV1.parse_status(text);
        assert_eq!(status.our_node_state.as_deref(), Some("NET_STATE_SYNC_CHAINS"));
        assert_eq!(status.main_status.as_deref(), Some("syncing"));
        assert_eq!(status.block_height, None);
        assert_eq!(status.sync_percentage, None);
    }

    #[test]
    fn test_parse_status_ignores_unknown_lines() {
        let status = TableLayoutV1.parse_status("banner\nsomething: else\n\n");
        assert_eq!(status, NetworkStatus::default());
    }

    #[test]
    fn test_parse_stake_defaults() {
        assert_eq!(TableLayoutV1.parse_stake(""), StakeInfo::default());
        let stake = StakeInfo::default();
        assert_eq!(stake.stake_value, "0");
        assert_eq!(stake.sovereign_addr, "N/A");
        assert_eq!(stake.sovereign_tax, "0");
    }

    #[test]
    fn test_parse_stake_partial() {
        let text = "  pkey_hash: 0xABC\n  stake_value: 1500.0\n  sovereign_tax: 10.0\n";
        let stake = TableLayoutV1.parse_stake(text);
        assert_eq!(stake.stake_value, "1500.0");
        assert_eq!(stake.sovereign_addr, "N/A");
        assert_eq!(stake.sovereign_tax, "10.0");
    }

    #[test]
    fn test_parse_stake_keeps_address_colons() {
        let stake = TableLayoutV1.parse_stake("sovereign_addr: Rj7J7M:xyz");
        assert_eq!(stake.sovereign_addr, "Rj7J7M:xyz");
    }

    #[test]
    fn test_parse_network_list_comma_joined() {
        assert_eq!(parse_network_list("net-a, net-b"), vec!["net-a", "net-b"]);
    }

    #[test]
    fn test_parse_network_list_with_header() {
        let text = "networks:\n\tBackbone, KelVPN\n  riemann\n\nBackbone\n";
        assert_eq!(
            parse_network_list(text),
            vec!["Backbone", "KelVPN", "riemann"]
        );
        assert_eq!(parse_network_list("networks: Backbone"), vec!["Backbone"]);
        assert!(parse_network_list("networks:\n").is_empty());
    }

    #[test]
    fn test_parse_node_version() {
        assert_eq!(
            parse_node_version("cellframe-node version 5.3-360\n").as_deref(),
            Some("5.3-360")
        );
        assert_eq!(parse_node_version("   "), None);
    }
}
