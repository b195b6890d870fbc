//! Cellframe Hub Core Library
//!
//! Building blocks for the hub telemetry collector:
//! - Node CLI invoker with a fixed per-call timeout
//! - Parsers for network status, stake and network list output
//! - Reward ledger, moving averages and staking yield
//! - Snapshot model and common error handling

pub mod cli;
pub mod error;
pub mod parse;
pub mod rewards;
pub mod snapshot;

pub use cli::{commands, NodeCli, ProcessCli, ScriptedCli, DEFAULT_CLI_PATH, DEFAULT_TIMEOUT};
pub use error::{HubError, Result};
pub use parse::{
    parse_network_list, parse_node_version, NetworkStatus, OutputParser, StakeInfo, TableLayoutV1,
};
pub use rewards::{
    annual_yield, gross_up, moving_average, FeeAddrInfo, MovingAverage, RewardLedger, DAY_FORMAT,
    LEDGER_DAYS,
};
pub use snapshot::{NetworkRecord, Snapshot, SovereignInfo, UNKNOWN_NODE_ADDR};
