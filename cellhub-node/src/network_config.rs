//! Per-network node configuration
//!
//! Each network the node joins has a `<network>.cfg` file of `key=value`
//! lines. Only the block signing certificate and the fee address are used.

use cellhub_core::error::{HubError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static BLOCKS_SIGN_CERT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^blocks-sign-cert=(.+)$").expect("valid cert pattern"));

static FEE_ADDR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^fee_addr=(.+)$").expect("valid fee_addr pattern"));

/// Fields read from a network config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Certificate used to sign blocks; without it stake and rewards are skipped
    pub blocks_sign_cert: Option<String>,
    /// Address block rewards are paid to
    pub fee_addr: Option<String>,
}

/// Extract the consumed fields from config text.
///
/// First match wins; trailing whitespace is trimmed and an empty value counts
/// as absent.
pub fn parse_network_config(text: &str) -> NetworkConfig {
    NetworkConfig {
        blocks_sign_cert: first_value(&BLOCKS_SIGN_CERT, text),
        fee_addr: first_value(&FEE_ADDR, text),
    }
}

fn first_value(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end().to_string())
        .filter(|v| !v.is_empty())
}

/// Reader for the node's network config directory
#[derive(Debug, Clone)]
pub struct NetworkConfigReader {
    dir: PathBuf,
}

impl NetworkConfigReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Config file for `network`
    pub fn path_for(&self, network: &str) -> PathBuf {
        self.dir.join(format!("{}.cfg", network))
    }

    /// Read and parse the config of `network`
    pub async fn read(&self, network: &str) -> Result<NetworkConfig> {
        let path = self.path_for(network);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(parse_network_config(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(HubError::ConfigNotFound(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}
