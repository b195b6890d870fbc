//! Node CLI invoker
//!
//! The only boundary to the external node process. Every call spawns one
//! process, waits for it with a fixed timeout and returns stdout on exit
//! code 0. Retries are the caller's business.

use crate::error::{HubError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default timeout for a single CLI call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default location of the node CLI binary
pub const DEFAULT_CLI_PATH: &str = "/opt/cellframe-node/bin/cellframe-node-cli";

/// Invoker for the node's command-line interface
#[async_trait]
pub trait NodeCli: Send + Sync {
    /// Run the CLI with `args` and an explicit timeout
    async fn invoke_with_timeout(&self, args: &[String], timeout: Duration) -> Result<String>;

    /// Timeout applied by [`NodeCli::invoke`]
    fn default_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Run the CLI with the default timeout
    async fn invoke(&self, args: &[String]) -> Result<String> {
        self.invoke_with_timeout(args, self.default_timeout()).await
    }
}

/// Argument lists for the CLI subcommands the collector uses
pub mod commands {
    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    pub fn net_list() -> Vec<String> {
        args(&["net", "list"])
    }

    pub fn net_status(network: &str) -> Vec<String> {
        args(&["net", "get", "status", "-net", network])
    }

    pub fn stake_keys(network: &str, cert: &str) -> Vec<String> {
        args(&["srv_stake", "list", "keys", "-net", network, "-cert", cert])
    }

    pub fn tx_history(addr: &str) -> Vec<String> {
        args(&["tx_history", "-addr", addr])
    }

    pub fn version() -> Vec<String> {
        args(&["version"])
    }

    pub fn global_db_write(group: &str, key: &str, value: &str) -> Vec<String> {
        args(&["global_db", "write", "-group", group, "-key", key, "-value", value])
    }
}

/// Invoker that spawns the real CLI binary
#[derive(Debug, Clone)]
pub struct ProcessCli {
    binary: PathBuf,
    timeout: Duration,
}

impl ProcessCli {
    /// Create an invoker for `binary` with the default timeout
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl NodeCli for ProcessCli {
    async fn invoke_with_timeout(&self, args: &[String], timeout: Duration) -> Result<String> {
        debug!(binary = ?self.binary, args = ?args, "Invoking node CLI");

        let mut command = Command::new(&self.binary);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(HubError::CliSpawn {
                    binary: self.binary.display().to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                debug!(args = ?args, timeout_secs = timeout.as_secs(), "Node CLI timed out");
                return Err(HubError::CliTimeout(timeout));
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(HubError::CliExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }
}

/// Canned response for [`ScriptedCli`]
#[derive(Debug, Clone)]
enum Scripted {
    Stdout(String),
    Exit { code: i32, stderr: String },
    Timeout,
}

/// In-memory CLI with canned responses keyed by the joined argument list.
///
/// Used for testing and development. Unscripted commands exit with code 1.
#[derive(Debug, Default)]
pub struct ScriptedCli {
    responses: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` (space-joined args) with `stdout`
    pub fn respond(&self, command: &str, stdout: impl Into<String>) -> &Self {
        self.responses
            .lock()
            .insert(command.to_string(), Scripted::Stdout(stdout.into()));
        self
    }

    /// Make `command` exit with a non-zero code
    pub fn fail(&self, command: &str, code: i32, stderr: impl Into<String>) -> &Self {
        self.responses.lock().insert(
            command.to_string(),
            Scripted::Exit {
                code,
                stderr: stderr.into(),
            },
        );
        self
    }

    /// Make `command` time out
    pub fn hang(&self, command: &str) -> &Self {
        self.responses
            .lock()
            .insert(command.to_string(), Scripted::Timeout);
        self
    }

    /// Every command invoked so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of invoked commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl NodeCli for ScriptedCli {
    async fn invoke_with_timeout(&self, args: &[String], timeout: Duration) -> Result<String> {
        let command = args.join(" ");
        self.calls.lock().push(command.clone());

        let scripted = self.responses.lock().get(&command).cloned();
        match scripted {
            Some(Scripted::Stdout(stdout)) => Ok(stdout),
            Some(Scripted::Exit { code, stderr }) => Err(HubError::CliExit {
                code: Some(code),
                stderr,
            }),
            Some(Scripted::Timeout) => Err(HubError::CliTimeout(timeout)),
            None => Err(HubError::CliExit {
                code: Some(1),
                stderr: format!("unknown command: {}", command),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_cli_success() {
        let cli = ProcessCli::new("/bin/sh");
        let out = cli.invoke(&sh("echo hello")).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_cli_nonzero_exit() {
        let cli = ProcessCli::new("/bin/sh");
        let err = cli.invoke(&sh("echo boom >&2; exit 3")).await.unwrap_err();
        match err {
            HubError::CliExit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_cli_timeout() {
        let cli = ProcessCli::new("/bin/sh").with_timeout(Duration::from_millis(100));
        let err = cli.invoke(&sh("sleep 5")).await.unwrap_err();
        assert!(matches!(err, HubError::CliTimeout(_)));
        assert!(err.is_soft());
    }

    #[tokio::test]
    async fn test_process_cli_missing_binary() {
        let cli = ProcessCli::new("/nonexistent/cellframe-node-cli");
        let err = cli.invoke(&commands::version()).await.unwrap_err();
        assert!(matches!(err, HubError::CliSpawn { .. }));
    }

    #[tokio::test]
    async fn test_scripted_cli() {
        let cli = ScriptedCli::new();
        cli.respond("net list", "networks:\nBackbone")
            .fail("version", 2, "broken");

        assert_eq!(cli.invoke(&commands::net_list()).await.unwrap(), "networks:\nBackbone");
        assert!(matches!(
            cli.invoke(&commands::version()).await,
            Err(HubError::CliExit { code: Some(2), .. })
        ));
        assert!(cli.invoke(&commands::tx_history("addr")).await.is_err());
        assert_eq!(cli.calls().len(), 3);
        assert_eq!(cli.count("net"), 1);
    }

    #[test]
    fn test_command_args() {
        assert_eq!(
            commands::stake_keys("Backbone", "node.master").join(" "),
            "srv_stake list keys -net Backbone -cert node.master"
        );
        assert_eq!(
            commands::global_db_write("hub", "k", "v").join(" "),
            "global_db write -group hub -key k -value v"
        );
    }
}
