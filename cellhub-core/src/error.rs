//! Error types for the hub collector
//!
//! Provides a unified error type for CLI, parsing, file and store operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

/// Unified error type for the hub collector
#[derive(Error, Debug)]
pub enum HubError {
    // ===== CLI Errors =====
    #[error("CLI exited with code {code:?}: {stderr}")]
    CliExit { code: Option<i32>, stderr: String },

    #[error("CLI timed out after {0:?}")]
    CliTimeout(Duration),

    #[error("Failed to spawn CLI {binary}: {reason}")]
    CliSpawn { binary: String, reason: String },

    // ===== Network Config Errors =====
    #[error("Network config not found: {0}")]
    ConfigNotFound(PathBuf),

    // ===== Store Errors =====
    #[error("Store write failed for key {key}: {reason}")]
    StoreWrite { key: String, reason: String },

    // ===== Update Errors =====
    #[error("Update error: {0}")]
    Update(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HubError {
    /// Whether the failure only affects a single field, network or key.
    ///
    /// Soft failures are logged and skipped; the collection cycle carries on.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            HubError::CliExit { .. }
                | HubError::CliTimeout(_)
                | HubError::CliSpawn { .. }
                | HubError::ConfigNotFound(_)
                | HubError::StoreWrite { .. }
        )
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Serialization(err.to_string())
    }
}
