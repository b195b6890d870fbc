//! Cellframe Hub Key-Value Store
//!
//! Provides store abstractions and implementations:
//! - `KvStore` trait for pluggable stores
//! - `GlobalDbStore` for the node's global database
//! - `MemoryStore` for testing

pub mod backend;
pub mod global_db;
pub mod memory;

pub use backend::{AsyncWrapper, KvStore, KvStoreSync};
pub use global_db::GlobalDbStore;
pub use memory::MemoryStore;

/// Default group for hub entries
pub const DEFAULT_GROUP: &str = "hub";

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Group all entries are written to
    pub group: String,

    /// Disable to skip exporting entirely
    pub enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            enabled: true,
        }
    }
}

impl StoreConfig {
    /// Create a new store config for the given group
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Default::default()
        }
    }

    /// Enable/disable exporting
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
