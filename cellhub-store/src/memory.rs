//! In-memory key-value store
//!
//! Used for testing and development. Not persistent.

use crate::backend::KvStoreSync;
use cellhub_core::error::{HubError, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// In-memory key-value store
pub struct MemoryStore {
    /// Values keyed by (group, key)
    entries: RwLock<HashMap<(String, String), String>>,

    /// Keys whose writes are rejected
    failing: RwLock<HashSet<String>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Reject every write to `key` with a store error
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing.write().insert(key.into());
    }

    /// Value stored under `key` in `group`
    pub fn get(&self, group: &str, key: &str) -> Option<String> {
        self.entries
            .read()
            .get(&(group.to_string(), key.to_string()))
            .cloned()
    }

    /// All keys in `group`, sorted
    pub fn keys(&self, group: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|(g, _)| g == group)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStoreSync for MemoryStore {
    fn write(&self, group: &str, key: &str, value: &str) -> Result<()> {
        if self.failing.read().contains(key) {
            return Err(HubError::StoreWrite {
                key: key.to_string(),
                reason: "write rejected".to_string(),
            });
        }

        self.entries
            .write()
            .insert((group.to_string(), key.to_string()), value.to_string());

        Ok(())
    }
}
