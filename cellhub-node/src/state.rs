//! Process-wide collector state
//!
//! The detected node address is the only value carried across cycles. It
//! starts unknown, is written only by the collector when status output
//! carries an address, and is never reset once set.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Last detected node address, shared between the collector and readers
#[derive(Debug, Clone, Default)]
pub struct NodeAddressCache {
    inner: Arc<RwLock<Option<String>>>,
}

impl NodeAddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly detected address (last write wins)
    pub fn update(&self, addr: &str) {
        let addr = addr.trim();
        if addr.is_empty() {
            return;
        }

        let mut current = self.inner.write();
        if current.as_deref() != Some(addr) {
            info!(node_addr = %addr, "Detected node address");
            *current = Some(addr.to_string());
        }
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let cache = NodeAddressCache::new();
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn test_update_persists_and_overwrites() {
        let cache = NodeAddressCache::new();
        cache.update("AA::BB");
        cache.update("");
        assert_eq!(cache.get().as_deref(), Some("AA::BB"));

        cache.update("CC::DD");
        assert_eq!(cache.get().as_deref(), Some("CC::DD"));
    }

    #[test]
    fn test_clones_share_state() {
        let cache = NodeAddressCache::new();
        let reader = cache.clone();
        cache.update("AA::BB");
        assert_eq!(reader.get().as_deref(), Some("AA::BB"));
    }
}
