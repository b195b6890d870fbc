//! Key-value store trait
//!
//! Defines the interface the exporter writes through. Values are stringified
//! scalars and every write overwrites the previous value for its key.

use cellhub_core::error::Result;
use std::future::Future;
use std::pin::Pin;

/// Async key-value store trait
///
/// All implementations must be Send + Sync for use in async contexts.
pub trait KvStore: Send + Sync {
    /// Write `value` under `key` in `group`
    fn write<'a>(
        &'a self,
        group: &'a str,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Synchronous key-value store trait (for simpler implementations)
pub trait KvStoreSync: Send + Sync {
    /// Write `value` under `key` in `group`
    fn write(&self, group: &str, key: &str, value: &str) -> Result<()>;
}

/// Wrapper to convert sync store to async
pub struct AsyncWrapper<T: KvStoreSync>(pub T);

impl<T: KvStoreSync + 'static> KvStore for AsyncWrapper<T> {
    fn write<'a>(
        &'a self,
        group: &'a str,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move { self.0.write(group, key, value) })
    }
}
