//! Node-backed key-value store
//!
//! Writes go through the node CLI's `global_db write` command, one process
//! per key.

use crate::backend::KvStore;
use cellhub_core::cli::{commands, NodeCli};
use cellhub_core::error::{HubError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Store backed by the node's global database
pub struct GlobalDbStore<C: NodeCli + ?Sized> {
    cli: Arc<C>,
}

impl<C: NodeCli + ?Sized> GlobalDbStore<C> {
    pub fn new(cli: Arc<C>) -> Self {
        Self { cli }
    }
}

impl<C: NodeCli + ?Sized + 'static> KvStore for GlobalDbStore<C> {
    fn write<'a>(
        &'a self,
        group: &'a str,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let args = commands::global_db_write(group, key, value);
            match self.cli.invoke(&args).await {
                Ok(_) => {
                    debug!(group = %group, key = %key, "Wrote global_db entry");
                    Ok(())
                }
                Err(e) => Err(HubError::StoreWrite {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            }
        })
    }
}
