//! Snapshot artifact writer
//!
//! The artifact is pretty-printed JSON at a fixed path, replaced each cycle
//! by writing a temp file next to it and renaming it over the target.

use cellhub_core::error::Result;
use cellhub_core::snapshot::Snapshot;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writer and reader of the snapshot artifact
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.tmp`
    fn tmp_path(&self) -> PathBuf {
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// Replace the artifact with `snapshot`
    pub async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let data = snapshot.to_json_pretty()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(data.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!(path = ?self.path, bytes = data.len(), "Snapshot written");
        Ok(())
    }

    /// Read the artifact back as untyped JSON
    pub async fn read_value(&self) -> Result<serde_json::Value> {
        let data = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}
