//! Self-update from a remote manifest
//!
//! Runs on its own interval, separate from collection cycles. When the
//! remote manifest's `version` is lexically greater than the local one, every
//! configured artifact and the manifest itself are replaced and the host is
//! asked to reload.

use crate::config::{UpdateArtifact, UpdaterSettings};
use cellhub_core::cli::NodeCli;
use cellhub_core::error::{HubError, Result};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether `remote` should replace `local`.
///
/// Plain string comparison, not semantic versioning. A missing local version
/// always updates; a missing remote version never does.
pub fn is_newer(local: Option<&str>, remote: Option<&str>) -> bool {
    match (local, remote) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(local), Some(remote)) => remote > local,
    }
}

/// `version` field of a manifest, string or number
pub fn manifest_version(manifest: &Value) -> Option<String> {
    match &manifest["version"] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// What a check did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { local: Option<String> },
    Updated { from: Option<String>, to: String },
}

/// Manifest-driven updater
pub struct Updater {
    settings: UpdaterSettings,
    client: reqwest::Client,
    cli: Arc<dyn NodeCli>,
}

impl Updater {
    pub fn new(settings: UpdaterSettings, cli: Arc<dyn NodeCli>) -> Result<Self> {
        if settings.artifacts.is_empty() {
            return Err(HubError::Update("no artifacts configured".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| HubError::Update(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            client,
            cli,
        })
    }

    /// Installed version, if the local manifest is readable
    pub async fn local_version(&self) -> Option<String> {
        let path = &self.settings.local_manifest;
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                debug!(path = ?path, error = %e, "Local manifest not readable");
                return None;
            }
        };
        match serde_json::from_slice::<Value>(&data) {
            Ok(manifest) => manifest_version(&manifest),
            Err(e) => {
                warn!(path = ?path, error = %e, "Local manifest is not valid JSON");
                None
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HubError::Update(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(HubError::Update(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HubError::Update(format!("reading {} failed: {}", url, e)))?;
        Ok(body.to_vec())
    }

    /// Compare versions and update when the remote one is newer
    pub async fn check_and_update(&self) -> Result<UpdateOutcome> {
        let local = self.local_version().await;

        let manifest_body = self.fetch(&self.settings.remote_manifest_url).await?;
        let manifest: Value = serde_json::from_slice(&manifest_body)?;
        let remote = manifest_version(&manifest);

        if !is_newer(local.as_deref(), remote.as_deref()) {
            debug!(local = ?local, remote = ?remote, "Already up to date");
            return Ok(UpdateOutcome::UpToDate { local });
        }

        let to = remote.unwrap_or_default();
        info!(from = ?local, to = %to, "Updating");

        for artifact in &self.settings.artifacts {
            self.download(artifact).await?;
        }
        replace_file(&self.settings.local_manifest, &manifest_body).await?;

        self.reload().await?;
        Ok(UpdateOutcome::Updated { from: local, to })
    }

    async fn download(&self, artifact: &UpdateArtifact) -> Result<()> {
        let body = self.fetch(&artifact.url).await?;
        replace_file(&artifact.path, &body).await?;
        info!(url = %artifact.url, path = ?artifact.path, "Downloaded update artifact");
        Ok(())
    }

    /// Ask the host to reload through the node CLI
    async fn reload(&self) -> Result<()> {
        self.cli
            .invoke(&self.settings.reload_args)
            .await
            .map_err(|e| HubError::Update(format!("reload failed: {}", e)))?;
        info!("Reload requested");
        Ok(())
    }

    /// Check on every tick until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        let period = Duration::from_secs(self.settings.check_interval_secs.max(1));
        info!(interval_secs = period.as_secs(), "Starting updater");

        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if let Err(e) = self.check_and_update().await {
                warn!(error = %e, "Update check failed");
            }
        }
    }
}

/// Write `data` to `<path>.tmp` and rename it over `path`
async fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
