// ─── Version Manifest ───
// Handles fetching and parsing the version manifest that lists every version.

use serde::Deserialize;
use tracing::info;

use crate::core::downloader::Fetcher;
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::install::InstallLayout;

/// Top-level version manifest.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub latest: Option<LatestVersions>,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    /// Download the manifest to `{base}/version_manifest.json` and parse it.
    ///
    /// The manifest has no published hash, so any existing copy is refreshed.
    pub async fn fetch(
        fetcher: &Fetcher,
        url: &str,
        layout: &InstallLayout,
    ) -> ProvisionResult<Self> {
        info!("Fetching version manifest...");
        let dest = layout.version_manifest();
        fetcher.fetch_file(url, &dest, None).await?;
        let raw = tokio::fs::read(&dest)
            .await
            .map_err(|e| ProvisionError::io(&dest, e))?;
        let manifest: VersionManifest = serde_json::from_slice(&raw)?;
        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Find a specific version entry by id (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> ProvisionResult<&VersionEntry> {
        self.versions
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| ProvisionError::VersionNotFound(id.to_string()))
    }

    pub fn latest_release(&self) -> Option<&VersionEntry> {
        let id = &self.latest.as_ref()?.release;
        self.versions.iter().find(|v| &v.id == id)
    }
}
