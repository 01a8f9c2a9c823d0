// ─── Version File ───
// Typed model of a per-version descriptor JSON.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::core::downloader::Fetcher;
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::install::InstallLayout;
use crate::core::platform::{RuleContext, TargetArch};

use super::arguments::Arguments;
use super::manifest::VersionEntry;
use super::rules::{self, Rule, RuleOutcome};

const DEFAULT_JAVA_MAJOR: u32 = 21;

/// A fully parsed version descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    #[serde(default)]
    pub id: Option<String>,
    pub main_class: String,
    #[serde(default, rename = "type")]
    pub version_type: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    /// Asset index id as declared at the top level (older descriptors).
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaVersionInfo>,
    #[serde(default)]
    pub logging: Option<LoggingInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    #[serde(default)]
    pub client: Option<DownloadArtifact>,
}

/// A downloadable file without a library-relative path.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingInfo {
    #[serde(default)]
    pub client: Option<LoggingClient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingClient {
    #[serde(default)]
    pub argument: Option<String>,
    pub file: LoggingFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingFile {
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

// ─── Library Entry ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    /// os name -> classifier template (may contain `${arch}`).
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

/// `path` is relative to the libraries directory; `sha1` is the integrity anchor.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl LibraryEntry {
    pub fn applies(&self, ctx: &RuleContext) -> ProvisionResult<RuleOutcome> {
        rules::evaluate_optional(self.rules.as_deref(), ctx)
    }

    /// Classifier key for this host: the os-keyed template with `${arch}`
    /// substituted, else `natives-{os}`.
    pub fn native_classifier(&self, os_name: &str, arch: TargetArch) -> String {
        self.natives
            .as_ref()
            .and_then(|natives| natives.get(os_name))
            .map(|template| template.replace("${arch}", arch.natives_token()))
            .unwrap_or_else(|| format!("natives-{os_name}"))
    }

    pub fn primary_artifact(&self) -> Option<&Artifact> {
        self.downloads.as_ref()?.artifact.as_ref()
    }

    pub fn classifier(&self, key: &str) -> Option<&Artifact> {
        self.downloads.as_ref()?.classifiers.as_ref()?.get(key)
    }
}

impl VersionJson {
    pub fn from_slice(raw: &[u8]) -> ProvisionResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Read and parse a descriptor already on disk.
    pub async fn load(path: &Path) -> ProvisionResult<Self> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| ProvisionError::io(path, e))?;
        Self::from_slice(&raw)
    }

    /// Download the descriptor for `entry` to `versions/{id}/{id}.json` and parse it.
    pub async fn fetch_into(
        entry: &VersionEntry,
        layout: &InstallLayout,
        fetcher: &Fetcher,
    ) -> ProvisionResult<Self> {
        let dest = layout.version_json(&entry.id);
        fetcher
            .fetch_file(&entry.url, &dest, entry.sha1.as_deref())
            .await?;
        let version = Self::load(&dest).await?;
        info!(
            "Loaded version {} ({} libraries)",
            entry.id,
            version.libraries.len()
        );
        Ok(version)
    }

    /// Required Java major version (defaults to 21 when undeclared).
    pub fn required_java_major(&self) -> u32 {
        self.java_version
            .as_ref()
            .map(|j| j.major_version)
            .unwrap_or(DEFAULT_JAVA_MAJOR)
    }

    /// Asset index id, preferring the `assetIndex` object over `assets`.
    pub fn asset_index_id(&self) -> Option<&str> {
        self.asset_index
            .as_ref()
            .map(|ai| ai.id.as_str())
            .or(self.assets.as_deref())
    }

    pub fn client_download(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref()?.client.as_ref()
    }

    pub fn logging_file(&self) -> Option<&LoggingFile> {
        self.logging.as_ref()?.client.as_ref().map(|c| &c.file)
    }

    /// Game arguments for `ctx`, including the legacy string form.
    pub fn game_args(&self, ctx: &RuleContext) -> ProvisionResult<Vec<String>> {
        let mut args = match &self.arguments {
            Some(arguments) => arguments.resolve_game(ctx)?,
            None => Vec::new(),
        };
        if let Some(legacy) = &self.minecraft_arguments {
            args.extend(legacy.split_whitespace().map(ToString::to_string));
        }
        Ok(args)
    }

    pub fn jvm_args(&self, ctx: &RuleContext) -> ProvisionResult<Vec<String>> {
        match &self.arguments {
            Some(arguments) => arguments.resolve_jvm(ctx),
            None => Ok(Vec::new()),
        }
    }
}
