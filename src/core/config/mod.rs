// ─── Provisioning Configuration ───
// Explicit configuration object handed to the fetcher and orchestrator.
// Hot reload is an explicit `ConfigStore::reload()` driven by the caller.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::downloader::{MirrorRewriter, RetryPolicy};
use crate::core::error::{ProvisionError, ProvisionResult};

pub const DEFAULT_CONFIG_FILE: &str = "provisioner.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvisionConfig {
    pub base_dir: PathBuf,
    pub version_manifest_url: String,
    pub resource_download_base_url: String,
    pub use_mirror: bool,
    pub mirror_base_url: String,
    pub version_isolation_enabled: bool,
    /// Upper bound on concurrent requests; the admission-control knob.
    pub max_connections_per_host: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_secs: u64,
    pub java: JavaDiscoverySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JavaDiscoverySettings {
    pub executables: Vec<String>,
    pub keywords: Vec<String>,
    pub ignore_dirs: Vec<String>,
    pub max_depth: usize,
    pub probe_timeout_secs: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".minecraft"),
            version_manifest_url:
                "https://piston-meta.mojang.com/mc/game/version_manifest.json".into(),
            resource_download_base_url: "https://resources.download.minecraft.net".into(),
            use_mirror: false,
            mirror_base_url: "https://bmclapi2.bangbang93.com".into(),
            version_isolation_enabled: true,
            max_connections_per_host: 64,
            max_attempts: 5,
            backoff_base_ms: 1000,
            backoff_cap_secs: 30,
            java: JavaDiscoverySettings::default(),
        }
    }
}

impl Default for JavaDiscoverySettings {
    fn default() -> Self {
        Self {
            executables: vec!["java".into(), "java.exe".into(), "javaw.exe".into()],
            keywords: ["java", "jdk", "jre", "oracle", "minecraft", "runtime"]
                .into_iter()
                .map(String::from)
                .collect(),
            ignore_dirs: ["windows", "system32", "temp"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_depth: 4,
            probe_timeout_secs: 5,
        }
    }
}

impl ProvisionConfig {
    /// Read the config at `path`; when missing, write the defaults there and use them.
    pub fn load_or_create(path: &Path) -> ProvisionResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let config: ProvisionConfig = serde_json::from_str(&raw)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {:?} not found, writing defaults", path);
                let config = ProvisionConfig::default();
                config.save(path)?;
                Ok(config)
            }
            Err(e) => Err(ProvisionError::io(path, e)),
        }
    }

    pub fn save(&self, path: &Path) -> ProvisionResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProvisionError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ProvisionError::io(path, e))
    }

    pub fn validate(&self) -> ProvisionResult<()> {
        if self.max_connections_per_host == 0 {
            return Err(ProvisionError::Config(
                "max_connections_per_host must be at least 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ProvisionError::Config("max_attempts must be at least 1".into()));
        }
        if self.use_mirror && self.mirror_base_url.trim().is_empty() {
            return Err(ProvisionError::Config(
                "use_mirror is set but mirror_base_url is empty".into(),
            ));
        }
        Ok(())
    }

    /// Mirror rewriter when mirroring is enabled.
    pub fn mirror(&self) -> Option<MirrorRewriter> {
        self.use_mirror
            .then(|| MirrorRewriter::new(&self.mirror_base_url, &self.resource_download_base_url))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_secs(self.backoff_cap_secs),
        }
    }

    /// Working directory handed to the game: isolated per version or shared.
    pub fn game_directory(&self, version: &str) -> PathBuf {
        if self.version_isolation_enabled {
            self.base_dir.join("versions").join(version)
        } else {
            self.base_dir.clone()
        }
    }
}

/// Current configuration plus the file it came from.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<ProvisionConfig>>,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> ProvisionResult<Self> {
        let path = path.into();
        let config = ProvisionConfig::load_or_create(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    pub fn snapshot(&self) -> Arc<ProvisionConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Re-read the backing file. On error the previous config stays active.
    pub fn reload(&self) -> ProvisionResult<Arc<ProvisionConfig>> {
        let fresh = Arc::new(ProvisionConfig::load_or_create(&self.path)?);
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&fresh),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&fresh),
        }
        info!("Configuration reloaded from {:?}", self.path);
        Ok(fresh)
    }
}
