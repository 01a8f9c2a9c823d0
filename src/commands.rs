use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgGroup, Parser};
use tracing::{info, warn};

use crate::core::config::{ConfigStore, ProvisionConfig, DEFAULT_CONFIG_FILE};
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::install::{ProvisionReport, Provisioner};
use crate::core::java::{select_java, JavaDiscovery};
use crate::core::libraries::classpath;
use crate::core::platform::HostPlatform;
use crate::core::version::VersionJson;

/// Provision a game version: libraries, natives, assets and client jar.
#[derive(Debug, Parser)]
#[command(name = "provisioner", version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .multiple(true)
        .args(["version_id", "version_json", "find_java"])
))]
pub struct Cli {
    /// Configuration file (created with defaults when missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the configured base directory
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Route downloads through the configured mirror
    #[arg(long)]
    pub mirror: bool,

    /// Version to look up in the version manifest
    #[arg(long, conflicts_with = "version_json")]
    pub version_id: Option<String>,

    /// Local version descriptor to provision
    #[arg(long)]
    pub version_json: Option<PathBuf>,

    /// Scan for local Java installations
    #[arg(long)]
    pub find_java: bool,
}

impl Cli {
    /// Command-line flags layered over the file configuration.
    pub fn apply_overrides(&self, config: &mut ProvisionConfig) {
        if let Some(base_dir) = &self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if self.mirror {
            config.use_mirror = true;
        }
    }
}

pub async fn execute(cli: Cli) -> ProvisionResult<()> {
    let store = ConfigStore::open(&cli.config)?;
    let mut config = (*store.snapshot()).clone();
    cli.apply_overrides(&mut config);
    config.validate()?;

    let platform = HostPlatform::detect()?;
    info!(
        "Host {} / {}, base dir {:?}",
        platform.os_name, platform.arch, config.base_dir
    );

    let config = Arc::new(config);
    let provisioner = Provisioner::new(Arc::clone(&config), platform.clone())?;

    let target = match (&cli.version_id, &cli.version_json) {
        (Some(id), _) => Some((id.clone(), provisioner.resolve(id).await?)),
        (None, Some(path)) => {
            let version = VersionJson::load(path).await?;
            Some((descriptor_id(&version, path)?, version))
        }
        (None, None) => None,
    };

    let mut required_java = None;
    if let Some((version_id, version)) = target {
        let report = provisioner.provision(&version_id, &version).await?;
        log_report(&report);

        let cp = classpath(&version, &version_id, provisioner.layout(), &platform)?;
        info!(
            "Classpath has {} entries; game directory {:?}",
            cp.split(platform.classpath_separator()).count(),
            config.game_directory(&version_id)
        );
        required_java = Some(report.required_java);
    }

    if cli.find_java {
        let found = JavaDiscovery::new(config.java.clone()).discover().await?;
        if found.is_empty() {
            warn!("No Java installations found");
        }
        for (dir, label) in &found {
            info!("{}: {:?}", label, dir);
        }
        if let Some(required) = required_java {
            match select_java(&found, required) {
                Some((dir, label)) => {
                    info!("Selected {} at {:?} (requires Java {})", label, dir, required)
                }
                None => warn!("No usable Java for required major {}", required),
            }
        }
    }

    Ok(())
}

/// Version id of a local descriptor: its `id` field, else the file stem.
fn descriptor_id(version: &VersionJson, path: &Path) -> ProvisionResult<String> {
    version
        .id
        .clone()
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
        .ok_or_else(|| ProvisionError::Config(format!("cannot derive a version id from {path:?}")))
}

fn log_report(report: &ProvisionReport) {
    info!(
        "Libraries: {} included, {} excluded, {} downloaded, {} cached, {} natives extracted",
        report.libraries.included,
        report.libraries.excluded,
        report.libraries.downloaded,
        report.libraries.cached,
        report.libraries.extracted
    );
    if let Some(assets) = report.assets {
        info!(
            "Assets: {} objects, {} downloaded, {} cached",
            assets.total, assets.downloaded, assets.cached
        );
    }
    info!(
        "Version {} ready; requires Java {}",
        report.version_id, report.required_java
    );
}
