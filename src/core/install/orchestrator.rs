use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::core::assets::{AssetSummary, AssetSynchronizer};
use crate::core::config::ProvisionConfig;
use crate::core::downloader::{FetchOutcome, Fetcher};
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::libraries::{LibraryResolver, LibrarySummary};
use crate::core::platform::HostPlatform;
use crate::core::version::{VersionJson, VersionManifest};

use super::layout::InstallLayout;

/// What one provisioning run touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub version_id: String,
    pub libraries: LibrarySummary,
    pub assets: Option<AssetSummary>,
    pub client: Option<FetchOutcome>,
    pub logging: Option<FetchOutcome>,
    pub natives_dir: PathBuf,
    pub required_java: u32,
}

/// Drives a full install of one version into the configured base directory.
pub struct Provisioner {
    config: Arc<ProvisionConfig>,
    platform: HostPlatform,
    layout: InstallLayout,
    fetcher: Fetcher,
}

impl Provisioner {
    pub fn new(config: Arc<ProvisionConfig>, platform: HostPlatform) -> ProvisionResult<Self> {
        config.validate()?;
        let fetcher = Fetcher::from_config(&config)?;
        Ok(Self::with_fetcher(config, platform, fetcher))
    }

    pub fn with_fetcher(
        config: Arc<ProvisionConfig>,
        platform: HostPlatform,
        fetcher: Fetcher,
    ) -> Self {
        let layout = InstallLayout::new(&config.base_dir);
        Self {
            config,
            platform,
            layout,
            fetcher,
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn platform(&self) -> &HostPlatform {
        &self.platform
    }

    pub async fn fetch_manifest(&self) -> ProvisionResult<VersionManifest> {
        VersionManifest::fetch(&self.fetcher, &self.config.version_manifest_url, &self.layout)
            .await
    }

    /// Look `version_id` up in the version manifest and fetch its descriptor.
    pub async fn resolve(&self, version_id: &str) -> ProvisionResult<VersionJson> {
        let manifest = self.fetch_manifest().await?;
        let entry = manifest.find_version(version_id)?;
        VersionJson::fetch_into(entry, &self.layout, &self.fetcher).await
    }

    pub async fn provision_by_id(&self, version_id: &str) -> ProvisionResult<ProvisionReport> {
        let version = self.resolve(version_id).await?;
        self.provision(version_id, &version).await
    }

    /// Install libraries, assets, client jar and logging config concurrently.
    /// The first failing branch aborts the others.
    #[instrument(skip(self, version), fields(os = %self.platform.os_name, arch = %self.platform.arch))]
    pub async fn provision(
        &self,
        version_id: &str,
        version: &VersionJson,
    ) -> ProvisionResult<ProvisionReport> {
        info!("Provisioning {}", version_id);

        let natives_dir = self.layout.natives_dir(version_id);
        // Clean previous session
        if tokio::fs::try_exists(&natives_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&natives_dir)
                .await
                .map_err(|e| ProvisionError::io(&natives_dir, e))?;
        }
        tokio::fs::create_dir_all(&natives_dir)
            .await
            .map_err(|e| ProvisionError::io(&natives_dir, e))?;

        let concurrency = self.config.max_connections_per_host;
        let libraries = LibraryResolver::new(&self.fetcher, &self.layout, &self.platform, version_id)
            .with_concurrency(concurrency);
        let assets = AssetSynchronizer::new(
            &self.fetcher,
            &self.layout,
            &self.config.resource_download_base_url,
        )
        .with_concurrency(concurrency);

        let libraries_branch = libraries.install_all(&version.libraries);

        let assets_branch = async {
            match &version.asset_index {
                Some(index) => assets.sync(index).await.map(Some),
                None => Ok(None),
            }
        };

        let client_branch = async {
            match version.client_download() {
                Some(client) => self
                    .fetcher
                    .fetch_file(
                        &client.url,
                        &self.layout.client_jar(version_id),
                        client.sha1.as_deref(),
                    )
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };

        let logging_branch = async {
            match version.logging_file() {
                Some(file) => self
                    .fetcher
                    .fetch_file(
                        &file.url,
                        &self.layout.log_config(version_id),
                        file.sha1.as_deref(),
                    )
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };

        let (libraries, assets, client, logging) = tokio::try_join!(
            libraries_branch,
            assets_branch,
            client_branch,
            logging_branch
        )?;

        info!(
            "Provisioned {}: {} libraries, {} assets",
            version_id,
            libraries.included,
            assets.map(|a| a.total).unwrap_or(0)
        );

        Ok(ProvisionReport {
            version_id: version_id.to_string(),
            libraries,
            assets,
            client,
            logging,
            natives_dir,
            required_java: version.required_java_major(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::hash::sha1_bytes;
    use crate::core::platform::TargetArch;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, base: &std::path::Path) -> Arc<ProvisionConfig> {
        Arc::new(ProvisionConfig {
            base_dir: base.to_path_buf(),
            version_manifest_url: format!("{}/mc/game/version_manifest.json", server.uri()),
            resource_download_base_url: format!("{}/objects", server.uri()),
            max_attempts: 2,
            backoff_base_ms: 5,
            backoff_cap_secs: 1,
            ..ProvisionConfig::default()
        })
    }

    async fn serve(server: &MockServer, at: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    /// Serves a small but complete version and returns its descriptor JSON.
    async fn serve_version(server: &MockServer) -> serde_json::Value {
        let uri = server.uri();
        let lib = b"library jar".to_vec();
        let client = b"client jar".to_vec();
        let log = b"<Configuration/>".to_vec();
        let object = b"asset object".to_vec();
        let object_hash = sha1_bytes(&object);
        let index = json!({"objects": {"icons/icon.png": {"hash": object_hash, "size": object.len()}}})
            .to_string()
            .into_bytes();

        serve(server, "/libs/gson.jar", lib.clone()).await;
        serve(server, "/client.jar", client.clone()).await;
        serve(server, "/client-1.12.xml", log.clone()).await;
        serve(server, "/indexes/17.json", index.clone()).await;
        serve(
            server,
            &format!("/objects/{}/{}", &object_hash[..2], object_hash),
            object,
        )
        .await;

        json!({
            "id": "1.20.4",
            "mainClass": "net.minecraft.client.main.Main",
            "javaVersion": {"majorVersion": 17},
            "assetIndex": {"id": "17", "url": format!("{uri}/indexes/17.json"), "sha1": sha1_bytes(&index)},
            "downloads": {"client": {"url": format!("{uri}/client.jar"), "sha1": sha1_bytes(&client), "size": client.len()}},
            "logging": {"client": {"argument": "-Dlog4j.configurationFile=${path}",
                "file": {"id": "client-1.12.xml", "url": format!("{uri}/client-1.12.xml"), "sha1": sha1_bytes(&log)}}},
            "libraries": [
                {"name": "com.google.code.gson:gson:2.10.1",
                 "downloads": {"artifact": {"path": "com/google/gson/gson.jar",
                    "url": format!("{uri}/libs/gson.jar"), "sha1": sha1_bytes(&lib), "size": lib.len()}}},
                {"name": "ca.weblite:java-objc-bridge:1.1",
                 "rules": [{"action": "allow", "os": {"name": "osx"}}]}
            ]
        })
    }

    #[tokio::test]
    async fn provisions_every_branch() {
        let server = MockServer::start().await;
        let descriptor = serve_version(&server).await;
        let version: VersionJson = serde_json::from_value(descriptor).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let provisioner = Provisioner::new(
            config(&server, dir.path()),
            HostPlatform::new("linux", TargetArch::Bits64),
        )
        .unwrap();

        let report = provisioner.provision("1.20.4", &version).await.unwrap();

        let layout = provisioner.layout();
        assert_eq!(report.libraries.included, 1);
        assert_eq!(report.libraries.excluded, 1);
        assert_eq!(report.assets.map(|a| a.downloaded), Some(1));
        assert!(matches!(report.client, Some(FetchOutcome::Downloaded { .. })));
        assert!(matches!(report.logging, Some(FetchOutcome::Downloaded { .. })));
        assert_eq!(report.required_java, 17);
        assert!(layout.client_jar("1.20.4").exists());
        assert!(layout.log_config("1.20.4").exists());
        assert!(layout.natives_dir("1.20.4").is_dir());
        assert!(layout.library("com/google/gson/gson.jar").exists());

        let leftover = layout.natives_dir("1.20.4").join("stale.so");
        std::fs::write(&leftover, b"old session").unwrap();

        // Everything is verified on disk now; a rerun only reports cache hits.
        let rerun = provisioner.provision("1.20.4", &version).await.unwrap();
        assert_eq!(rerun.client, Some(FetchOutcome::Cached));
        assert_eq!(rerun.libraries.cached, 1);
        assert!(!leftover.exists());
    }

    #[tokio::test]
    async fn failing_branch_fails_the_run() {
        let server = MockServer::start().await;
        let mut descriptor = serve_version(&server).await;
        descriptor["downloads"]["client"]["url"] = json!(format!("{}/gone.jar", server.uri()));
        Mock::given(method("GET"))
            .and(path("/gone.jar"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let version: VersionJson = serde_json::from_value(descriptor).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let provisioner = Provisioner::new(
            config(&server, dir.path()),
            HostPlatform::new("linux", TargetArch::Bits64),
        )
        .unwrap();

        let err = provisioner.provision("1.20.4", &version).await.unwrap_err();
        assert!(matches!(err, ProvisionError::DownloadFailed { status: 404, .. }));
    }

    #[tokio::test]
    async fn provision_by_id_resolves_through_manifest() {
        let server = MockServer::start().await;
        let descriptor = serve_version(&server).await.to_string().into_bytes();
        let manifest = json!({
            "latest": {"release": "1.20.4", "snapshot": "24w14a"},
            "versions": [{"id": "1.20.4", "type": "release",
                "url": format!("{}/v1/packages/1.20.4.json", server.uri()),
                "sha1": sha1_bytes(&descriptor)}]
        })
        .to_string()
        .into_bytes();
        serve(&server, "/mc/game/version_manifest.json", manifest).await;
        serve(&server, "/v1/packages/1.20.4.json", descriptor).await;

        let dir = tempfile::tempdir().unwrap();
        let provisioner = Provisioner::new(
            config(&server, dir.path()),
            HostPlatform::new("linux", TargetArch::Bits64),
        )
        .unwrap();

        let report = provisioner.provision_by_id("1.20.4").await.unwrap();
        assert_eq!(report.version_id, "1.20.4");
        assert!(provisioner.layout().version_json("1.20.4").exists());

        let missing = provisioner.provision_by_id("0.0.1").await.unwrap_err();
        assert!(matches!(missing, ProvisionError::VersionNotFound(_)));
    }
}
