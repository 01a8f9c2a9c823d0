use std::path::PathBuf;

/// On-disk layout of a provisioned game directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    base: PathBuf,
}

impl InstallLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn version_manifest(&self) -> PathBuf {
        self.base.join("version_manifest.json")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.base.join("libraries")
    }

    /// `relative` is an artifact `path` from a version descriptor.
    pub fn library(&self, relative: &str) -> PathBuf {
        self.libraries_dir().join(relative)
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.base.join("versions").join(version)
    }

    pub fn version_json(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(format!("{version}.json"))
    }

    pub fn client_jar(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(format!("{version}.jar"))
    }

    pub fn natives_dir(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(format!("{version}-natives"))
    }

    pub fn log_config(&self, version: &str) -> PathBuf {
        self.version_dir(version).join("log4j2.xml")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.base.join("assets")
    }

    pub fn asset_index(&self, id: &str) -> PathBuf {
        self.assets_dir().join("indexes").join(format!("{id}.json"))
    }

    /// Content-addressed object path: `objects/{hash[0:2]}/{hash}`.
    pub fn asset_object(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or(hash);
        self.assets_dir().join("objects").join(prefix).join(hash)
    }
}
