use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::{stream, StreamExt};
use tracing::{debug, info};

use crate::core::config::JavaDiscoverySettings;
use crate::core::error::ProvisionResult;

use super::probe::{label_major, probe_java_dir};

/// Directory holding a java executable -> version label.
pub type JavaInstallations = BTreeMap<PathBuf, String>;

/// Breadth-first search for Java installations under well-known roots.
#[derive(Debug, Clone)]
pub struct JavaDiscovery {
    settings: JavaDiscoverySettings,
}

impl JavaDiscovery {
    pub fn new(settings: JavaDiscoverySettings) -> Self {
        Self { settings }
    }

    /// PATH and JAVA_HOME entries, mount points, user data dirs and the cwd.
    pub fn default_roots() -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for var in ["PATH", "JAVA_HOME"] {
            if let Some(value) = std::env::var_os(var) {
                roots.extend(std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
            }
        }

        let disks = sysinfo::Disks::new_with_refreshed_list();
        roots.extend(disks.list().iter().map(|d| d.mount_point().to_path_buf()));

        roots.extend(dirs::data_dir());
        roots.extend(dirs::data_local_dir());
        roots.extend(std::env::current_dir().ok());

        roots.retain(|p| p.is_dir());
        roots
    }

    pub async fn discover(&self) -> ProvisionResult<JavaInstallations> {
        self.discover_in(Self::default_roots()).await
    }

    /// Scan `roots` on the blocking pool, then probe each hit concurrently.
    pub async fn discover_in(&self, roots: Vec<PathBuf>) -> ProvisionResult<JavaInstallations> {
        let scanner = self.clone();
        let dirs = tokio::task::spawn_blocking(move || scanner.scan(&roots)).await?;

        let timeout = Duration::from_secs(self.settings.probe_timeout_secs);
        let executables = &self.settings.executables;
        let found: JavaInstallations = stream::iter(dirs)
            .map(|dir| async move {
                let label = probe_java_dir(&dir, executables, timeout).await;
                info!("Found {} at {:?}", label, dir);
                (dir, label)
            })
            .buffer_unordered(8)
            .collect()
            .await;
        Ok(found)
    }

    /// Directories under `roots` that contain a java executable.
    pub fn scan(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        let mut queue: VecDeque<(PathBuf, usize)> =
            roots.iter().map(|root| (root.clone(), 0)).collect();
        let mut visited = HashSet::new();
        let mut found = Vec::new();

        while let Some((dir, depth)) = queue.pop_front() {
            if depth > self.settings.max_depth || self.is_ignored(&dir) {
                continue;
            }
            let key = std::fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !visited.insert(key) {
                continue;
            }

            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Scan error in {:?}: {}", dir, e);
                    continue;
                }
            };

            let mut recorded = false;
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_ascii_lowercase();

                if path.is_file() {
                    if !recorded && self.is_java_executable(&name) {
                        recorded = true;
                        found.push(dir.clone());
                    }
                } else if path.is_dir()
                    && !name.starts_with('.')
                    && (depth < 2 || self.settings.keywords.iter().any(|kw| name.contains(kw.as_str())))
                {
                    queue.push_back((path, depth + 1));
                }
            }
        }

        found
    }

    fn is_java_executable(&self, lower_name: &str) -> bool {
        self.settings
            .executables
            .iter()
            .any(|exe| exe.eq_ignore_ascii_case(lower_name))
    }

    fn is_ignored(&self, dir: &Path) -> bool {
        let lower = dir.to_string_lossy().to_ascii_lowercase();
        self.settings
            .ignore_dirs
            .iter()
            .any(|ignored| lower.contains(ignored.as_str()))
    }
}

/// Installation matching `required_major` exactly, else the newest one found.
pub fn select_java(found: &JavaInstallations, required_major: u32) -> Option<(&Path, &str)> {
    let labelled = found
        .iter()
        .filter_map(|(dir, label)| label_major(label).map(|major| (dir, label, major)));

    let mut best: Option<(&PathBuf, &String, u32)> = None;
    for (dir, label, major) in labelled {
        if major == required_major {
            return Some((dir.as_path(), label.as_str()));
        }
        if best.map_or(true, |(_, _, m)| major > m) {
            best = Some((dir, label, major));
        }
    }
    best.map(|(dir, label, _)| (dir.as_path(), label.as_str()))
}
