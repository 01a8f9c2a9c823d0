use std::path::PathBuf;

use futures_util::{stream, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::core::downloader::{FetchOutcome, Fetcher};
use crate::core::error::ProvisionResult;
use crate::core::install::InstallLayout;
use crate::core::natives::extract_natives;
use crate::core::platform::HostPlatform;
use crate::core::version::{Artifact, LibraryEntry, VersionJson};

/// What to fetch (and possibly extract) for one included library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPlan {
    pub name: String,
    /// Classpath jar.
    pub primary: Option<Artifact>,
    /// Platform classifier that matched this host.
    pub native: Option<Artifact>,
    pub extract: bool,
}

impl LibraryPlan {
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.primary.iter().chain(self.native.iter())
    }

    /// Archive the native extractor should open, when extraction is due.
    pub fn extraction_source(&self) -> Option<&Artifact> {
        if !self.extract {
            return None;
        }
        self.native.as_ref().or(self.primary.as_ref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibrarySummary {
    pub included: usize,
    pub excluded: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub extracted: usize,
}

struct LibraryOutcome {
    downloaded: usize,
    cached: usize,
    extracted: usize,
}

/// Resolves version libraries against a host and installs them.
pub struct LibraryResolver<'a> {
    fetcher: &'a Fetcher,
    layout: &'a InstallLayout,
    platform: &'a HostPlatform,
    natives_dir: PathBuf,
    concurrency: usize,
}

impl<'a> LibraryResolver<'a> {
    pub fn new(
        fetcher: &'a Fetcher,
        layout: &'a InstallLayout,
        platform: &'a HostPlatform,
        version_id: &str,
    ) -> Self {
        Self {
            fetcher,
            layout,
            platform,
            natives_dir: layout.natives_dir(version_id),
            concurrency: 16,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Pure planning step. `None` means the library's rules exclude it.
    pub fn plan(&self, lib: &LibraryEntry) -> ProvisionResult<Option<LibraryPlan>> {
        plan_library(lib, self.platform)
    }

    /// Fetch every included library concurrently. The first failure aborts
    /// the rest.
    pub async fn install_all(&self, libraries: &[LibraryEntry]) -> ProvisionResult<LibrarySummary> {
        let mut summary = LibrarySummary::default();
        let mut plans = Vec::with_capacity(libraries.len());
        for lib in libraries {
            match self.plan(lib)? {
                Some(plan) => plans.push(plan),
                None => {
                    debug!("Skipping {} (excluded by rules)", lib.name);
                    summary.excluded += 1;
                }
            }
        }
        summary.included = plans.len();

        info!(
            "Installing {} libraries ({} excluded)",
            summary.included, summary.excluded
        );

        let outcomes: Vec<LibraryOutcome> = stream::iter(plans.iter())
            .map(|plan| self.install(plan))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        for outcome in outcomes {
            summary.downloaded += outcome.downloaded;
            summary.cached += outcome.cached;
            summary.extracted += outcome.extracted;
        }
        Ok(summary)
    }

    async fn install(&self, plan: &LibraryPlan) -> ProvisionResult<LibraryOutcome> {
        let mut outcome = LibraryOutcome {
            downloaded: 0,
            cached: 0,
            extracted: 0,
        };

        for artifact in plan.artifacts() {
            let dest = self.layout.library(&artifact.path);
            match self
                .fetcher
                .fetch_file(&artifact.url, &dest, artifact.sha1.as_deref())
                .await?
            {
                FetchOutcome::Cached => outcome.cached += 1,
                FetchOutcome::Downloaded { .. } => outcome.downloaded += 1,
            }
        }

        if let Some(source) = plan.extraction_source() {
            let archive = self.layout.library(&source.path);
            let report = extract_natives(&archive, &self.natives_dir, self.platform.arch).await?;
            outcome.extracted = report.extracted.len();
        }

        Ok(outcome)
    }
}

pub fn plan_library(lib: &LibraryEntry, platform: &HostPlatform) -> ProvisionResult<Option<LibraryPlan>> {
    let ctx = platform.rule_context();
    if !lib.applies(&ctx)?.is_included() {
        return Ok(None);
    }

    let primary = lib.primary_artifact().cloned();
    let key = lib.native_classifier(&platform.os_name, platform.arch);
    let native = lib.classifier(&key).cloned();

    let signals_natives = primary
        .as_ref()
        .is_some_and(|a| a.url.contains("natives") || a.path.contains("natives"));
    let extract = native.is_some() || signals_natives;

    Ok(Some(LibraryPlan {
        name: lib.name.clone(),
        primary,
        native,
        extract,
    }))
}

/// Absolute classpath for `version`: included library jars then the client jar.
pub fn classpath(
    version: &VersionJson,
    version_id: &str,
    layout: &InstallLayout,
    platform: &HostPlatform,
) -> ProvisionResult<String> {
    let mut entries = Vec::new();
    for lib in &version.libraries {
        let Some(plan) = plan_library(lib, platform)? else {
            continue;
        };
        if let Some(primary) = &plan.primary {
            let path = layout.library(&primary.path);
            if !entries.contains(&path) {
                entries.push(path);
            }
        }
    }
    entries.push(layout.client_jar(version_id));

    Ok(entries
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(platform.classpath_separator()))
}
