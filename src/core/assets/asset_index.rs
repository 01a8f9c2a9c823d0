use std::collections::{BTreeMap, HashSet};

use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use tracing::info;

use crate::core::downloader::{DownloadTask, FetchOutcome, Fetcher};
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::install::InstallLayout;
use crate::core::version::version_file::AssetIndexInfo;

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetSummary {
    /// Distinct objects referenced by the index.
    pub total: usize,
    pub downloaded: usize,
    pub cached: usize,
}

impl AssetIndex {
    /// One task per distinct hash. Names sharing content share one destination.
    pub fn tasks(&self, layout: &InstallLayout, resource_base: &str) -> Vec<DownloadTask> {
        let base = resource_base.trim_end_matches('/');
        let mut seen = HashSet::new();
        self.objects
            .values()
            .filter(|obj| seen.insert(obj.hash.as_str()))
            .map(|obj| {
                let prefix = obj.hash.get(..2).unwrap_or(&obj.hash);
                DownloadTask::new(
                    format!("{}/{}/{}", base, prefix, obj.hash),
                    layout.asset_object(&obj.hash),
                    Some(obj.hash.clone()),
                )
            })
            .collect()
    }
}

/// Fetches an asset index and every object it references.
pub struct AssetSynchronizer<'a> {
    fetcher: &'a Fetcher,
    layout: &'a InstallLayout,
    resource_base: &'a str,
    concurrency: usize,
}

impl<'a> AssetSynchronizer<'a> {
    pub fn new(fetcher: &'a Fetcher, layout: &'a InstallLayout, resource_base: &'a str) -> Self {
        Self {
            fetcher,
            layout,
            resource_base,
            concurrency: 32,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn sync(&self, info: &AssetIndexInfo) -> ProvisionResult<AssetSummary> {
        let index_path = self.layout.asset_index(&info.id);
        self.fetcher
            .fetch_file(&info.url, &index_path, info.sha1.as_deref())
            .await?;

        let raw = tokio::fs::read(&index_path)
            .await
            .map_err(|e| ProvisionError::io(&index_path, e))?;
        let index: AssetIndex = serde_json::from_slice(&raw)?;

        let tasks = index.tasks(self.layout, self.resource_base);
        info!(
            "Syncing {} asset objects for index {}",
            tasks.len(),
            info.id
        );

        let outcomes: Vec<FetchOutcome> = stream::iter(tasks.iter())
            .map(|task| self.fetcher.fetch(task))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut summary = AssetSummary {
            total: tasks.len(),
            ..AssetSummary::default()
        };
        for outcome in outcomes {
            match outcome {
                FetchOutcome::Cached => summary.cached += 1,
                FetchOutcome::Downloaded { .. } => summary.downloaded += 1,
            }
        }
        info!(
            "Assets {}: {} downloaded, {} cached",
            info.id, summary.downloaded, summary.cached
        );
        Ok(summary)
    }
}
