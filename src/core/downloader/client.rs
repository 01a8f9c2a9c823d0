use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::core::config::ProvisionConfig;
use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::http::build_http_client;

use super::hash::{hashes_match, sha1_file};
use super::mirror::MirrorRewriter;

/// A single file to fetch with optional SHA-1 for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>, sha1: Option<String>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            sha1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The destination already held the expected content; no request was made.
    Cached,
    Downloaded { attempts: u32, bytes: u64 },
}

/// Exponential backoff: `min(base * 2^attempt, max_delay)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based). A server
    /// supplied `Retry-After` can lengthen it but never past the cap.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(20));
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        match retry_after {
            Some(hint) => backoff.max(hint).min(self.max_delay),
            None => backoff,
        }
    }
}

enum AttemptError {
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },
    Fatal(ProvisionError),
}

impl AttemptError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_builder() || err.is_redirect() {
            AttemptError::Fatal(ProvisionError::Http(err))
        } else {
            AttemptError::Transient {
                reason: err.to_string(),
                retry_after: None,
            }
        }
    }
}

/// Integrity-checked, retrying fetcher shared by every download task.
///
/// Concurrent requests are bounded by a semaphore sized from
/// `max_connections_per_host`. Callers must not fetch the same destination
/// from two tasks at once; no per-path locking happens here.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    permits: Arc<Semaphore>,
    policy: RetryPolicy,
    mirror: Option<MirrorRewriter>,
}

impl Fetcher {
    pub fn new(client: Client, max_connections: usize, policy: RetryPolicy) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
            policy,
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: Option<MirrorRewriter>) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn from_config(config: &ProvisionConfig) -> ProvisionResult<Self> {
        let client = build_http_client(config.max_connections_per_host)?;
        Ok(
            Self::new(client, config.max_connections_per_host, config.retry_policy())
                .with_mirror(config.mirror()),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn fetch(&self, task: &DownloadTask) -> ProvisionResult<FetchOutcome> {
        self.fetch_file(&task.url, &task.dest, task.sha1.as_deref())
            .await
    }

    /// Download `url` to `dest`, validating SHA-1 when `sha1_expected` is given.
    ///
    /// An existing file with the expected hash is kept without touching the
    /// network. Any other existing file is deleted first. A hash mismatch after
    /// a completed transfer is returned as-is and never retried here.
    pub async fn fetch_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> ProvisionResult<FetchOutcome> {
        let url = match &self.mirror {
            Some(mirror) => mirror.rewrite(url),
            None => url.to_string(),
        };

        if tokio::fs::try_exists(dest)
            .await
            .map_err(|e| ProvisionError::io(dest, e))?
        {
            match sha1_expected {
                Some(expected) => {
                    let actual = sha1_file(dest).await?;
                    if hashes_match(expected, &actual) {
                        debug!("Already satisfied: {:?}", dest);
                        return Ok(FetchOutcome::Cached);
                    }
                    warn!(
                        "Stale file {:?}: expected {}, found {}; redownloading",
                        dest, expected, actual
                    );
                }
                None => debug!("Existing {:?} cannot be verified; redownloading", dest),
            }
            tokio::fs::remove_file(dest)
                .await
                .map_err(|e| ProvisionError::io(dest, e))?;
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProvisionError::io(parent, e))?;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.stream_to_file(&url, dest).await {
                Ok((bytes, actual)) => {
                    if let Some(expected) = sha1_expected {
                        if !hashes_match(expected, &actual) {
                            return Err(ProvisionError::Integrity {
                                url,
                                path: dest.to_path_buf(),
                                expected: expected.to_string(),
                                actual,
                            });
                        }
                    }
                    debug!("Downloaded: {} -> {:?}", url, dest);
                    return Ok(FetchOutcome::Downloaded {
                        attempts: attempt,
                        bytes,
                    });
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Transient {
                    reason,
                    retry_after,
                }) => {
                    if attempt >= self.policy.max_attempts {
                        error!(
                            "{:?} failed after {} attempts: {}",
                            dest, attempt, reason
                        );
                        return Err(ProvisionError::DownloadExhausted {
                            url,
                            attempts: attempt,
                            last_error: reason,
                        });
                    }
                    let delay = self.policy.delay(attempt, retry_after);
                    warn!(
                        "Attempt {}/{} for {} failed ({}); retrying in {:?}",
                        attempt, self.policy.max_attempts, url, reason, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One request: stream the body to `dest`, hashing as it is written.
    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<(u64, String), AttemptError> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            AttemptError::Fatal(ProvisionError::Other("fetcher permits closed".into()))
        })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AttemptError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Transient {
                reason: "rate limited (HTTP 429)".into(),
                retry_after: retry_after(response.headers()),
            });
        }
        if status.is_server_error() {
            return Err(AttemptError::Transient {
                reason: format!("HTTP {}", status.as_u16()),
                retry_after: None,
            });
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(ProvisionError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        let io_err = |e| AttemptError::Fatal(ProvisionError::io(dest, e));

        // Scoped so the handle is closed before the caller inspects the file.
        let mut hasher = Sha1::new();
        let mut written = 0u64;
        {
            let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(AttemptError::from_reqwest)?;
                hasher.update(&chunk);
                file.write_all(&chunk).await.map_err(io_err)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(io_err)?;
        }

        Ok((written, hex::encode(hasher.finalize())))
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
