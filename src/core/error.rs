use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the provisioning pipeline.
/// Every module returns `Result<T, ProvisionError>`.
#[derive(Debug, Error)]
pub enum ProvisionError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Download failed for {url} after {attempts} attempts: {last_error}")]
    DownloadExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {url} -> {path:?}: expected {expected}, got {actual}")]
    Integrity {
        url: String,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Manifest ────────────────────────────────────────
    #[error("Invalid rule #{index}: invalid action {action:?}")]
    InvalidRule { index: usize, action: String },

    #[error("Version {0} not found in manifest")]
    VersionNotFound(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Extraction of {archive:?} failed: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Config ──────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

impl ProvisionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for ProvisionError {
    fn from(source: std::io::Error) -> Self {
        ProvisionError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for ProvisionError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProvisionError::Other(format!("Task join error: {err}"))
    }
}
