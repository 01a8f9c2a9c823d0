pub mod client;
pub mod hash;
pub mod mirror;

pub use client::{DownloadTask, FetchOutcome, Fetcher, RetryPolicy};
pub use mirror::MirrorRewriter;
