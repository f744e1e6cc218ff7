//! PDF download stage: read the JSON page files written by the crawl
//! and fetch each paper's PDF under a bounded concurrency gate.
//!
//! Downloads are best-effort per task: a paper whose PDF cannot be
//! fetched is logged and skipped, never retried, and never fails the
//! run. Only local write failures are fatal.

pub mod pool;
pub mod task;

pub use pool::{DownloadConfig, DownloadSummary, run};
pub use task::{DownloadTask, load_tasks};
