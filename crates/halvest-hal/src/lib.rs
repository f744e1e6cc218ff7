//! HAL crawl pipeline: cursor-paginated API client, TEI page parser,
//! and the page-file formatter that turns raw response pages into
//! durable JSON page files.
//!
//! The crawl producer and the formatting consumer run concurrently,
//! coordinated only through the sentinel queue from `halvest-core`.

pub mod client;
pub mod config;
pub mod flusher;
pub mod record;
pub mod runner;
pub mod tei;

pub use client::{CrawlClient, CrawlError, CrawlStats};
pub use config::HalConfig;
pub use flusher::{PAGE_THRESHOLD, PageFlusher};
pub use record::{AuthorRecord, PaperRecord};
pub use runner::{FetchSummary, fetch};
pub use tei::{DropReason, PageHead, ProtocolError, RecordOutcome};
